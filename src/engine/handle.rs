use bytes::Bytes;
use std::{fmt, sync::Arc, time::Duration};
use tokio::sync::{Mutex, OnceCell};
use tokio::time::timeout;
use tracing::debug;

use super::{EmbeddedEngine, EngineError};

// -----------------------------------------------------------------------------
// ----- EngineHandle ----------------------------------------------------------

/// The gateway's shared reference to its one engine.
///
/// Every session holds a clone. Raw-protocol calls go through a single async
/// mutex, so an engine that is not reentrant never sees two messages at once,
/// and a session's messages reach it in the order they arrived.
#[derive(Clone)]
pub struct EngineHandle {
    inner: Arc<Inner>,
}

struct Inner {
    engine: Arc<dyn EmbeddedEngine>,
    ready: OnceCell<()>,
    ready_timeout: Duration,
    exec_lock: Mutex<()>,
}

// -----------------------------------------------------------------------------
// ----- EngineHandle: Static --------------------------------------------------

impl EngineHandle {
    pub fn new(engine: Arc<dyn EmbeddedEngine>, ready_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                engine,
                ready: OnceCell::new(),
                ready_timeout,
                exec_lock: Mutex::new(()),
            }),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- EngineHandle: Public --------------------------------------------------

impl EngineHandle {
    /// Waits for the engine, at most `ready_timeout`. Success is remembered;
    /// a failure is not, so the next handshake waits again.
    pub async fn wait_ready(&self) -> Result<(), EngineError> {
        let inner = &self.inner;

        inner
            .ready
            .get_or_try_init(|| async {
                match timeout(inner.ready_timeout, inner.engine.wait_ready()).await {
                    Ok(result) => {
                        if result.is_ok() {
                            debug!("embedded engine ready");
                        }
                        result
                    }
                    Err(_) => Err(EngineError::ReadyTimeout(inner.ready_timeout)),
                }
            })
            .await
            .map(|_| ())
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.initialized()
    }

    pub async fn exec_protocol_raw(&self, message: &[u8]) -> Result<Bytes, EngineError> {
        let _guard = self.inner.exec_lock.lock().await;
        self.inner.engine.exec_protocol_raw(message).await
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("ready", &self.is_ready())
            .field("ready_timeout", &self.inner.ready_timeout)
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingEngine {
        ready_calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        never_ready: bool,
    }

    #[async_trait]
    impl EmbeddedEngine for CountingEngine {
        async fn wait_ready(&self) -> Result<(), EngineError> {
            self.ready_calls.fetch_add(1, Ordering::SeqCst);
            if self.never_ready {
                std::future::pending::<()>().await;
            }
            Ok(())
        }

        async fn exec_protocol_raw(&self, message: &[u8]) -> Result<Bytes, EngineError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Bytes::copy_from_slice(message))
        }
    }

    #[tokio::test]
    async fn readiness_is_awaited_once() {
        let engine = Arc::new(CountingEngine::default());
        let handle = EngineHandle::new(engine.clone(), Duration::from_secs(1));

        assert!(!handle.is_ready());
        handle.wait_ready().await.unwrap();
        handle.wait_ready().await.unwrap();

        assert!(handle.is_ready());
        assert_eq!(engine.ready_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn readiness_wait_is_bounded() {
        let engine = Arc::new(CountingEngine {
            never_ready: true,
            ..Default::default()
        });
        let handle = EngineHandle::new(engine, Duration::from_millis(20));

        let err = handle.wait_ready().await.unwrap_err();
        assert!(matches!(err, EngineError::ReadyTimeout(d) if d == Duration::from_millis(20)));
        assert!(!handle.is_ready());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn exec_calls_are_serialized() {
        let engine = Arc::new(CountingEngine::default());
        let handle = EngineHandle::new(engine.clone(), Duration::from_secs(1));

        let mut tasks = Vec::new();
        for i in 0..8u8 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                handle.exec_protocol_raw(&[i]).await.unwrap()
            }));
        }

        for (i, task) in tasks.into_iter().enumerate() {
            assert_eq!(task.await.unwrap().as_ref(), &[i as u8]);
        }
        assert_eq!(engine.max_in_flight.load(Ordering::SeqCst), 1);
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
