use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info};

use crate::config::Settings;
use crate::engine::EngineFactory;
use crate::migrate::MigrationRunner;

use super::handle::PoolHandle;
use super::strategy::{AcquireError, AcquisitionStrategy};

// -----------------------------------------------------------------------------
// ----- Types -----------------------------------------------------------------

pub type AcquireResult = Result<Arc<PoolHandle>, Arc<AcquireError>>;

type SharedAcquire = Shared<BoxFuture<'static, AcquireResult>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitializationState {
    NotStarted,
    InProgress,
    Completed,
}

enum Slot {
    NotStarted,
    InProgress { attempt: u64, future: SharedAcquire },
    Completed { attempt: u64, handle: Arc<PoolHandle> },
}

// -----------------------------------------------------------------------------
// ----- PoolSingleton ---------------------------------------------------------

/// Lazily builds the application's one pool.
///
/// The first `acquire` claims the slot and installs a shared future before
/// anything is awaited; every caller, the first included, awaits that same
/// future. A failed attempt is reported to all of its callers and then
/// cleared, so the next call starts over.
pub struct PoolSingleton {
    settings: Arc<Settings>,
    engines: Arc<dyn EngineFactory>,
    migrations: Arc<dyn MigrationRunner>,
    slot: Mutex<Slot>,
    attempts: AtomicU64,
}

// -----------------------------------------------------------------------------
// ----- PoolSingleton: Static -------------------------------------------------

impl PoolSingleton {
    pub fn new(
        settings: Settings,
        engines: Arc<dyn EngineFactory>,
        migrations: Arc<dyn MigrationRunner>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            engines,
            migrations,
            slot: Mutex::new(Slot::NotStarted),
            attempts: AtomicU64::new(0),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- PoolSingleton: Public -------------------------------------------------

impl PoolSingleton {
    pub async fn acquire(&self) -> AcquireResult {
        let (attempt, future) = {
            let mut slot = self.slot.lock();
            match &*slot {
                Slot::Completed { handle, .. } => return Ok(handle.clone()),
                Slot::InProgress { attempt, future } => (*attempt, future.clone()),
                Slot::NotStarted => {
                    let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    let future = self.initialize(attempt);
                    *slot = Slot::InProgress {
                        attempt,
                        future: future.clone(),
                    };
                    (attempt, future)
                }
            }
        };

        let result = future.await;
        self.settle(attempt, result)
    }

    pub fn state(&self) -> InitializationState {
        match &*self.slot.lock() {
            Slot::NotStarted => InitializationState::NotStarted,
            Slot::InProgress { .. } => InitializationState::InProgress,
            Slot::Completed { .. } => InitializationState::Completed,
        }
    }

    /// Number of initialization attempts started so far.
    pub fn initializations_started(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Forget a completed pool so the next `acquire` builds a new one. The
    /// old handle is returned for the caller to stop. An attempt still in
    /// progress is left alone and `None` is returned.
    pub fn reset(&self) -> Option<Arc<PoolHandle>> {
        let mut slot = self.slot.lock();
        match std::mem::replace(&mut *slot, Slot::NotStarted) {
            Slot::Completed { handle, .. } => Some(handle),
            Slot::NotStarted => None,
            in_progress @ Slot::InProgress { .. } => {
                *slot = in_progress;
                None
            }
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

// -----------------------------------------------------------------------------
// ----- PoolSingleton: Private ------------------------------------------------

impl PoolSingleton {
    fn initialize(&self, attempt: u64) -> SharedAcquire {
        let settings = self.settings.clone();
        let engines = self.engines.clone();
        let migrations = self.migrations.clone();

        async move {
            debug!(attempt, "pool initialization started");

            let strategy = AcquisitionStrategy::from_settings(&settings)?;
            let handle = strategy
                .acquire(&settings, engines.as_ref(), migrations.as_ref())
                .await?;

            info!(attempt, strategy = strategy.name(), "pool ready");
            Ok::<_, AcquireError>(Arc::new(handle))
        }
        .map(|result| result.map_err(Arc::new))
        .boxed()
        .shared()
    }

    /// Record the outcome of `attempt`. Only the first caller to get here
    /// changes the slot; the rest find it already settled.
    fn settle(&self, attempt: u64, result: AcquireResult) -> AcquireResult {
        let mut slot = self.slot.lock();

        match (&*slot, &result) {
            (Slot::InProgress { attempt: current, .. }, Ok(handle)) if *current == attempt => {
                *slot = Slot::Completed {
                    attempt,
                    handle: handle.clone(),
                };
            }

            (Slot::InProgress { attempt: current, .. }, Err(e)) if *current == attempt => {
                error!(attempt, "pool initialization failed: {e}");
                *slot = Slot::NotStarted;
            }

            (
                Slot::Completed {
                    attempt: current,
                    handle: installed,
                },
                Ok(handle),
            ) if *current == attempt && !Arc::ptr_eq(installed, handle) => {
                return Err(Arc::new(AcquireError::InitializationRace));
            }

            _ => {}
        }

        result
    }
}

impl fmt::Debug for PoolSingleton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolSingleton")
            .field("state", &self.state())
            .field("initializations_started", &self.initializations_started())
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
