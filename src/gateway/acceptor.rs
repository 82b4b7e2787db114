use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::frontend::{ProtocolSession, SessionResources};

// -----------------------------------------------------------------------------
// ----- ConnectionAcceptor ----------------------------------------------------

/// Owns the listener. Each accepted socket becomes its own session task; the
/// listener is dropped as soon as the loop returns.
pub struct ConnectionAcceptor {
    listener: TcpListener,
    resources: Arc<SessionResources>,
}

impl ConnectionAcceptor {
    pub fn new(listener: TcpListener, resources: Arc<SessionResources>) -> Self {
        Self {
            listener,
            resources,
        }
    }

    /// Accept until `shutdown` fires or its sender is dropped. Sessions
    /// already running are left alone.
    pub async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    debug!("accept loop stopping");
                    break;
                }

                accept_res = self.listener.accept() => {
                    let (stream, peer) = match accept_res {
                        Ok(v) => v,
                        Err(e) => { error!("accept error: {e}"); continue; }
                    };

                    let _ = stream.set_nodelay(true);

                    let session = ProtocolSession::new(stream, peer, self.resources.clone());
                    tokio::spawn(async move {
                        if let Err(e) = session.run().await {
                            error!("client {peer} error: {e}");
                        }
                    });
                }
            }
        }
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
