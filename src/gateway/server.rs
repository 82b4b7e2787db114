use parking_lot::Mutex;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::GatewayConfig;
use crate::engine::{EngineError, EngineFactory, EngineHandle};
use crate::frontend::SessionResources;
use crate::tls::{TlsError, build_acceptor};

use super::acceptor::ConnectionAcceptor;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const LISTEN_BACKLOG: u32 = 1024;

// -----------------------------------------------------------------------------
// ----- GatewayServer ---------------------------------------------------------

/// A Postgres-speaking listener in front of one freshly created engine.
///
/// The port is picked by the OS at bind time and exposed through
/// [`GatewayServer::port`] and [`GatewayServer::connection_string`].
#[derive(Debug)]
pub struct GatewayServer {
    local_addr: SocketAddr,
    connection_string: String,
    engine: EngineHandle,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

// -----------------------------------------------------------------------------
// ----- GatewayServer: Static -------------------------------------------------

impl GatewayServer {
    pub async fn start(
        config: &GatewayConfig,
        engines: &dyn EngineFactory,
    ) -> Result<GatewayServer, GatewayError> {
        let engine = EngineHandle::new(engines.create().await?, config.ready_timeout);

        let tls = config.tls.as_ref().map(build_acceptor).transpose()?;

        let bind_addr = SocketAddr::new(config.host, 0);
        let socket = if bind_addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(GatewayError::Bind)?;
        socket.bind(bind_addr).map_err(GatewayError::Bind)?;
        let listener: TcpListener = socket.listen(LISTEN_BACKLOG).map_err(GatewayError::Bind)?;

        let local_addr = resolve_local_addr(listener.local_addr())?;
        let connection_string = config.connection_string(local_addr.port());

        let resources = Arc::new(SessionResources {
            engine: engine.clone(),
            server_version: config.server_version.clone(),
            tls,
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let acceptor = ConnectionAcceptor::new(listener, resources);
        let accept_task = tokio::spawn(acceptor.run(shutdown_rx));

        info!("gateway listening on {local_addr}");

        Ok(GatewayServer {
            local_addr,
            connection_string,
            engine,
            shutdown: Mutex::new(Some(shutdown_tx)),
            accept_task: Mutex::new(Some(accept_task)),
        })
    }
}

// -----------------------------------------------------------------------------
// ----- GatewayServer: Public -------------------------------------------------

impl GatewayServer {
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.lock().is_none()
    }

    /// Stop accepting. Returns once the listener is closed; open sessions
    /// keep running. Calling it again does nothing.
    pub async fn stop(&self) {
        let Some(shutdown) = self.shutdown.lock().take() else {
            return;
        };
        let _ = shutdown.send(());

        let task = self.accept_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("accept loop ended abnormally: {e}");
            }
        }

        info!("gateway on {} stopped", self.local_addr);
    }
}

impl Drop for GatewayServer {
    fn drop(&mut self) {
        // Dropping the sender also ends the loop; send anyway to be explicit.
        if let Some(shutdown) = self.shutdown.get_mut().take() {
            let _ = shutdown.send(());
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn resolve_local_addr(addr: io::Result<SocketAddr>) -> Result<SocketAddr, GatewayError> {
    let addr = addr.map_err(|e| GatewayError::AddressResolution {
        reason: e.to_string(),
    })?;

    if addr.port() == 0 {
        return Err(GatewayError::AddressResolution {
            reason: format!("listener reported port 0 for {addr}"),
        });
    }

    Ok(addr)
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("cannot resolve listener address: {reason}")]
    AddressResolution { reason: String },

    #[error("cannot bind gateway listener: {0}")]
    Bind(io::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Tls(#[from] TlsError),
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
