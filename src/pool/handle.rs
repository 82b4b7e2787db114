use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

use crate::gateway::GatewayServer;

use super::database_pool::DatabasePool;

// -----------------------------------------------------------------------------
// ----- PoolHandle ------------------------------------------------------------

/// What pool acquisition hands out: the pool plus whatever has to be torn
/// down with it.
#[derive(Debug)]
pub struct PoolHandle {
    pool: Arc<DatabasePool>,
    teardown: Teardown,
    stopped: AtomicBool,
}

#[derive(Debug)]
enum Teardown {
    ClosePool,
    StopGateway(GatewayServer),
}

// -----------------------------------------------------------------------------
// ----- PoolHandle: Static ----------------------------------------------------

impl PoolHandle {
    pub(crate) fn external(pool: Arc<DatabasePool>) -> Self {
        Self {
            pool,
            teardown: Teardown::ClosePool,
            stopped: AtomicBool::new(false),
        }
    }

    pub(crate) fn with_gateway(pool: Arc<DatabasePool>, gateway: GatewayServer) -> Self {
        Self {
            pool,
            teardown: Teardown::StopGateway(gateway),
            stopped: AtomicBool::new(false),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- PoolHandle: Public ----------------------------------------------------

impl PoolHandle {
    pub fn pool(&self) -> &Arc<DatabasePool> {
        &self.pool
    }

    /// The gateway backing this pool, when it is an ephemeral one.
    pub fn gateway(&self) -> Option<&GatewayServer> {
        match &self.teardown {
            Teardown::ClosePool => None,
            Teardown::StopGateway(gateway) => Some(gateway),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Close the pool and, for an ephemeral database, stop its gateway.
    /// Safe to call more than once.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        self.pool.close();
        if let Teardown::StopGateway(gateway) = &self.teardown {
            gateway.stop().await;
        }

        info!("pool stopped");
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
