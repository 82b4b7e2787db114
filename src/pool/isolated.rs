use crate::config::Settings;
use crate::engine::EngineFactory;
use crate::migrate::MigrationRunner;

use super::handle::PoolHandle;
use super::strategy::{AcquireError, AcquisitionStrategy};

// -----------------------------------------------------------------------------
// ----- acquire_isolated_pool -------------------------------------------------

/// A private database for one test: a new engine behind a new gateway,
/// migrated in watch-once mode. Ignores the singleton and `DATABASE_URL`.
/// The caller owns the handle and should `stop` it.
pub async fn acquire_isolated_pool(
    settings: &Settings,
    engines: &dyn EngineFactory,
    migrations: &dyn MigrationRunner,
) -> Result<PoolHandle, AcquireError> {
    AcquisitionStrategy::EphemeralGateway
        .acquire(settings, engines, migrations)
        .await
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
