use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ConfigError, Settings};
use crate::engine::EngineFactory;
use crate::gateway::{GatewayError, GatewayServer};
use crate::migrate::{MigrationError, MigrationMode, MigrationRunner};

use super::database_pool::{DatabasePool, PoolError};
use super::handle::PoolHandle;

// -----------------------------------------------------------------------------
// ----- AcquisitionStrategy ---------------------------------------------------

/// Where the pool's database comes from.
#[derive(Debug, Clone)]
pub enum AcquisitionStrategy {
    /// Externally managed database; migrations run once, forward only.
    Production { database_url: SecretString },
    /// Outside production with `DATABASE_URL` set. The database is used as is.
    ExplicitUrl { database_url: SecretString },
    /// A fresh embedded engine behind a local gateway.
    EphemeralGateway,
}

// -----------------------------------------------------------------------------
// ----- AcquisitionStrategy: Static -------------------------------------------

impl AcquisitionStrategy {
    pub fn from_settings(settings: &Settings) -> Result<AcquisitionStrategy, ConfigError> {
        let database_url = settings.database_url.clone();

        match (settings.run_mode.is_production(), database_url) {
            (true, Some(database_url)) => Ok(AcquisitionStrategy::Production { database_url }),
            (true, None) => Err(ConfigError::MissingDatabaseUrl),
            (false, Some(database_url)) => Ok(AcquisitionStrategy::ExplicitUrl { database_url }),
            (false, None) => Ok(AcquisitionStrategy::EphemeralGateway),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- AcquisitionStrategy: Public -------------------------------------------

impl AcquisitionStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            AcquisitionStrategy::Production { .. } => "production",
            AcquisitionStrategy::ExplicitUrl { .. } => "explicit-url",
            AcquisitionStrategy::EphemeralGateway => "ephemeral-gateway",
        }
    }

    pub async fn acquire(
        &self,
        settings: &Settings,
        engines: &dyn EngineFactory,
        migrations: &dyn MigrationRunner,
    ) -> Result<PoolHandle, AcquireError> {
        info!(strategy = self.name(), "acquiring database pool");

        match self {
            AcquisitionStrategy::Production { database_url } => {
                let url = database_url.expose_secret();
                migrations
                    .apply(url, &settings.migrations_folder, MigrationMode::Once)
                    .await?;
                let pool = DatabasePool::connect_lazy(url, settings.pool_max_connections)?;
                Ok(PoolHandle::external(pool))
            }

            AcquisitionStrategy::ExplicitUrl { database_url } => {
                let pool = DatabasePool::connect_lazy(
                    database_url.expose_secret(),
                    settings.pool_max_connections,
                )?;
                Ok(PoolHandle::external(pool))
            }

            AcquisitionStrategy::EphemeralGateway => {
                let gateway = GatewayServer::start(&settings.gateway, engines).await?;

                match prepare_ephemeral(&gateway, settings, migrations).await {
                    Ok(pool) => Ok(PoolHandle::with_gateway(pool, gateway)),
                    Err(e) => {
                        warn!("ephemeral database setup failed: {e}");
                        gateway.stop().await;
                        Err(e)
                    }
                }
            }
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

async fn prepare_ephemeral(
    gateway: &GatewayServer,
    settings: &Settings,
    migrations: &dyn MigrationRunner,
) -> Result<Arc<DatabasePool>, AcquireError> {
    let connection_string = gateway.connection_string();

    migrations
        .apply(
            connection_string,
            &settings.migrations_folder,
            MigrationMode::WatchOnce,
        )
        .await?;

    Ok(DatabasePool::connect_lazy(
        connection_string,
        settings.pool_max_connections,
    )?)
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("migrations failed: {0}")]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("pool initialization completed twice")]
    InitializationRace,
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
