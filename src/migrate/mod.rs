//! Schema migrations are applied by an external runner; this module only
//! fixes the interface the pool acquisition code calls.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

// -----------------------------------------------------------------------------
// ----- MigrationMode ---------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationMode {
    /// Apply committed migrations once, forward only.
    Once,

    /// Apply pending migrations the way a watcher would (including the
    /// uncommitted working migration), then return instead of watching.
    WatchOnce,
}

// -----------------------------------------------------------------------------
// ----- MigrationRunner -------------------------------------------------------

/// Must tolerate a freshly created, empty database.
#[async_trait]
pub trait MigrationRunner: Send + Sync + 'static {
    async fn apply(
        &self,
        connection_string: &str,
        migrations_folder: &Path,
        mode: MigrationMode,
    ) -> Result<(), MigrationError>;
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("migration {name} failed: {message}")]
    Failed { name: String, message: String },

    #[error("cannot connect for migrations: {source}")]
    Connect {
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("{0}")]
    Other(String),
}
