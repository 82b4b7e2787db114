use clap::Parser;
use secrecy::SecretString;
use std::{ffi::OsString, path::PathBuf};
use thiserror::Error;

use super::gateway::{GatewayConfig, GatewayConfigError};
use super::types::{LogLevel, RunMode};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const APP_NAME: &str = "pgembed";
const DEFAULT_MIGRATIONS_FOLDER: &str = "migrations";
const DEFAULT_POOL_MAX: u32 = 10;

// -----------------------------------------------------------------------------
// ----- Settings --------------------------------------------------------------

/// Everything that influences how the pool is acquired. Read once; nothing
/// here is re-read while the process runs.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Externally provisioned database. Required in production, an override
    /// everywhere else.
    pub database_url: Option<SecretString>,
    pub run_mode: RunMode,
    pub migrations_folder: PathBuf,
    pub pool_max_connections: u32,
    pub log_level: LogLevel,
    pub gateway: GatewayConfig,
}

// -----------------------------------------------------------------------------
// ----- Settings: Static ------------------------------------------------------

impl Settings {
    /// Environment only; no command-line arguments are consulted.
    pub async fn from_env() -> Result<Settings, ConfigError> {
        Self::from_args([APP_NAME]).await
    }

    /// Flags first, environment as fallback. `args` includes the binary name.
    pub async fn from_args<I, T>(args: I) -> Result<Settings, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args = Args::try_parse_from(args).map_err(|e| ConfigError::Args {
            message: e.to_string(),
        })?;

        let gateway = match args.config_file.as_deref() {
            Some(path) => GatewayConfig::from_file(path).await?,
            None => GatewayConfig::default(),
        };

        if args.pool_max_connections == 0 {
            return Err(ConfigError::ZeroPoolSize);
        }

        Ok(Settings {
            database_url: args
                .database_url
                .filter(|url| !url.trim().is_empty())
                .map(|url| SecretString::new(url.into_boxed_str())),
            run_mode: args.run_mode,
            migrations_folder: args.migrations_folder,
            pool_max_connections: args.pool_max_connections,
            log_level: args.log_level,
            gateway,
        })
    }

    /// Development defaults without touching the environment.
    pub fn development() -> Settings {
        Settings {
            database_url: None,
            run_mode: RunMode::Development,
            migrations_folder: PathBuf::from(DEFAULT_MIGRATIONS_FOLDER),
            pool_max_connections: DEFAULT_POOL_MAX,
            log_level: LogLevel::Info,
            gateway: GatewayConfig::default(),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Settings: Builder -----------------------------------------------------

impl Settings {
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(SecretString::new(url.into().into_boxed_str()));
        self
    }

    pub fn with_run_mode(mut self, run_mode: RunMode) -> Self {
        self.run_mode = run_mode;
        self
    }

    pub fn with_gateway(mut self, gateway: GatewayConfig) -> Self {
        self.gateway = gateway;
        self
    }
}

// -----------------------------------------------------------------------------
// ----- Args ------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "pgembed", version, about = "Embedded Postgres gateway")]
struct Args {
    // Connection string of a real database. Empty is treated as unset.
    #[arg(long = "database-url", env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    #[arg(long = "env", env = "PGEMBED_ENV", default_value = "development")]
    run_mode: RunMode,

    #[arg(long = "migrations", env = "PGEMBED_MIGRATIONS_DIR", default_value = DEFAULT_MIGRATIONS_FOLDER)]
    migrations_folder: PathBuf,

    #[arg(long = "pool-max", env = "PGEMBED_POOL_MAX", default_value_t = DEFAULT_POOL_MAX)]
    pool_max_connections: u32,

    // Optional TOML file with a [gateway] table.
    #[arg(long = "config", env = "PGEMBED_CONFIG_FILE")]
    config_file: Option<PathBuf>,

    #[arg(long = "log", env = "PGEMBED_LOG", default_value = "info")]
    log_level: LogLevel,
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid CLI/ENV: {message}")]
    Args { message: String },

    #[error(transparent)]
    Gateway(#[from] GatewayConfigError),

    #[error("pool size must be at least 1")]
    ZeroPoolSize,

    #[error("DATABASE_URL is required in production")]
    MissingDatabaseUrl,
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
