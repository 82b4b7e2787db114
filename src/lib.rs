pub mod config;
pub mod engine;
pub mod errors;
pub mod frontend;
pub mod gateway;
pub mod migrate;
pub mod pool;
pub mod shared_types;
pub mod telemetry;
pub mod tls;
pub mod wire_protocol;

pub use config::{ConfigError, GatewayConfig, LogLevel, RunMode, Settings};
pub use engine::{EmbeddedEngine, EngineError, EngineFactory, EngineHandle};
pub use errors::ErrorResponse;
pub use gateway::{GatewayError, GatewayServer};
pub use migrate::{MigrationError, MigrationMode, MigrationRunner};
pub use pool::{
    AcquireError, DatabasePool, InitializationState, PoolHandle, PoolSingleton,
    acquire_isolated_pool,
};
