pub mod gateway;
pub mod settings;
pub mod types;

pub use gateway::{GatewayConfig, GatewayConfigError, TlsFiles};
pub use settings::{ConfigError, Settings};
pub use types::{LogLevel, RunMode};
