//! Pool acquisition: the application-wide singleton and the per-test
//! isolated variant.

pub mod database_pool;
pub mod handle;
pub mod isolated;
pub mod singleton;
pub mod strategy;

pub use database_pool::{DatabasePool, PoolError, PoolStats, PooledClient};
pub use handle::PoolHandle;
pub use isolated::acquire_isolated_pool;
pub use singleton::{AcquireResult, InitializationState, PoolSingleton};
pub use strategy::{AcquireError, AcquisitionStrategy};
