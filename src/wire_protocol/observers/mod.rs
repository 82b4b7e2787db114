pub mod startup;

pub use startup::{NewStartupObserverError, StartupFrameObserver};
