//! The in-process database engine the gateway relays to.
//!
//! Engines are provided by the embedder. The gateway only needs three things
//! from one: a way to create it, a readiness signal, and a raw-protocol entry
//! point that takes frontend bytes and returns backend bytes.

pub mod handle;

use async_trait::async_trait;
use bytes::Bytes;
use std::{sync::Arc, time::Duration};
use thiserror::Error;

pub use handle::EngineHandle;

// -----------------------------------------------------------------------------
// ----- EmbeddedEngine --------------------------------------------------------

#[async_trait]
pub trait EmbeddedEngine: Send + Sync + 'static {
    /// Resolves once the engine can execute protocol messages.
    async fn wait_ready(&self) -> Result<(), EngineError>;

    /// Execute one frontend message and return whatever the engine wrote back
    /// (possibly nothing, possibly several backend messages, possibly an
    /// `ErrorResponse`).
    async fn exec_protocol_raw(&self, message: &[u8]) -> Result<Bytes, EngineError>;
}

// -----------------------------------------------------------------------------
// ----- EngineFactory ---------------------------------------------------------

/// Creates one engine per gateway. Each call must return an independent
/// database.
#[async_trait]
pub trait EngineFactory: Send + Sync + 'static {
    async fn create(&self) -> Result<Arc<dyn EmbeddedEngine>, EngineError>;
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("engine creation failed: {message}")]
    Create { message: String },

    #[error("engine failed to become ready: {message}")]
    NotReady { message: String },

    #[error("engine not ready after {}", humantime::format_duration(*.0))]
    ReadyTimeout(Duration),

    #[error("engine failed to execute message: {message}")]
    Exec { message: String },
}

impl EngineError {
    pub fn create(message: impl Into<String>) -> Self {
        EngineError::Create {
            message: message.into(),
        }
    }

    pub fn not_ready(message: impl Into<String>) -> Self {
        EngineError::NotReady {
            message: message.into(),
        }
    }

    pub fn exec(message: impl Into<String>) -> Self {
        EngineError::Exec {
            message: message.into(),
        }
    }
}
