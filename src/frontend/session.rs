use std::net::SocketAddr;
use std::{fmt, sync::Arc};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, warn};

use crate::ErrorResponse;
use crate::engine::{EngineError, EngineHandle};
use crate::frontend::buffers::{FrontendBuffers, InboundMessage};
use crate::frontend::context::SessionContext;
use crate::frontend::handlers::{handle_authenticated, handle_unauthenticated};
use crate::frontend::transport::FrontendTransport;
use crate::shared_types::SessionStage;
use crate::wire_protocol::PeekError;

// -----------------------------------------------------------------------------
// ----- SessionResources ------------------------------------------------------

/// What every session of one gateway shares.
pub struct SessionResources {
    pub engine: EngineHandle,
    pub server_version: String,
    pub tls: Option<TlsAcceptor>,
}

impl fmt::Debug for SessionResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionResources")
            .field("engine", &self.engine)
            .field("server_version", &self.server_version)
            .field("tls", &self.tls.is_some())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// ----- ProtocolSession -------------------------------------------------------

/// One client connection: `Unauthenticated -> Authenticated -> Closed`.
///
/// The loop reads, cuts the inbox into whole frames, handles each frame in
/// order and flushes the replies before reading again.
pub struct ProtocolSession {
    peer: SocketAddr,
    transport: FrontendTransport,
    buffers: FrontendBuffers,
    context: SessionContext,
    resources: Arc<SessionResources>,
}

// -----------------------------------------------------------------------------
// ----- ProtocolSession: Static -----------------------------------------------

impl ProtocolSession {
    pub fn new(stream: TcpStream, peer: SocketAddr, resources: Arc<SessionResources>) -> Self {
        Self {
            peer,
            transport: FrontendTransport::new(stream),
            buffers: FrontendBuffers::new(),
            context: SessionContext::new(),
            resources,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- ProtocolSession: Public -----------------------------------------------

impl ProtocolSession {
    /// Drive the session until the client leaves or the session fails.
    pub async fn run(mut self) -> Result<(), SessionError> {
        debug!(peer = %self.peer, "session opened");

        let result = self.serve().await;
        let authenticated = self.context.stage.is_authenticated();
        self.context.stage = SessionStage::Closed;

        debug!(
            peer = %self.peer,
            user = self.context.username.as_deref().unwrap_or("-"),
            database = self.context.database.as_deref().unwrap_or("-"),
            authenticated,
            "session closed"
        );
        result
    }
}

// -----------------------------------------------------------------------------
// ----- ProtocolSession: Private ----------------------------------------------

impl ProtocolSession {
    async fn serve(&mut self) -> Result<(), SessionError> {
        loop {
            let n = self.buffers.read_from(&mut self.transport).await?;
            if n == 0 {
                return Ok(());
            }

            loop {
                let message = match self.buffers.pull_message(self.context.stage) {
                    Ok(Some(message)) => message,
                    Ok(None) => break,
                    Err(e) => return self.abort_on_framing(e).await,
                };

                if let Err(e) = self.dispatch(message).await {
                    // Best effort: the FATAL frame is already queued.
                    let _ = self.buffers.flush_to(&mut self.transport).await;
                    return Err(e);
                }

                if self.context.take_tls_upgrade() {
                    self.upgrade_to_tls().await?;
                }

                if self.context.should_close() {
                    self.buffers.flush_to(&mut self.transport).await?;
                    return Ok(());
                }
            }

            self.buffers.flush_to(&mut self.transport).await?;
        }
    }

    async fn dispatch(&mut self, message: InboundMessage) -> Result<(), SessionError> {
        match self.context.stage {
            SessionStage::Unauthenticated => {
                handle_unauthenticated(&mut self.context, &mut self.buffers, message, &self.resources)
                    .await
            }
            SessionStage::Authenticated => {
                handle_authenticated(&mut self.context, &mut self.buffers, message, &self.resources)
                    .await;
                Ok(())
            }
            SessionStage::Closed => Ok(()),
        }
    }

    /// Answer `S` in plaintext, then hand the socket to rustls. Bytes that
    /// followed the `SSLRequest` in the same stream were never encrypted, so
    /// the session is refused instead of treating them as TLS traffic.
    async fn upgrade_to_tls(&mut self) -> Result<(), SessionError> {
        if self.buffers.has_unread_input() {
            warn!(peer = %self.peer, "unencrypted data after SSLRequest");
            let err = ErrorResponse::protocol_violation(
                HandshakeError::PlaintextAfterSslRequest.to_string(),
            );
            self.buffers.queue_response(&err.to_bytes());
            self.buffers.flush_to(&mut self.transport).await?;
            return Err(SessionError::Handshake(HandshakeError::PlaintextAfterSslRequest));
        }

        self.buffers.flush_to(&mut self.transport).await?;

        let Some(acceptor) = self.resources.tls.as_ref() else {
            return Ok(());
        };

        if self.transport.is_tls() {
            return Ok(());
        }

        self.transport
            .upgrade_to_tls(acceptor)
            .await
            .map_err(SessionError::Tls)?;
        self.context.mark_encrypted();

        debug!(peer = %self.peer, "session upgraded to tls");
        Ok(())
    }

    /// The inbox cannot be resynchronized once a length is bogus.
    async fn abort_on_framing(&mut self, e: PeekError) -> Result<(), SessionError> {
        let err = ErrorResponse::protocol_violation(e.to_string());
        self.buffers.queue_response(&err.to_bytes());
        let _ = self.buffers.flush_to(&mut self.transport).await;

        match self.context.stage {
            SessionStage::Unauthenticated => Err(SessionError::Handshake(HandshakeError::Malformed(e))),
            _ => Err(SessionError::Framing(e)),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("handshake failed: {0}")]
    Handshake(HandshakeError),

    #[error("framing error: {0}")]
    Framing(PeekError),

    #[error(transparent)]
    EngineNotReady(EngineError),

    #[error("tls handshake failed: {0}")]
    Tls(std::io::Error),
}

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("{0}")]
    Malformed(PeekError),

    #[error("unsupported frontend protocol {}.{}", .0 >> 16, .0 & 0xffff)]
    UnsupportedVersion(i32),

    #[error("invalid startup packet: {0}")]
    InvalidStartup(String),

    #[error("no PostgreSQL user name specified in startup packet")]
    MissingUser,

    #[error("received unencrypted data after SSL request")]
    PlaintextAfterSslRequest,

    #[error("SSLRequest on an already encrypted connection")]
    RepeatedSslRequest,
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
