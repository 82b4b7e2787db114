use tracing::{debug, warn};

use crate::ErrorResponse;
use crate::engine::{EngineError, EngineHandle};
use crate::frontend::buffers::{FrontendBuffers, InboundMessage};
use crate::frontend::context::SessionContext;
use crate::frontend::proxy_responses as responses;
use crate::frontend::session::{HandshakeError, SessionError, SessionResources};
use crate::wire_protocol::MessageType;
use crate::wire_protocol::message_type::PROTOCOL_MINOR;
use crate::wire_protocol::observers::{NewStartupObserverError, StartupFrameObserver};

// -----------------------------------------------------------------------------
// ----- Unauthenticated Handler -----------------------------------------------

pub(crate) async fn handle_unauthenticated(
    context: &mut SessionContext,
    buffers: &mut FrontendBuffers,
    message: InboundMessage,
    resources: &SessionResources,
) -> Result<(), SessionError> {
    match message.message_type {
        MessageType::SslRequest => {
            if context.is_encrypted() {
                return reject(context, buffers, HandshakeError::RepeatedSslRequest);
            }
            if resources.tls.is_some() {
                buffers.queue_response(&responses::ssl_yes());
                context.request_tls_upgrade();
            } else {
                buffers.queue_response(&responses::ssl_no());
            }
            Ok(())
        }

        MessageType::GssEncRequest => {
            buffers.queue_response(&responses::gssenc_no());
            Ok(())
        }

        MessageType::CancelRequest => {
            // Nothing to cancel against; the client expects no reply either way.
            debug!("cancel request ignored");
            context.request_close();
            Ok(())
        }

        MessageType::Startup => {
            handle_startup(context, buffers, &message.bytes, resources).await
        }

        MessageType::Tagged(tag) => {
            warn!(
                tag = %char::from(tag),
                len = message.bytes.len(),
                "discarding message received before authentication"
            );
            Ok(())
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Startup ---------------------------------------------------------------

async fn handle_startup(
    context: &mut SessionContext,
    buffers: &mut FrontendBuffers,
    frame: &[u8],
    resources: &SessionResources,
) -> Result<(), SessionError> {
    let startup = match StartupFrameObserver::new(frame) {
        Ok(startup) => startup,
        Err(NewStartupObserverError::UnexpectedVersion(version)) => {
            return reject(context, buffers, HandshakeError::UnsupportedVersion(version));
        }
        Err(e) => {
            return reject(context, buffers, HandshakeError::InvalidStartup(e.to_string()));
        }
    };

    let Some(username) = startup.param("user").filter(|v| !v.is_empty()) else {
        return reject(context, buffers, HandshakeError::MissingUser);
    };

    let database = startup
        .param("database")
        .filter(|v| !v.is_empty())
        .unwrap_or(username);

    if let Err(e) = wait_for_engine(&resources.engine).await {
        let err = ErrorResponse::cannot_connect_now("the database system is starting up")
            .with_detail(e.to_string())
            .with_hint("retry the connection once the database has started");
        buffers.queue_response(&err.to_bytes());
        context.request_close();
        return Err(SessionError::EngineNotReady(e));
    }

    let unrecognized: Vec<&str> = startup.protocol_options().collect();
    if startup.minor_version() > PROTOCOL_MINOR || !unrecognized.is_empty() {
        debug!(
            requested_minor = startup.minor_version(),
            "negotiating protocol down to 3.0"
        );
        buffers.queue_response(&responses::negotiate_protocol_version(
            PROTOCOL_MINOR,
            &unrecognized,
        ));
    }

    context.authenticate(username, database);
    buffers.queue_response(&responses::trust_handshake(
        &resources.server_version,
        context.identity,
    ));

    debug!(user = username, database, "session authenticated");
    Ok(())
}

async fn wait_for_engine(engine: &EngineHandle) -> Result<(), EngineError> {
    if !engine.is_ready() {
        debug!("waiting for embedded engine");
    }
    engine.wait_ready().await
}

/// Queue a FATAL 08P01 and end the session.
fn reject(
    context: &mut SessionContext,
    buffers: &mut FrontendBuffers,
    error: HandshakeError,
) -> Result<(), SessionError> {
    let mut response = ErrorResponse::protocol_violation(error.to_string());
    if let HandshakeError::UnsupportedVersion(version) = error {
        response = response.with_detail(format!("version: {}.{}", version >> 16, version & 0xffff));
    }

    buffers.queue_response(&response.to_bytes());
    context.request_close();
    Err(SessionError::Handshake(error))
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
