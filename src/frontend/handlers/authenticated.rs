use tracing::{debug, error};

use crate::ErrorResponse;
use crate::frontend::buffers::{FrontendBuffers, InboundMessage};
use crate::frontend::context::SessionContext;
use crate::frontend::proxy_responses as responses;
use crate::frontend::session::SessionResources;
use crate::wire_protocol::MessageType;
use crate::wire_protocol::message_type::TERMINATE_TAG;

// -----------------------------------------------------------------------------
// ----- Authenticated Handler -------------------------------------------------

/// Relay one frame to the engine and queue whatever comes back.
pub(crate) async fn handle_authenticated(
    context: &mut SessionContext,
    buffers: &mut FrontendBuffers,
    message: InboundMessage,
    resources: &SessionResources,
) {
    let message_type = message.message_type;

    match resources.engine.exec_protocol_raw(&message.bytes).await {
        Ok(reply) => buffers.queue_response(&reply),
        Err(e) => {
            error!(error = %e, "engine failed to execute message");
            let err = ErrorResponse::internal_error(e.to_string());
            buffers.queue_response(&err.to_bytes());
            if message_type.expects_ready_for_query() {
                buffers.queue_response(&responses::ready_idle());
            }
        }
    }

    if message_type == MessageType::Tagged(TERMINATE_TAG) {
        debug!("client terminated session");
        context.request_close();
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
