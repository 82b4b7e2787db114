//! Client-facing half of the gateway: one `ProtocolSession` per socket.

pub mod session;

pub(crate) mod buffers;
pub(crate) mod context;
pub(crate) mod handlers;
pub(crate) mod proxy_responses;
pub(crate) mod transport;

pub use session::{HandshakeError, ProtocolSession, SessionError, SessionResources};
