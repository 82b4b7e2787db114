// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

/// Protocol 3.0, the only version the gateway speaks.
pub const PROTOCOL_VERSION: i32 = 196608;

/// Startup packets with this major version are accepted; a newer minor is
/// negotiated down to 3.0.
pub const PROTOCOL_MAJOR: i32 = PROTOCOL_VERSION >> 16;
pub const PROTOCOL_MINOR: i32 = PROTOCOL_VERSION & 0xffff;

/// Startup parameters with this prefix are protocol options, not settings.
pub const PROTOCOL_OPTION_PREFIX: &str = "_pq_.";

pub const SSL_REQUEST_CODE: i32 = 80877103;
pub const GSSENC_REQUEST_CODE: i32 = 80877104;
pub const CANCEL_REQUEST_CODE: i32 = 80877102;

pub const QUERY_TAG: u8 = b'Q';
pub const SYNC_TAG: u8 = b'S';
pub const TERMINATE_TAG: u8 = b'X';

// -----------------------------------------------------------------------------
// ----- MessageType -----------------------------------------------------------

/// Frontend messages as far as the gateway needs to tell them apart.
///
/// Startup-phase packets have no tag byte and are identified by their request
/// code. Everything else is a tagged frame, kept opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    SslRequest,
    GssEncRequest,
    CancelRequest,
    Startup,
    Tagged(u8),
}

impl MessageType {
    /// Frontend messages the backend answers with `ReadyForQuery`.
    pub fn expects_ready_for_query(self) -> bool {
        matches!(self, MessageType::Tagged(QUERY_TAG | SYNC_TAG))
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
