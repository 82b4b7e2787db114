use std::{error::Error as StdError, fmt};

use crate::shared_types::SessionStage;

use super::message_type::{
    CANCEL_REQUEST_CODE, GSSENC_REQUEST_CODE, MessageType, SSL_REQUEST_CODE,
};
use super::utils::{be_i32, be_u32, tagged_header};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

/// Postgres rejects startup packets above this size; so do we. Also caps the
/// size of application messages we are willing to buffer (and then discard)
/// before the handshake is done.
pub const MAX_STARTUP_LEN: usize = 10_000;

/// Upper bound for one regular frame after authentication.
pub const MAX_MESSAGE_LEN: usize = 1 << 30;

// -----------------------------------------------------------------------------
// ----- Structs ---------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeekResult {
    pub message_type: MessageType,
    pub len: usize,
}

// -----------------------------------------------------------------------------
// ----- peek_frontend ---------------------------------------------------------

/// Look at the front of `bytes` and report the next complete frame.
///
/// `Ok(None)` means more bytes are needed. An error means the declared length
/// can never describe a valid frame, so the stream cannot be resynchronized.
pub fn peek_frontend(stage: SessionStage, bytes: &[u8]) -> Result<Option<PeekResult>, PeekError> {
    match stage {
        SessionStage::Unauthenticated => peek_unauthenticated(bytes),
        SessionStage::Authenticated => peek_tagged(bytes, MAX_MESSAGE_LEN),
        SessionStage::Closed => Ok(None),
    }
}

// -----------------------------------------------------------------------------
// ----- peek_frontend: Unauthenticated ----------------------------------------

#[inline]
fn peek_unauthenticated(bytes: &[u8]) -> Result<Option<PeekResult>, PeekError> {
    let Some(&first) = bytes.first() else {
        return Ok(None);
    };

    // A startup packet length is at most MAX_STARTUP_LEN, so its first byte is
    // always zero. Anything else is a tagged message sent too early.
    if first != 0 {
        return peek_tagged(bytes, MAX_STARTUP_LEN);
    }

    if bytes.len() < 4 {
        return Ok(None);
    }

    let len = be_u32(bytes) as usize;
    if !(8..=MAX_STARTUP_LEN).contains(&len) {
        return Err(PeekError::StartupLength(len));
    }

    if bytes.len() < len {
        return Ok(None);
    }

    let message_type = match (be_i32(&bytes[4..]), len) {
        (SSL_REQUEST_CODE, 8) => MessageType::SslRequest,
        (GSSENC_REQUEST_CODE, 8) => MessageType::GssEncRequest,
        (CANCEL_REQUEST_CODE, 16) => MessageType::CancelRequest,
        // Version checks happen in the startup observer so the client gets
        // a proper error instead of a dropped connection.
        _ => MessageType::Startup,
    };

    Ok(Some(PeekResult { message_type, len }))
}

// -----------------------------------------------------------------------------
// ----- peek_frontend: Tagged -------------------------------------------------

#[inline]
fn peek_tagged(bytes: &[u8], max_len: usize) -> Result<Option<PeekResult>, PeekError> {
    let Some(header) = tagged_header(bytes) else {
        return Ok(None);
    };

    if header.len < 4 || header.len > max_len {
        return Err(PeekError::MessageLength {
            tag: header.tag,
            len: header.len,
        });
    }

    let total_len = header.total_len();
    if bytes.len() < total_len {
        return Ok(None);
    }

    Ok(Some(PeekResult {
        message_type: MessageType::Tagged(header.tag),
        len: total_len,
    }))
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeekError {
    StartupLength(usize),
    MessageLength { tag: u8, len: usize },
}

impl fmt::Display for PeekError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeekError::StartupLength(len) => write!(f, "invalid startup packet length: {len}"),
            PeekError::MessageLength { tag, len } => {
                write!(f, "invalid length {len} for message '{}'", char::from(*tag))
            }
        }
    }
}

impl StdError for PeekError {}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
