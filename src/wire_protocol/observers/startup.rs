use memchr::memchr;
use std::{fmt, str};

use crate::wire_protocol::message_type::{PROTOCOL_MAJOR, PROTOCOL_OPTION_PREFIX};
use crate::wire_protocol::utils::be_i32;

// -----------------------------------------------------------------------------
// ----- StartupFrameObserver --------------------------------------------------

/// Zero-copy view over a validated `StartupMessage`.
#[derive(Clone, Copy, Debug)]
pub struct StartupFrameObserver<'a> {
    frame: &'a [u8],
}

// -----------------------------------------------------------------------------
// ----- StartupFrameObserver: Static ------------------------------------------

impl<'a> StartupFrameObserver<'a> {
    /// Validate and build zero-copy observer over a complete frame slice.
    pub fn new(frame: &'a [u8]) -> Result<Self, NewStartupObserverError> {
        if frame.len() < 8 {
            return Err(NewStartupObserverError::UnexpectedLength);
        }

        let len = be_i32(&frame[0..]) as usize;
        if frame.len() != len {
            return Err(NewStartupObserverError::UnexpectedLength);
        }

        let version = be_i32(&frame[4..]);
        if version >> 16 != PROTOCOL_MAJOR {
            return Err(NewStartupObserverError::UnexpectedVersion(version));
        }

        let mut pos = 8;

        loop {
            // key
            let rel = memchr(0, &frame[pos..]).ok_or(NewStartupObserverError::UnexpectedEof)?;
            str::from_utf8(&frame[pos..pos + rel]).map_err(NewStartupObserverError::InvalidUtf8)?;
            pos += rel + 1;
            if rel == 0 {
                // terminating nul
                break;
            }
            // value
            let rel = memchr(0, &frame[pos..]).ok_or(NewStartupObserverError::UnexpectedEof)?;
            str::from_utf8(&frame[pos..pos + rel]).map_err(NewStartupObserverError::InvalidUtf8)?;
            pos += rel + 1;
        }

        if pos != len {
            return Err(NewStartupObserverError::UnexpectedLength);
        }

        Ok(Self { frame })
    }
}

// -----------------------------------------------------------------------------
// ----- StartupFrameObserver: Public ------------------------------------------

impl<'a> StartupFrameObserver<'a> {
    #[inline]
    pub fn protocol_version(&self) -> i32 {
        be_i32(&self.frame[4..])
    }

    #[inline]
    pub fn minor_version(&self) -> i32 {
        self.protocol_version() & 0xffff
    }

    /// Names of `_pq_.` protocol options the client asked for.
    pub fn protocol_options(&self) -> impl Iterator<Item = &'a str> + use<'a> {
        self.params()
            .map(|(key, _)| key)
            .filter(|key| key.starts_with(PROTOCOL_OPTION_PREFIX))
    }

    pub fn param(&self, key: &str) -> Option<&'a str> {
        self.params().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Parameters in the order the client sent them.
    pub fn params(&self) -> impl Iterator<Item = (&'a str, &'a str)> + use<'a> {
        let frame: &'a [u8] = self.frame;
        let mut rest = &frame[8..];

        std::iter::from_fn(move || {
            let key = take_cstr(&mut rest)?;
            if key.is_empty() {
                return None;
            }
            let value = take_cstr(&mut rest)?;
            Some((key, value))
        })
    }
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug)]
pub enum NewStartupObserverError {
    InvalidUtf8(str::Utf8Error),
    UnexpectedEof,
    UnexpectedLength,
    UnexpectedVersion(i32),
}

impl fmt::Display for NewStartupObserverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use NewStartupObserverError::*;
        match self {
            InvalidUtf8(e) => write!(f, "utf8: {e}"),
            UnexpectedEof => write!(f, "unexpected EOF"),
            UnexpectedLength => write!(f, "unexpected length"),
            UnexpectedVersion(v) => write!(f, "unexpected version: {}.{}", v >> 16, v & 0xffff),
        }
    }
}

impl std::error::Error for NewStartupObserverError {}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

/// Input was validated in `new`, so failures here only end iteration.
#[inline]
fn take_cstr<'a>(rest: &mut &'a [u8]) -> Option<&'a str> {
    let nul = memchr(0, rest)?;
    let value = str::from_utf8(&rest[..nul]).ok()?;
    *rest = &rest[nul + 1..];
    Some(value)
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
