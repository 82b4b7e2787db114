// Backend messages the gateway writes itself during the handshake. Everything
// after the handshake comes from the engine.

use bytes::{BufMut, Bytes, BytesMut};

use crate::shared_types::BackendIdentity;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

/// Sent on every successful handshake, after `server_version`.
const STATIC_PARAMETERS: [(&str, &str); 6] = [
    ("server_encoding", "UTF8"),
    ("client_encoding", "UTF8"),
    ("DateStyle", "ISO, MDY"),
    ("integer_datetimes", "on"),
    ("standard_conforming_strings", "on"),
    ("TimeZone", "UTC"),
];

// -----------------------------------------------------------------------------
// ----- Local Backend Responses -----------------------------------------------

pub(crate) fn ssl_no() -> Bytes {
    Bytes::from_static(b"N")
}

pub(crate) fn ssl_yes() -> Bytes {
    Bytes::from_static(b"S")
}

pub(crate) fn gssenc_no() -> Bytes {
    Bytes::from_static(b"N")
}

/// Tells a client asking for a newer minor version, or for `_pq_.` options,
/// what the gateway will actually speak.
pub(crate) fn negotiate_protocol_version(newest_minor: i32, unrecognized: &[&str]) -> Bytes {
    let names_len: usize = unrecognized.iter().map(|name| name.len() + 1).sum();
    let payload_len = 4 + 4 + 4 + names_len;
    let mut b = BytesMut::with_capacity(1 + payload_len);
    b.put_u8(b'v');
    b.put_u32(payload_len as u32);
    b.put_i32(newest_minor);
    b.put_i32(unrecognized.len() as i32);
    for name in unrecognized {
        b.extend_from_slice(name.as_bytes());
        b.put_u8(0);
    }
    b.freeze()
}

pub(crate) fn auth_ok() -> Bytes {
    let mut b = BytesMut::with_capacity(1 + 4 + 4);
    b.put_u8(b'R');
    b.put_u32(8);
    b.put_i32(0);
    b.freeze()
}

pub(crate) fn param_status(name: &str, value: &str) -> Bytes {
    let n = name.as_bytes();
    let v = value.as_bytes();
    let payload_len = 4 + n.len() + 1 + v.len() + 1;
    let mut b = BytesMut::with_capacity(1 + payload_len);
    b.put_u8(b'S');
    b.put_u32(payload_len as u32);
    b.extend_from_slice(n);
    b.put_u8(0);
    b.extend_from_slice(v);
    b.put_u8(0);
    b.freeze()
}

pub(crate) fn backend_key_data(identity: BackendIdentity) -> Bytes {
    let mut b = BytesMut::with_capacity(1 + 4 + 8);
    b.put_u8(b'K');
    b.put_u32(12);
    b.put_i32(identity.process_id);
    b.put_i32(identity.secret_key);
    b.freeze()
}

pub(crate) fn ready_idle() -> Bytes {
    Bytes::from_static(b"Z\0\0\0\x05I")
}

/// AuthenticationOk, ParameterStatus*, BackendKeyData, ReadyForQuery.
pub(crate) fn trust_handshake(server_version: &str, identity: BackendIdentity) -> BytesMut {
    let mut out = BytesMut::with_capacity(256);

    out.extend_from_slice(&auth_ok());
    out.extend_from_slice(&param_status("server_version", server_version));
    for (name, value) in STATIC_PARAMETERS {
        out.extend_from_slice(&param_status(name, value));
    }
    out.extend_from_slice(&backend_key_data(identity));
    out.extend_from_slice(&ready_idle());

    out
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
