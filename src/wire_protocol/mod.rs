//! Just enough of the Postgres frontend protocol to run a trust handshake and
//! to cut the inbound byte stream into whole frames. Frame bodies after the
//! handshake are never interpreted.

pub mod message_type;
pub mod observers;
pub mod peek;
pub mod utils;

pub use message_type::MessageType;
pub use peek::{PeekError, PeekResult, peek_frontend};
