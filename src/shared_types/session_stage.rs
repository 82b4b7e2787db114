/// Stages a client connection moves through on the gateway.
///
/// The gateway authenticates in trust mode, so there is no intermediate
/// "authenticating" stage: a valid `StartupMessage` moves the session straight
/// from `Unauthenticated` to `Authenticated`, which happens exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    /// Waiting for `SSLRequest`, `GSSENCRequest`, `CancelRequest` or `StartupMessage`.
    /// Application messages received here are discarded.
    Unauthenticated,

    /// Handshake done; every frame is relayed to the engine.
    Authenticated,

    /// The session will not read again.
    Closed,
}

impl SessionStage {
    pub fn is_authenticated(self) -> bool {
        matches!(self, SessionStage::Authenticated)
    }
}
