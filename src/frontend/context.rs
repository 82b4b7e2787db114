use crate::shared_types::{BackendIdentity, SessionStage};

// -----------------------------------------------------------------------------
// ----- SessionContext --------------------------------------------------------

/// Per-connection state the handlers read and mutate. Socket and buffers live
/// next to it in the session.
#[derive(Debug)]
pub(crate) struct SessionContext {
    pub(crate) stage: SessionStage,
    pub(crate) username: Option<String>,
    pub(crate) database: Option<String>,
    pub(crate) identity: BackendIdentity,
    close_after_flush: bool,
    upgrade_to_tls: bool,
    encrypted: bool,
}

impl SessionContext {
    pub(crate) fn new() -> Self {
        Self {
            stage: SessionStage::Unauthenticated,
            username: None,
            database: None,
            identity: BackendIdentity::random(),
            close_after_flush: false,
            upgrade_to_tls: false,
            encrypted: false,
        }
    }

    /// Trust handshake done. Happens once per session.
    pub(crate) fn authenticate(&mut self, username: &str, database: &str) {
        debug_assert_eq!(self.stage, SessionStage::Unauthenticated);
        self.username = Some(username.to_string());
        self.database = Some(database.to_string());
        self.stage = SessionStage::Authenticated;
    }

    pub(crate) fn request_close(&mut self) {
        self.close_after_flush = true;
    }

    pub(crate) fn should_close(&self) -> bool {
        self.close_after_flush
    }

    pub(crate) fn request_tls_upgrade(&mut self) {
        self.upgrade_to_tls = true;
    }

    pub(crate) fn mark_encrypted(&mut self) {
        self.encrypted = true;
    }

    pub(crate) fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Returns the pending upgrade request and clears it.
    pub(crate) fn take_tls_upgrade(&mut self) -> bool {
        std::mem::take(&mut self.upgrade_to_tls)
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
