pub mod backend_identity;
pub mod session_stage;

pub use backend_identity::BackendIdentity;
pub use session_stage::SessionStage;
