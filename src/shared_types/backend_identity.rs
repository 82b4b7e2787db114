use rand::Rng;

// -----------------------------------------------------------------------------
// ----- BackendIdentity -------------------------------------------------------

/// The `(process_id, secret_key)` pair announced in `BackendKeyData`.
///
/// The embedded engine has no cancellation entry point, so the pair only has
/// to look plausible to clients; it is never matched against a CancelRequest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendIdentity {
    pub process_id: i32,
    pub secret_key: i32,
}

// -----------------------------------------------------------------------------
// ----- BackendIdentity: Static -----------------------------------------------

impl BackendIdentity {
    pub fn random() -> Self {
        let mut rng = rand::rng();

        BackendIdentity {
            process_id: rng.random_range(1..i32::MAX),
            secret_key: rng.random(),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
