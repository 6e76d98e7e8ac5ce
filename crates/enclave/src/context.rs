//! The singleton handle to the loaded trusted execution instance.

/// Identity of the live enclave instance: handle id, launch token, and the
/// token-update flag reported by the platform at load time.
///
/// Exactly one live instance exists process-wide, owned by the supervisor
/// and mutated only behind its exclusive context lock. Re-init replaces the
/// whole value (destroy-then-create); it is never duplicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnclaveContext {
    /// Platform handle of the loaded enclave.
    pub eid: u64,
    /// Opaque launch token.
    pub token: u64,
    /// Whether the platform updated the token during load.
    pub updated: bool,
}

impl EnclaveContext {
    pub fn new(eid: u64, token: u64, updated: bool) -> Self {
        Self {
            eid,
            token,
            updated,
        }
    }
}
