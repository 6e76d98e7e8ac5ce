//! Error taxonomy for the custody server.
//!
//! Two channels, never conflated: recoverable caller-facing outcomes
//! (parameter validation, share verification, lookups) are returned as
//! `CustodyError` values to the immediate caller, while unrecoverable
//! startup failures unwind to the orchestrator's single exit path.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CustodyError>;

/// Why loading the enclave image failed.
///
/// `ImageNotFound` is split out for diagnostics: it almost always means the
/// image path or library search path is misconfigured rather than a
/// transient platform fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnclaveLoadCause {
    /// The named enclave image does not exist on the filesystem.
    ImageNotFound { path: String },
    /// Any other load failure reported by the platform.
    Other { reason: String },
}

impl std::fmt::Display for EnclaveLoadCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ImageNotFound { path } => write!(f, "enclave image not found: {}", path),
            Self::Other { reason } => write!(f, "{}", reason),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustodyError {
    /// The platform lacks (or has disabled) trusted-execution support.
    /// Fatal, never retried.
    #[error("trusted execution is not supported or not enabled on this host")]
    HardwareUnsupported,

    /// Loading the enclave image failed after all retry attempts.
    #[error("could not load enclave image: {0}")]
    EnclaveLoadFailure(EnclaveLoadCause),

    /// The loaded enclave misbehaved at runtime; the context is no longer
    /// trustworthy and the process must shut down.
    #[error("enclave runtime failure: {0}")]
    EnclaveRuntimeFailure(String),

    /// Caller supplied DKG parameters outside the valid range.
    #[error("invalid DKG parameters: {0}")]
    InvalidDkgParameters(String),

    /// A claimed secret share did not match its commitments. Non-fatal:
    /// the input may come from an untrusted remote party.
    #[error("secret share failed verification against commitments")]
    ShareVerificationFailure,

    /// Host descriptor limit below the required floor.
    #[error("open file descriptor limit {limit} is below the required {required}")]
    ResourceLimitViolation { limit: u64, required: u64 },

    /// A server component could not be brought up during startup.
    #[error("server startup failure: {0}")]
    ServerStartFailure(String),

    /// Persistent key-value store failure.
    #[error("storage failure: {0}")]
    StorageFailure(String),
}

impl CustodyError {
    /// Whether this error must terminate the process rather than be
    /// reported back to the requesting caller.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::HardwareUnsupported
                | Self::EnclaveLoadFailure(_)
                | Self::EnclaveRuntimeFailure(_)
                | Self::ResourceLimitViolation { .. }
                | Self::ServerStartFailure(_)
        )
    }
}
