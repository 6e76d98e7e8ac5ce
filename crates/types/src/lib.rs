//! Shared types for the enclave custody server.
//!
//! Everything that crosses a crate boundary lives here: DKG parameters,
//! session identifiers, the error taxonomy, dispatcher request/response
//! messages, and the uniform response envelope used by the info API.

pub mod error;
pub mod messages;

pub use error::{CustodyError, EnclaveLoadCause, Result};
pub use messages::{DkgRequest, DkgResponse, Envelope};

use serde::{Deserialize, Serialize};

/// Identifier of an in-enclave DKG session.
///
/// The secret polynomial behind a session never leaves the enclave crate;
/// callers refer to it only through this opaque id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "dkg-{}", self.0)
    }
}

/// Threshold parameters for a DKG round: `t`-of-`n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DkgParams {
    /// Minimum number of shares needed to use the shared secret.
    pub t: u32,
    /// Total number of participants.
    pub n: u32,
}

impl DkgParams {
    pub fn new(t: u32, n: u32) -> Self {
        Self { t, n }
    }

    /// Validate `1 <= t <= n`.
    pub fn validate(&self) -> Result<()> {
        if self.t == 0 {
            return Err(CustodyError::InvalidDkgParameters(
                "threshold t must be at least 1".to_string(),
            ));
        }
        if self.n == 0 {
            return Err(CustodyError::InvalidDkgParameters(
                "participant count n must be at least 1".to_string(),
            ));
        }
        if self.t > self.n {
            return Err(CustodyError::InvalidDkgParameters(format!(
                "threshold {} cannot exceed participant count {}",
                self.t, self.n
            )));
        }
        Ok(())
    }

    /// Validate a participant index against `1 <= i <= n`.
    pub fn validate_index(&self, index: u32) -> Result<()> {
        if index == 0 || index > self.n {
            return Err(CustodyError::InvalidDkgParameters(format!(
                "participant index {} outside [1, {}]",
                index, self.n
            )));
        }
        Ok(())
    }
}

/// Process exit codes signaled through the centralized shutdown routine.
pub mod exit_codes {
    /// Host descriptor limit below the required floor.
    pub const EC_RESOURCE_LIMIT: i32 = 3;
    /// Enclave initialization failed (capability probe or exhausted retries).
    pub const EC_ENCLAVE_INIT: i32 = 4;
    /// Any other initialization failure.
    pub const EC_INIT_FAILED: i32 = 5;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_accept_valid_ranges() {
        assert!(DkgParams::new(1, 1).validate().is_ok());
        assert!(DkgParams::new(3, 5).validate().is_ok());
        assert!(DkgParams::new(5, 5).validate().is_ok());
    }

    #[test]
    fn params_reject_degenerate_ranges() {
        assert!(DkgParams::new(0, 5).validate().is_err());
        assert!(DkgParams::new(3, 0).validate().is_err());
        assert!(DkgParams::new(6, 5).validate().is_err());
    }

    #[test]
    fn index_bounds_are_one_based() {
        let params = DkgParams::new(2, 4);
        assert!(params.validate_index(0).is_err());
        assert!(params.validate_index(1).is_ok());
        assert!(params.validate_index(4).is_ok());
        assert!(params.validate_index(5).is_err());
    }
}
