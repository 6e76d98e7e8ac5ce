//! The single exit path for startup failures.

use custody_types::{exit_codes, CustodyError};
use tracing::error;

/// Exit code for a startup failure. Each fatal class gets its own code so
/// supervising infrastructure can tell a host misconfiguration from a
/// broken enclave image.
pub fn startup_exit_code(err: &CustodyError) -> i32 {
    match err {
        CustodyError::ResourceLimitViolation { .. } => exit_codes::EC_RESOURCE_LIMIT,
        CustodyError::HardwareUnsupported | CustodyError::EnclaveLoadFailure(_) => {
            exit_codes::EC_ENCLAVE_INIT
        }
        _ => exit_codes::EC_INIT_FAILED,
    }
}

/// Log the failure once and terminate the process. Only the server binary
/// calls this; library code propagates errors instead.
pub fn terminate_on_startup_failure(err: &CustodyError) -> ! {
    error!(error = %err, exit_code = startup_exit_code(err), "server startup failed");
    std::process::exit(startup_exit_code(err));
}
