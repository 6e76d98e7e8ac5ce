//! Host descriptor-limit check.
//!
//! Under load the server holds many sockets and sealed-key files open at
//! once; a default 1024-descriptor limit fails in ways that look like
//! network flakiness. Refusing to start is the better failure mode.

use custody_types::{CustodyError, Result};
use tracing::{error, warn};

/// Minimum acceptable open-descriptor limit.
pub const DESCRIPTOR_FLOOR: u64 = 65535;

/// Environment variable that disables the check entirely.
pub const NO_ULIMIT_CHECK: &str = "NO_ULIMIT_CHECK";

/// Host resource-limit queries, behind a trait so startup sequencing is
/// testable without touching process rlimits.
pub trait HostLimits: Send + Sync {
    /// Current soft limit on open file descriptors.
    fn max_open_descriptors(&self) -> std::io::Result<u64>;
}

/// Queries the real process limits through `getrlimit`.
pub struct RealHostLimits;

impl HostLimits for RealHostLimits {
    fn max_open_descriptors(&self) -> std::io::Result<u64> {
        let mut rlim = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        let rc = unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut rlim) };
        if rc != 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(rlim.rlim_cur as u64)
    }
}

/// Enforce the descriptor floor, honoring the `NO_ULIMIT_CHECK` override.
/// A limit that cannot even be queried counts as a violation.
pub fn check_descriptor_limit(limits: &dyn HostLimits) -> Result<()> {
    if std::env::var_os(NO_ULIMIT_CHECK).is_some() {
        warn!("descriptor limit check disabled by NO_ULIMIT_CHECK");
        return Ok(());
    }
    let limit = match limits.max_open_descriptors() {
        Ok(limit) => limit,
        Err(e) => {
            error!(error = %e, "could not query the open descriptor limit");
            return Err(CustodyError::ResourceLimitViolation {
                limit: 0,
                required: DESCRIPTOR_FLOOR,
            });
        }
    };
    if limit < DESCRIPTOR_FLOOR {
        return Err(CustodyError::ResourceLimitViolation {
            limit,
            required: DESCRIPTOR_FLOOR,
        });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests that touch NO_ULIMIT_CHECK serialize on this; the variable is
    // process-global.
    pub(crate) static ENV_LOCK: Mutex<()> = Mutex::new(());

    pub(crate) struct FixedLimits(pub u64);

    impl HostLimits for FixedLimits {
        fn max_open_descriptors(&self) -> std::io::Result<u64> {
            Ok(self.0)
        }
    }

    struct BrokenLimits;

    impl HostLimits for BrokenLimits {
        fn max_open_descriptors(&self) -> std::io::Result<u64> {
            Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied))
        }
    }

    #[test]
    fn limit_below_the_floor_is_a_violation() {
        let _env = ENV_LOCK.lock().unwrap();
        std::env::remove_var(NO_ULIMIT_CHECK);

        match check_descriptor_limit(&FixedLimits(1024)) {
            Err(CustodyError::ResourceLimitViolation { limit, required }) => {
                assert_eq!(limit, 1024);
                assert_eq!(required, DESCRIPTOR_FLOOR);
            }
            other => panic!("expected ResourceLimitViolation, got {:?}", other),
        }
    }

    #[test]
    fn limit_at_the_floor_passes() {
        let _env = ENV_LOCK.lock().unwrap();
        std::env::remove_var(NO_ULIMIT_CHECK);

        assert!(check_descriptor_limit(&FixedLimits(DESCRIPTOR_FLOOR)).is_ok());
        assert!(check_descriptor_limit(&FixedLimits(1 << 20)).is_ok());
    }

    #[test]
    fn override_variable_disables_the_check() {
        let _env = ENV_LOCK.lock().unwrap();
        std::env::set_var(NO_ULIMIT_CHECK, "1");

        assert!(check_descriptor_limit(&FixedLimits(64)).is_ok());
        std::env::remove_var(NO_ULIMIT_CHECK);
    }

    #[test]
    fn unqueryable_limit_is_a_violation() {
        let _env = ENV_LOCK.lock().unwrap();
        std::env::remove_var(NO_ULIMIT_CHECK);

        assert!(matches!(
            check_descriptor_limit(&BrokenLimits),
            Err(CustodyError::ResourceLimitViolation { limit: 0, .. })
        ));
    }
}
