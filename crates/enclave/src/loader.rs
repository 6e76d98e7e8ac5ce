//! Platform boundary for loading and destroying enclave images.
//!
//! The supervisor talks to the platform only through [`EnclaveLoader`], so
//! lifecycle behavior (capability probe, bounded-retry load, destroy on
//! re-init) is testable without trusted-execution hardware.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use custody_types::{CustodyError, EnclaveLoadCause, Result};

/// What the platform reports after a successful load.
#[derive(Debug, Clone, Copy)]
pub struct LoadedEnclave {
    pub eid: u64,
    pub token: u64,
    pub updated: bool,
}

/// Operations the trusted-execution platform exposes to the untrusted host.
pub trait EnclaveLoader: Send + Sync {
    /// Check that the host supports (and has enabled) trusted execution.
    /// Never retried; failure is immediately fatal.
    fn probe_platform(&self) -> Result<()>;

    /// Load the named enclave image.
    fn create(&self, image: &Path) -> Result<LoadedEnclave>;

    /// Destroy a previously loaded instance.
    fn destroy(&self, eid: u64) -> Result<()>;

    /// One-time in-boundary initialization of the kernel's internal state
    /// (big-integer library, log verbosity).
    fn kernel_init(&self, eid: u64, log_level: u32) -> Result<()>;
}

/// Loader used under the simulation build mode and in tests: no hardware
/// probe, enclave ids fabricated locally. The image file must still exist,
/// preserving the file-not-found diagnostic of the real loader.
#[derive(Default)]
pub struct SimulatedLoader {
    next_eid: AtomicU64,
}

impl SimulatedLoader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EnclaveLoader for SimulatedLoader {
    fn probe_platform(&self) -> Result<()> {
        Ok(())
    }

    fn create(&self, image: &Path) -> Result<LoadedEnclave> {
        if !image.exists() {
            return Err(CustodyError::EnclaveLoadFailure(
                EnclaveLoadCause::ImageNotFound {
                    path: image.display().to_string(),
                },
            ));
        }
        Ok(LoadedEnclave {
            eid: self.next_eid.fetch_add(1, Ordering::SeqCst) + 1,
            token: 0,
            updated: false,
        })
    }

    fn destroy(&self, _eid: u64) -> Result<()> {
        Ok(())
    }

    fn kernel_init(&self, _eid: u64, _log_level: u32) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_loader_requires_the_image_file() {
        let loader = SimulatedLoader::new();
        let missing = Path::new("/nonexistent/secure_enclave.signed.so");
        match loader.create(missing) {
            Err(CustodyError::EnclaveLoadFailure(EnclaveLoadCause::ImageNotFound { path })) => {
                assert!(path.contains("secure_enclave.signed.so"));
            }
            other => panic!("expected ImageNotFound, got {:?}", other),
        }
    }

    #[test]
    fn simulated_loader_hands_out_distinct_ids() {
        let dir = std::env::temp_dir();
        let image = dir.join("simulated_enclave_image");
        std::fs::write(&image, b"image").unwrap();

        let loader = SimulatedLoader::new();
        let first = loader.create(&image).unwrap();
        let second = loader.create(&image).unwrap();
        assert_ne!(first.eid, second.eid);

        std::fs::remove_file(&image).ok();
    }
}
