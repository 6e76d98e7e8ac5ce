//! The enclave supervisor: lifecycle plus the serialized kernel call
//! surface.
//!
//! Locking discipline (always context before call lock):
//! - `context` (RwLock) guards the singleton's identity fields; re-init
//!   takes it exclusively, which also excludes every in-flight call.
//! - `call_lock` (Mutex) serializes kernel operations. The trusted boundary
//!   has not confirmed that concurrent in-enclave calls are safe, so the
//!   conservative policy is one secret-bearing operation in flight.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use custody_crypto::{
    kernel, Commitment, G2Encoding, Polynomial, PublicKeyPoint, SecretShare,
};
use custody_types::{CustodyError, Result, SessionId};
use rand::rngs::OsRng;
use tracing::{error, info, warn};

use crate::context::EnclaveContext;
use crate::loader::{EnclaveLoader, SimulatedLoader};

/// Default enclave image name, resolved relative to the working directory.
pub const ENCLAVE_IMAGE: &str = "secure_enclave.signed.so";

/// Supervisor configuration.
#[derive(Debug, Clone)]
pub struct EnclaveConfig {
    /// Filesystem location of the signed enclave image.
    pub image_path: PathBuf,
    /// Simulation build mode: skip the hardware capability probe.
    pub simulation: bool,
    /// Log verbosity handed to the in-boundary kernel init call.
    pub log_level: u32,
    /// Maximum image load attempts before giving up.
    pub max_load_attempts: u32,
    /// Pause between load attempts.
    pub retry_delay: Duration,
}

impl Default for EnclaveConfig {
    fn default() -> Self {
        Self {
            image_path: PathBuf::from(ENCLAVE_IMAGE),
            simulation: false,
            log_level: 0,
            max_load_attempts: 10,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Owns the single trusted execution context and mediates all access to
/// the DKG kernel running inside it.
pub struct EnclaveSupervisor {
    config: EnclaveConfig,
    loader: Box<dyn EnclaveLoader>,
    context: RwLock<Option<EnclaveContext>>,
    call_lock: Mutex<()>,
    // Secret polynomials, keyed by session. Never leaves this crate.
    sessions: Mutex<HashMap<SessionId, Polynomial>>,
    next_session: AtomicU64,
}

impl EnclaveSupervisor {
    pub fn new(config: EnclaveConfig, loader: Box<dyn EnclaveLoader>) -> Self {
        Self {
            config,
            loader,
            context: RwLock::new(None),
            call_lock: Mutex::new(()),
            sessions: Mutex::new(HashMap::new()),
            next_session: AtomicU64::new(0),
        }
    }

    /// Supervisor over the simulated platform loader.
    pub fn simulated(config: EnclaveConfig) -> Self {
        Self::new(config, Box::new(SimulatedLoader::new()))
    }

    /// Create (or re-create) the trusted execution context.
    ///
    /// An existing context is destroyed first; failure to destroy is logged
    /// and does not block recreation. The capability probe runs once and is
    /// never retried. Image loads are retried up to the configured bound
    /// with a pause between attempts; exhaustion is fatal to the caller.
    pub fn init(&self) -> Result<()> {
        let mut context = self.context.write().expect("enclave context lock poisoned");
        let _calls = self.call_lock.lock().expect("enclave call lock poisoned");

        if let Some(existing) = context.take() {
            if let Err(e) = self.loader.destroy(existing.eid) {
                error!(eid = existing.eid, error = %e, "could not destroy enclave");
            }
        }
        // Sessions belong to the old instance; their secrets die with it.
        self.sessions
            .lock()
            .expect("session table lock poisoned")
            .clear();

        if !self.config.simulation {
            self.loader.probe_platform()?;
        }

        let mut last_error = None;
        let mut loaded = None;
        for attempt in 1..=self.config.max_load_attempts {
            match self.loader.create(&self.config.image_path) {
                Ok(instance) => {
                    loaded = Some(instance);
                    break;
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max = self.config.max_load_attempts,
                        error = %e,
                        "enclave load attempt failed"
                    );
                    last_error = Some(e);
                    if attempt < self.config.max_load_attempts {
                        std::thread::sleep(self.config.retry_delay);
                    }
                }
            }
        }

        let instance = match loaded {
            Some(instance) => instance,
            None => {
                return Err(last_error.unwrap_or(CustodyError::EnclaveRuntimeFailure(
                    "enclave load failed with no reported cause".to_string(),
                )))
            }
        };

        *context = Some(EnclaveContext::new(
            instance.eid,
            instance.token,
            instance.updated,
        ));
        info!(eid = instance.eid, "enclave created and started");

        self.loader
            .kernel_init(instance.eid, self.config.log_level)?;
        info!("enclave kernel state initialized");

        Ok(())
    }

    /// Destroy the live context, if any. Best-effort; used at shutdown.
    pub fn destroy(&self) {
        let mut context = self.context.write().expect("enclave context lock poisoned");
        let _calls = self.call_lock.lock().expect("enclave call lock poisoned");

        if let Some(existing) = context.take() {
            if let Err(e) = self.loader.destroy(existing.eid) {
                error!(eid = existing.eid, error = %e, "could not destroy enclave");
            }
        }
        self.sessions
            .lock()
            .expect("session table lock poisoned")
            .clear();
    }

    pub fn is_initialized(&self) -> bool {
        self.context
            .read()
            .expect("enclave context lock poisoned")
            .is_some()
    }

    /// Snapshot of the singleton's identity fields.
    pub fn context(&self) -> Option<EnclaveContext> {
        *self.context.read().expect("enclave context lock poisoned")
    }

    /// Run a kernel operation under the serialization policy: context held
    /// shared (so re-init excludes us), calls fully serialized.
    fn with_kernel<T>(&self, op: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let context = self.context.read().expect("enclave context lock poisoned");
        if context.is_none() {
            return Err(CustodyError::EnclaveRuntimeFailure(
                "enclave is not initialized".to_string(),
            ));
        }
        let _serialized = self.call_lock.lock().expect("enclave call lock poisoned");
        op(self)
    }

    /// Generate a fresh secret polynomial for a DKG round. The polynomial
    /// stays inside the enclave; callers get an opaque session id.
    pub fn start_dkg(&self, t: u32) -> Result<SessionId> {
        self.with_kernel(|this| {
            let poly = kernel::generate_polynomial(t, &mut OsRng)?;
            let session = SessionId(this.next_session.fetch_add(1, Ordering::SeqCst) + 1);
            this.sessions
                .lock()
                .expect("session table lock poisoned")
                .insert(session, poly);
            info!(%session, t, "DKG polynomial generated");
            Ok(session)
        })
    }

    pub fn compute_secret_shares(
        &self,
        session: SessionId,
        t: u32,
        n: u32,
    ) -> Result<Vec<SecretShare>> {
        self.with_session(session, |poly| kernel::compute_secret_shares(poly, t, n))
    }

    pub fn compute_secret_share(
        &self,
        session: SessionId,
        t: u32,
        n: u32,
        index: u32,
    ) -> Result<SecretShare> {
        self.with_session(session, |poly| {
            kernel::compute_secret_share(poly, t, n, index)
        })
    }

    pub fn compute_public_shares(&self, session: SessionId, t: u32) -> Result<Vec<Commitment>> {
        self.with_session(session, |poly| kernel::compute_public_shares(poly, t))
    }

    /// Drop a round's polynomial once its shares and commitments have been
    /// derived and served.
    pub fn discard_session(&self, session: SessionId) -> Result<()> {
        self.with_kernel(|this| {
            this.sessions
                .lock()
                .expect("session table lock poisoned")
                .remove(&session)
                .map(|_| ())
                .ok_or_else(|| unknown_session(session))
        })
    }

    pub fn verify_share(
        &self,
        commitments: &[Commitment],
        share: &SecretShare,
        t: u32,
        index: u32,
    ) -> Result<bool> {
        self.with_kernel(|_| kernel::verify_share(commitments, share, t, index))
    }

    pub fn derive_bls_public_key(&self, share: &SecretShare) -> Result<PublicKeyPoint> {
        self.with_kernel(|_| Ok(kernel::derive_bls_public_key(share)))
    }

    pub fn convert_to_g2(&self, share: &SecretShare) -> Result<G2Encoding> {
        self.with_kernel(|_| Ok(kernel::convert_to_g2(share)))
    }

    fn with_session<T>(
        &self,
        session: SessionId,
        op: impl FnOnce(&Polynomial) -> Result<T>,
    ) -> Result<T> {
        self.with_kernel(|this| {
            let sessions = this.sessions.lock().expect("session table lock poisoned");
            let poly = sessions.get(&session).ok_or_else(|| unknown_session(session))?;
            op(poly)
        })
    }
}

fn unknown_session(session: SessionId) -> CustodyError {
    CustodyError::InvalidDkgParameters(format!("unknown DKG session {}", session))
}
