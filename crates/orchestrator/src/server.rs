//! The server orchestrator: one-shot startup, ordered shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use custody_api::AppState;
use custody_dispatch::{ChannelAgent, RequestAgent, RequestDispatcher};
use custody_enclave::EnclaveSupervisor;
use custody_storage::{KeyStore, MemoryKeyStore, SqliteKeyStore};
use custody_types::{CustodyError, Result};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::InitOptions;
use crate::limits::{self, HostLimits};

/// Lifecycle phase of the server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    NotInited,
    Initializing,
    Ready,
    Failed,
    ShuttingDown,
    Stopped,
}

/// Brings every component up in a fixed order, exactly once, and tears
/// them down in the reverse order of their dependencies.
///
/// Startup: descriptor-limit check, enclave, key store, certificates,
/// info API server, dispatcher. The limit check runs first so a
/// misconfigured host is rejected before any enclave resources exist.
/// Shutdown: API server, dispatcher, enclave.
pub struct ServerOrchestrator {
    options: InitOptions,
    supervisor: Arc<EnclaveSupervisor>,
    limits: Box<dyn HostLimits>,
    state: Mutex<ServerState>,
    init_lock: tokio::sync::Mutex<()>,
    inited: AtomicBool,
    keys: Mutex<Option<Arc<dyn KeyStore>>>,
    agent: Mutex<Option<Arc<ChannelAgent>>>,
    dispatcher: Mutex<Option<Arc<RequestDispatcher>>>,
    api_shutdown: Mutex<Option<oneshot::Sender<()>>>,
    api_task: Mutex<Option<JoinHandle<()>>>,
}

impl ServerOrchestrator {
    pub fn new(
        options: InitOptions,
        supervisor: Arc<EnclaveSupervisor>,
        limits: Box<dyn HostLimits>,
    ) -> Self {
        Self {
            options,
            supervisor,
            limits,
            state: Mutex::new(ServerState::NotInited),
            init_lock: tokio::sync::Mutex::new(()),
            inited: AtomicBool::new(false),
            keys: Mutex::new(None),
            agent: Mutex::new(None),
            dispatcher: Mutex::new(None),
            api_shutdown: Mutex::new(None),
            api_task: Mutex::new(None),
        }
    }

    /// Initialize every component. Runs the sequence at most once: repeat
    /// and concurrent calls after a successful run return immediately.
    pub async fn init_all(&self) -> Result<()> {
        let _guard = self.init_lock.lock().await;
        if self.inited.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.set_state(ServerState::Initializing);
        match self.init_sequence().await {
            Ok(()) => {
                self.inited.store(true, Ordering::SeqCst);
                self.set_state(ServerState::Ready);
                info!("custody server initialized and ready");
                Ok(())
            }
            Err(e) => {
                self.set_state(ServerState::Failed);
                Err(e)
            }
        }
    }

    async fn init_sequence(&self) -> Result<()> {
        // Host sanity comes first: no enclave or server resources are
        // created on a host that cannot sustain them.
        limits::check_descriptor_limit(self.limits.as_ref())?;

        let supervisor = Arc::clone(&self.supervisor);
        tokio::task::spawn_blocking(move || supervisor.init())
            .await
            .map_err(|e| {
                CustodyError::EnclaveRuntimeFailure(format!("enclave init task failed: {}", e))
            })??;

        let keys = self.open_key_store()?;
        *self.keys.lock().expect("key store slot poisoned") = Some(Arc::clone(&keys));
        if self.options.generate_test_keys {
            self.provision_test_keys(keys.as_ref())?;
        }

        self.provision_certificates()?;

        if let Some(addr) = self.options.api_addr {
            // Bind here, not inside the spawned task: a failed bind is a
            // startup failure and must reach the exit path.
            let listener = custody_api::bind(addr).await.map_err(|e| {
                CustodyError::ServerStartFailure(format!(
                    "could not bind info API listener on {}: {}",
                    addr, e
                ))
            })?;
            let state = AppState::new(Arc::clone(&keys), self.options.snapshot());
            let (shutdown_tx, shutdown_rx) = oneshot::channel();
            let task = tokio::spawn(async move {
                let shutdown = async {
                    let _ = shutdown_rx.await;
                };
                if let Err(e) = custody_api::start_server(state, listener, shutdown).await {
                    error!(error = %e, "info API server failed");
                }
            });
            *self.api_shutdown.lock().expect("api shutdown slot poisoned") = Some(shutdown_tx);
            *self.api_task.lock().expect("api task slot poisoned") = Some(task);
        }

        let agent = Arc::new(ChannelAgent::new(self.options.check_zmq_sig));
        let as_dyn: Arc<dyn RequestAgent> = agent.clone();
        let dispatcher = Arc::new(RequestDispatcher::new(
            self.options.num_workers,
            &as_dyn,
            Arc::clone(&self.supervisor),
        ));
        dispatcher.start();
        *self.agent.lock().expect("agent slot poisoned") = Some(agent);
        *self.dispatcher.lock().expect("dispatcher slot poisoned") = Some(dispatcher);

        Ok(())
    }

    /// Tear everything down: API server first, then the dispatcher, then
    /// the enclave. Best-effort and idempotent; a second call is a no-op.
    pub async fn exit_all(&self) {
        let _guard = self.init_lock.lock().await;
        if self.state() == ServerState::Stopped {
            return;
        }
        self.set_state(ServerState::ShuttingDown);

        if let Some(shutdown) = self
            .api_shutdown
            .lock()
            .expect("api shutdown slot poisoned")
            .take()
        {
            let _ = shutdown.send(());
        }
        let api_task = self.api_task.lock().expect("api task slot poisoned").take();
        if let Some(task) = api_task {
            if task.await.is_err() {
                error!("info API server task panicked during shutdown");
            }
        }

        let dispatcher = self
            .dispatcher
            .lock()
            .expect("dispatcher slot poisoned")
            .take();
        if let Some(dispatcher) = dispatcher {
            if tokio::task::spawn_blocking(move || dispatcher.join_all())
                .await
                .is_err()
            {
                error!("dispatcher join task panicked during shutdown");
            }
        }
        // Workers are joined; the transport can go away now.
        self.agent.lock().expect("agent slot poisoned").take();

        let supervisor = Arc::clone(&self.supervisor);
        if tokio::task::spawn_blocking(move || supervisor.destroy())
            .await
            .is_err()
        {
            error!("enclave destroy task panicked during shutdown");
        }

        self.set_state(ServerState::Stopped);
        info!("custody server shut down");
    }

    pub fn state(&self) -> ServerState {
        *self.state.lock().expect("state lock poisoned")
    }

    pub fn supervisor(&self) -> &Arc<EnclaveSupervisor> {
        &self.supervisor
    }

    /// Key store, once initialized.
    pub fn key_store(&self) -> Option<Arc<dyn KeyStore>> {
        self.keys.lock().expect("key store slot poisoned").clone()
    }

    /// Transport agent, while the server is running. The transport
    /// front-end submits inbound requests through this.
    pub fn agent(&self) -> Option<Arc<ChannelAgent>> {
        self.agent.lock().expect("agent slot poisoned").clone()
    }

    fn set_state(&self, next: ServerState) {
        *self.state.lock().expect("state lock poisoned") = next;
    }

    fn open_key_store(&self) -> Result<Arc<dyn KeyStore>> {
        match &self.options.db_path {
            Some(path) => {
                let store = SqliteKeyStore::open(path)?;
                info!(path = %path.display(), "sqlite key store opened");
                Ok(Arc::new(store))
            }
            None => {
                info!("using in-memory key store");
                Ok(Arc::new(MemoryKeyStore::new()))
            }
        }
    }

    /// Provision throwaway keys for integration testing. Idempotent across
    /// restarts with a persistent store.
    fn provision_test_keys(&self, keys: &dyn KeyStore) -> Result<()> {
        for i in 1..=2u32 {
            let name = format!("bls_key:test:{}", i);
            if keys.exists(&name)? {
                continue;
            }
            let session = self.supervisor.start_dkg(1)?;
            let share = self.supervisor.compute_secret_share(session, 1, 1, 1)?;
            let public = self.supervisor.derive_bls_public_key(&share)?;
            self.supervisor.discard_session(session)?;
            keys.put(&name, &share.to_hex())?;
            info!(key = %name, public_key = %public.to_hex(), "test key provisioned");
        }
        Ok(())
    }

    /// Certificate provisioning hook for the outward-facing HTTPS surface.
    /// Only ensures the certificate directory exists; issuing and rotation
    /// are handled by external tooling.
    fn provision_certificates(&self) -> Result<()> {
        if !self.options.check_cert {
            return Ok(());
        }
        std::fs::create_dir_all(&self.options.cert_dir).map_err(|e| {
            CustodyError::StorageFailure(format!(
                "could not create certificate directory {}: {}",
                self.options.cert_dir.display(),
                e
            ))
        })?;
        info!(dir = %self.options.cert_dir.display(), "certificate directory ready");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::tests::{FixedLimits, ENV_LOCK};
    use crate::limits::NO_ULIMIT_CHECK;
    use custody_enclave::EnclaveConfig;
    use custody_types::DkgRequest;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;
    use tempfile::TempDir;

    struct CountingLimits {
        calls: Arc<AtomicU32>,
    }

    impl HostLimits for CountingLimits {
        fn max_open_descriptors(&self) -> std::io::Result<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(1 << 20)
        }
    }

    fn test_options(dir: &TempDir) -> InitOptions {
        let image = dir.path().join("secure_enclave.signed.so");
        std::fs::write(&image, b"image").unwrap();
        InitOptions {
            check_cert: false,
            check_zmq_sig: false,
            num_workers: 2,
            api_addr: None,
            db_path: None,
            enclave: EnclaveConfig {
                simulation: true,
                image_path: image,
                retry_delay: Duration::ZERO,
                ..EnclaveConfig::default()
            },
            ..InitOptions::default()
        }
    }

    fn orchestrator_with_counter(dir: &TempDir) -> (Arc<ServerOrchestrator>, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let orchestrator = Arc::new(ServerOrchestrator::new(
            test_options(dir),
            Arc::new(EnclaveSupervisor::simulated(test_options(dir).enclave)),
            Box::new(CountingLimits {
                calls: Arc::clone(&calls),
            }),
        ));
        (orchestrator, calls)
    }

    #[tokio::test]
    async fn concurrent_duplicate_init_runs_one_sequence() {
        let _env = ENV_LOCK.lock().unwrap();
        std::env::remove_var(NO_ULIMIT_CHECK);
        let dir = TempDir::new().unwrap();
        let (orchestrator, limit_checks) = orchestrator_with_counter(&dir);

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let orchestrator = Arc::clone(&orchestrator);
                tokio::spawn(async move { orchestrator.init_all().await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        // One limit check means one initialization sequence ran.
        assert_eq!(limit_checks.load(Ordering::SeqCst), 1);
        assert_eq!(orchestrator.state(), ServerState::Ready);
        assert!(orchestrator.supervisor().is_initialized());

        orchestrator.exit_all().await;
    }

    #[tokio::test]
    async fn repeat_init_after_success_is_a_no_op() {
        let _env = ENV_LOCK.lock().unwrap();
        std::env::remove_var(NO_ULIMIT_CHECK);
        let dir = TempDir::new().unwrap();
        let (orchestrator, limit_checks) = orchestrator_with_counter(&dir);

        orchestrator.init_all().await.unwrap();
        orchestrator.init_all().await.unwrap();
        assert_eq!(limit_checks.load(Ordering::SeqCst), 1);

        orchestrator.exit_all().await;
    }

    #[tokio::test]
    async fn limit_violation_preempts_every_other_step() {
        let _env = ENV_LOCK.lock().unwrap();
        std::env::remove_var(NO_ULIMIT_CHECK);
        let dir = TempDir::new().unwrap();
        let supervisor = Arc::new(EnclaveSupervisor::simulated(test_options(&dir).enclave));
        let orchestrator = ServerOrchestrator::new(
            test_options(&dir),
            Arc::clone(&supervisor),
            Box::new(FixedLimits(1024)),
        );

        let err = orchestrator.init_all().await.unwrap_err();
        assert!(matches!(
            err,
            CustodyError::ResourceLimitViolation {
                limit: 1024,
                required: _
            }
        ));
        // Nothing past the limit check was touched.
        assert!(!supervisor.is_initialized());
        assert!(orchestrator.key_store().is_none());
        assert!(orchestrator.agent().is_none());
        assert_eq!(orchestrator.state(), ServerState::Failed);
    }

    #[tokio::test]
    async fn occupied_api_port_is_a_startup_failure() {
        let _env = ENV_LOCK.lock().unwrap();
        std::env::remove_var(NO_ULIMIT_CHECK);
        let dir = TempDir::new().unwrap();

        // Hold the port so the orchestrator's own bind must fail.
        let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let options = InitOptions {
            api_addr: Some(blocker.local_addr().unwrap()),
            ..test_options(&dir)
        };
        let supervisor = Arc::new(EnclaveSupervisor::simulated(options.enclave.clone()));
        let orchestrator = ServerOrchestrator::new(
            options,
            supervisor,
            Box::new(FixedLimits(1 << 20)),
        );

        let err = orchestrator.init_all().await.unwrap_err();
        assert!(matches!(err, CustodyError::ServerStartFailure(_)));
        assert!(err.is_fatal());
        // Failure reaches the caller instead of a half-serving Ready state;
        // the dispatcher was never brought up.
        assert_eq!(orchestrator.state(), ServerState::Failed);
        assert!(orchestrator.agent().is_none());
        drop(blocker);
    }

    #[tokio::test]
    async fn requests_flow_end_to_end_through_the_running_server() {
        let _env = ENV_LOCK.lock().unwrap();
        std::env::remove_var(NO_ULIMIT_CHECK);
        let dir = TempDir::new().unwrap();
        let (orchestrator, _) = orchestrator_with_counter(&dir);

        orchestrator.init_all().await.unwrap();
        let agent = orchestrator.agent().unwrap();
        agent.submit(DkgRequest::StartDkg { t: 2, n: 3 });
        let response = tokio::task::spawn_blocking(move || agent.next_response())
            .await
            .unwrap()
            .unwrap();
        assert!(response.is_success());

        orchestrator.exit_all().await;
    }

    #[tokio::test]
    async fn exit_all_is_idempotent_and_releases_everything() {
        let _env = ENV_LOCK.lock().unwrap();
        std::env::remove_var(NO_ULIMIT_CHECK);
        let dir = TempDir::new().unwrap();
        let (orchestrator, _) = orchestrator_with_counter(&dir);

        orchestrator.init_all().await.unwrap();
        assert!(orchestrator.supervisor().is_initialized());

        orchestrator.exit_all().await;
        assert_eq!(orchestrator.state(), ServerState::Stopped);
        assert!(!orchestrator.supervisor().is_initialized());
        assert!(orchestrator.agent().is_none());

        orchestrator.exit_all().await;
        assert_eq!(orchestrator.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn test_keys_are_provisioned_on_request() {
        let _env = ENV_LOCK.lock().unwrap();
        std::env::remove_var(NO_ULIMIT_CHECK);
        let dir = TempDir::new().unwrap();
        let options = InitOptions {
            generate_test_keys: true,
            ..test_options(&dir)
        };
        let supervisor = Arc::new(EnclaveSupervisor::simulated(options.enclave.clone()));
        let orchestrator =
            ServerOrchestrator::new(options, supervisor, Box::new(FixedLimits(1 << 20)));

        orchestrator.init_all().await.unwrap();
        let keys = orchestrator.key_store().unwrap();
        assert!(keys.exists("bls_key:test:1").unwrap());
        assert!(keys.exists("bls_key:test:2").unwrap());

        orchestrator.exit_all().await;
    }
}
