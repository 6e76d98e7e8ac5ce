//! The fixed worker pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::JoinHandle;

use custody_enclave::EnclaveSupervisor;
use tracing::{debug, info};

use crate::agent::RequestAgent;
use crate::handler::handle_request;

/// Fixed set of long-running worker threads pulling requests from the
/// owning agent and invoking supervisor-mediated kernel operations.
///
/// The pool never owns its agent: workers upgrade a `Weak` reference at
/// each dereference and exit their loop when the agent is gone. The
/// orchestrator must keep the agent alive until [`join_all`](Self::join_all)
/// has returned.
pub struct RequestDispatcher {
    agent: Weak<dyn RequestAgent>,
    supervisor: Arc<EnclaveSupervisor>,
    num_workers: usize,
    workers: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    joined: AtomicBool,
    join_lock: Mutex<()>,
}

impl RequestDispatcher {
    pub fn new(
        num_workers: usize,
        agent: &Arc<dyn RequestAgent>,
        supervisor: Arc<EnclaveSupervisor>,
    ) -> Self {
        Self {
            agent: Arc::downgrade(agent),
            supervisor,
            num_workers,
            workers: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            joined: AtomicBool::new(false),
            join_lock: Mutex::new(()),
        }
    }

    /// Spawn the worker threads. Idempotent; only the first call spawns.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut workers = self.workers.lock().expect("worker table lock poisoned");
        for worker_id in 0..self.num_workers {
            let agent = self.agent.clone();
            let supervisor = Arc::clone(&self.supervisor);
            workers.push(std::thread::spawn(move || {
                worker_loop(worker_id, agent, supervisor)
            }));
        }
        info!(num_workers = self.num_workers, "request dispatcher started");
    }

    /// Signal every worker to stop, then join them all.
    ///
    /// Idempotent: a second call, sequential or concurrent, is a safe
    /// no-op. In-flight requests run to completion; only the dequeue is
    /// interrupted.
    pub fn join_all(&self) {
        let _guard = self.join_lock.lock().expect("join lock poisoned");
        if self.joined.load(Ordering::SeqCst) {
            return;
        }

        if let Some(agent) = self.agent.upgrade() {
            agent.close();
        }

        let workers = std::mem::take(&mut *self.workers.lock().expect("worker table lock poisoned"));
        for worker in workers {
            // A worker that panicked is already gone; joining the rest
            // still matters.
            let _ = worker.join();
        }

        self.joined.store(true, Ordering::SeqCst);
        info!("request dispatcher joined");
    }

    /// True once all workers have been joined; stays true thereafter.
    pub fn is_joined(&self) -> bool {
        self.joined.load(Ordering::SeqCst)
    }
}

fn worker_loop(
    worker_id: usize,
    agent: Weak<dyn RequestAgent>,
    supervisor: Arc<EnclaveSupervisor>,
) {
    debug!(worker_id, "dispatch worker running");
    loop {
        // Non-owning back-reference, validated at each dereference.
        let Some(agent) = agent.upgrade() else {
            debug!(worker_id, "agent gone, worker exiting");
            break;
        };
        let Some(request) = agent.next_request() else {
            debug!(worker_id, "transport closed, worker exiting");
            break;
        };
        let response = handle_request(&supervisor, request);
        agent.publish(response);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ChannelAgent;
    use custody_enclave::EnclaveConfig;
    use custody_types::{DkgRequest, SessionId};

    fn ready_supervisor() -> Arc<EnclaveSupervisor> {
        let image = std::env::temp_dir().join("pool_test_enclave");
        std::fs::write(&image, b"image").unwrap();
        let supervisor = EnclaveSupervisor::simulated(EnclaveConfig {
            simulation: true,
            image_path: image,
            ..EnclaveConfig::default()
        });
        supervisor.init().unwrap();
        Arc::new(supervisor)
    }

    fn pool_with_agent(num_workers: usize) -> (RequestDispatcher, Arc<ChannelAgent>) {
        let agent = Arc::new(ChannelAgent::new(false));
        let as_dyn: Arc<dyn RequestAgent> = agent.clone();
        let pool = RequestDispatcher::new(num_workers, &as_dyn, ready_supervisor());
        (pool, agent)
    }

    #[test]
    fn workers_serve_requests_concurrently() {
        let (pool, agent) = pool_with_agent(4);
        pool.start();

        for _ in 0..8 {
            agent.submit(DkgRequest::StartDkg { t: 2, n: 3 });
        }
        let mut sessions = std::collections::HashSet::new();
        for _ in 0..8 {
            let response = agent.next_response().unwrap();
            assert!(response.is_success());
            let session: SessionId =
                serde_json::from_value(response.result.unwrap()["session"].clone()).unwrap();
            sessions.insert(session);
        }
        assert_eq!(sessions.len(), 8);

        pool.join_all();
    }

    #[test]
    fn errors_are_published_not_fatal_to_workers() {
        let (pool, agent) = pool_with_agent(2);
        pool.start();

        agent.submit(DkgRequest::StartDkg { t: 0, n: 3 });
        let response = agent.next_response().unwrap();
        assert!(!response.is_success());

        // The worker that served the bad request is still alive.
        agent.submit(DkgRequest::StartDkg { t: 2, n: 3 });
        assert!(agent.next_response().unwrap().is_success());

        pool.join_all();
    }

    #[test]
    fn join_all_is_idempotent() {
        let (pool, _agent) = pool_with_agent(3);
        pool.start();

        assert!(!pool.is_joined());
        pool.join_all();
        assert!(pool.is_joined());
        pool.join_all();
        assert!(pool.is_joined());
    }

    #[test]
    fn concurrent_join_all_does_not_deadlock() {
        let (pool, agent) = pool_with_agent(2);
        pool.start();
        let pool = Arc::new(pool);

        let clones: Vec<_> = (0..2)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || pool.join_all())
            })
            .collect();
        for handle in clones {
            handle.join().unwrap();
        }
        assert!(pool.is_joined());
        drop(agent);
    }

    #[test]
    fn queued_work_is_drained_before_join_returns() {
        let (pool, agent) = pool_with_agent(1);
        for _ in 0..4 {
            agent.submit(DkgRequest::StartDkg { t: 1, n: 2 });
        }
        pool.start();
        pool.join_all();

        // close() leaves already queued requests servable; all four were
        // answered before the worker exited.
        let mut answered = 0;
        while let Some(response) = agent.next_response_now() {
            assert!(response.is_success());
            answered += 1;
        }
        assert_eq!(answered, 4);
    }
}
