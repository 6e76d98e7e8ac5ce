//! The transport-owning agent the worker pool serves.

use custody_types::{DkgRequest, DkgResponse};
use tracing::warn;

/// The request-serving agent that owns the wire transport and its queues.
///
/// The dispatcher only ever borrows the agent (through a `Weak` reference
/// upgraded at each dereference); the agent's lifetime is managed by the
/// orchestrator.
pub trait RequestAgent: Send + Sync {
    /// Blocking dequeue of the next inbound request. `None` once the
    /// transport has been closed and drained.
    fn next_request(&self) -> Option<DkgRequest>;

    /// Publish a response back through the transport.
    fn publish(&self, response: DkgResponse);

    /// Close the inbound queue, waking every blocked worker. Already
    /// queued requests are still served.
    fn close(&self);
}

/// Channel-backed agent: the in-process stand-in for the ZeroMQ-style
/// message transport, and the implementation used by tests.
pub struct ChannelAgent {
    request_tx: async_channel::Sender<DkgRequest>,
    request_rx: async_channel::Receiver<DkgRequest>,
    response_tx: async_channel::Sender<DkgResponse>,
    response_rx: async_channel::Receiver<DkgResponse>,
    check_sig: bool,
}

impl ChannelAgent {
    /// `check_sig` mirrors the transport's authentication flag: when set,
    /// requests that did not pass upstream signature verification are
    /// rejected before they reach a worker.
    pub fn new(check_sig: bool) -> Self {
        let (request_tx, request_rx) = async_channel::unbounded();
        let (response_tx, response_rx) = async_channel::unbounded();
        Self {
            request_tx,
            request_rx,
            response_tx,
            response_rx,
            check_sig,
        }
    }

    /// Enqueue a request whose signature the transport has verified (or
    /// that needs no verification).
    pub fn submit(&self, request: DkgRequest) {
        if self.request_tx.send_blocking(request).is_err() {
            warn!("request dropped: transport queue is closed");
        }
    }

    /// Enqueue a request that failed (or skipped) signature verification.
    /// Rejected up front when the authentication flag is set.
    pub fn submit_unverified(&self, request: DkgRequest) {
        if self.check_sig {
            warn!("rejecting unsigned request");
            self.publish(DkgResponse {
                status: 1,
                error_message: "request signature verification failed".to_string(),
                result: None,
            });
            return;
        }
        self.submit(request);
    }

    /// Blocking receive of the next published response.
    pub fn next_response(&self) -> Option<DkgResponse> {
        self.response_rx.recv_blocking().ok()
    }

    /// Non-blocking receive; `None` when nothing is queued right now.
    pub fn next_response_now(&self) -> Option<DkgResponse> {
        self.response_rx.try_recv().ok()
    }

    pub fn pending_requests(&self) -> usize {
        self.request_rx.len()
    }
}

impl RequestAgent for ChannelAgent {
    fn next_request(&self) -> Option<DkgRequest> {
        self.request_rx.recv_blocking().ok()
    }

    fn publish(&self, response: DkgResponse) {
        if self.response_tx.send_blocking(response).is_err() {
            warn!("response dropped: transport queue is closed");
        }
    }

    fn close(&self) {
        self.request_rx.close();
    }
}
