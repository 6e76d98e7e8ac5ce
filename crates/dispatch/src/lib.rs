//! Concurrent request dispatch into the single enclave instance.
//!
//! A fixed pool of OS-thread workers pulls inbound multi-party protocol
//! requests from the transport-owning agent and funnels every
//! secret-bearing operation through the [`EnclaveSupervisor`]'s serialized
//! call surface. The pool holds only a non-owning reference to its agent;
//! the agent must not be torn down while workers may still dereference it
//! (shutdown ordering is a documented precondition, not a lifetime
//! guarantee).

pub mod agent;
pub mod handler;
pub mod pool;

pub use agent::{ChannelAgent, RequestAgent};
pub use handler::handle_request;
pub use pool::RequestDispatcher;
