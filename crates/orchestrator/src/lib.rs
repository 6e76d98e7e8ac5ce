//! Server lifecycle orchestration for the enclave custody service.
//!
//! [`ServerOrchestrator`] owns the fixed startup sequence (host resource
//! check, enclave, key store, certificates, info API, dispatcher), the
//! at-most-once init guard, and the ordered best-effort shutdown. Startup
//! failures funnel through the single exit path in [`exit`] with a
//! distinct process exit code per fatal class.

pub mod config;
pub mod exit;
pub mod limits;
pub mod server;

pub use config::InitOptions;
pub use exit::{startup_exit_code, terminate_on_startup_failure};
pub use limits::{check_descriptor_limit, HostLimits, RealHostLimits, DESCRIPTOR_FLOOR};
pub use server::{ServerOrchestrator, ServerState};
