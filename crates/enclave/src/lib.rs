//! Trusted-enclave lifecycle supervision.
//!
//! One process owns exactly one trusted execution context. This crate holds
//! the singleton [`EnclaveContext`], the [`EnclaveLoader`] boundary to the
//! platform, and the [`EnclaveSupervisor`] that mediates every kernel call
//! through a single serialized surface. Secret polynomials live in the
//! supervisor's session table and never leave this crate.

pub mod context;
pub mod loader;
pub mod supervisor;

pub use context::EnclaveContext;
pub use loader::{EnclaveLoader, LoadedEnclave, SimulatedLoader};
pub use supervisor::{EnclaveConfig, EnclaveSupervisor, ENCLAVE_IMAGE};
