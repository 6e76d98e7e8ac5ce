//! Shared application state for the info API server

use std::sync::Arc;

use custody_storage::KeyStore;
use serde::{Deserialize, Serialize};

/// Snapshot of the effective server options, disclosed verbatim by
/// `getServerConfiguration`. Contains no secret material.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfiguration {
    pub log_level: String,
    pub simulation: bool,
    pub check_cert: bool,
    pub check_zmq_sig: bool,
    pub auto_sign: bool,
    pub generate_test_keys: bool,
    pub check_key_ownership: bool,
    pub num_workers: usize,
}

impl Default for ServerConfiguration {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            simulation: false,
            check_cert: true,
            check_zmq_sig: true,
            auto_sign: false,
            generate_test_keys: false,
            check_key_ownership: true,
            num_workers: 16,
        }
    }
}

/// Shared application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    /// Key store backing the key-enumeration methods
    pub keys: Arc<dyn KeyStore>,
    /// Effective configuration snapshot, fixed at startup
    pub config: Arc<ServerConfiguration>,
}

impl AppState {
    pub fn new(keys: Arc<dyn KeyStore>, config: ServerConfiguration) -> Self {
        Self {
            keys,
            config: Arc::new(config),
        }
    }
}
