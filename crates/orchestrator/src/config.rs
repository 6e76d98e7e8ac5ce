//! Startup options for the custody server.

use std::net::SocketAddr;
use std::path::PathBuf;

use custody_api::ServerConfiguration;
use custody_enclave::EnclaveConfig;
use tracing::warn;

/// Everything `init_all` needs to bring the server up.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Log verbosity name, also forwarded to the enclave kernel init call.
    pub log_level: String,
    /// Require client certificates on the outward-facing surface.
    pub check_cert: bool,
    /// Require a verified signature on every inbound dispatcher request.
    pub check_zmq_sig: bool,
    /// Sign without operator confirmation.
    pub auto_sign: bool,
    /// Provision throwaway keys at startup for integration testing.
    pub generate_test_keys: bool,
    /// Enforce key-ownership checks on key access.
    pub check_key_ownership: bool,
    /// Number of dispatcher worker threads.
    pub num_workers: usize,
    /// Info API bind address; `None` disables the info server.
    pub api_addr: Option<SocketAddr>,
    /// Key store database path; `None` selects the in-memory store.
    pub db_path: Option<PathBuf>,
    /// Directory holding the HTTPS certificate material.
    pub cert_dir: PathBuf,
    /// Enclave lifecycle configuration.
    pub enclave: EnclaveConfig,
}

/// Numeric verbosity handed to the in-boundary kernel init call; higher
/// means chattier. Unknown names turn enclave logging off.
fn enclave_log_verbosity(level: &str) -> u32 {
    match level {
        "trace" => 4,
        "debug" => 3,
        "info" => 2,
        "warn" => 1,
        _ => 0,
    }
}

impl Default for InitOptions {
    fn default() -> Self {
        let log_level = "info".to_string();
        let enclave = EnclaveConfig {
            log_level: enclave_log_verbosity(&log_level),
            ..EnclaveConfig::default()
        };
        Self {
            log_level,
            check_cert: true,
            check_zmq_sig: true,
            auto_sign: false,
            generate_test_keys: false,
            check_key_ownership: true,
            num_workers: 16,
            api_addr: Some(SocketAddr::from(([0, 0, 0, 0], 1030))),
            db_path: Some(PathBuf::from("custody_keys.db")),
            cert_dir: PathBuf::from("cert"),
            enclave,
        }
    }
}

impl InitOptions {
    /// Build options from `CUSTODY_*` environment variables, falling back
    /// to defaults (with a warning) on anything unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let mut opts = Self {
            log_level: env_string("CUSTODY_LOG_LEVEL", defaults.log_level),
            check_cert: env_flag("CUSTODY_CHECK_CERT", defaults.check_cert),
            check_zmq_sig: env_flag("CUSTODY_CHECK_SIG", defaults.check_zmq_sig),
            auto_sign: env_flag("CUSTODY_AUTO_SIGN", defaults.auto_sign),
            generate_test_keys: env_flag("CUSTODY_TEST_KEYS", defaults.generate_test_keys),
            check_key_ownership: env_flag(
                "CUSTODY_CHECK_KEY_OWNERSHIP",
                defaults.check_key_ownership,
            ),
            num_workers: env_parsed("CUSTODY_NUM_WORKERS", defaults.num_workers),
            api_addr: match std::env::var("CUSTODY_API_ADDR") {
                Ok(raw) => match raw.parse() {
                    Ok(addr) => Some(addr),
                    Err(_) => {
                        warn!(value = %raw, "unparsable CUSTODY_API_ADDR, using default");
                        defaults.api_addr
                    }
                },
                Err(_) => defaults.api_addr,
            },
            db_path: std::env::var_os("CUSTODY_DB_PATH")
                .map(PathBuf::from)
                .or(defaults.db_path),
            cert_dir: std::env::var_os("CUSTODY_CERT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cert_dir),
            enclave: defaults.enclave,
        };
        if let Some(image) = std::env::var_os("CUSTODY_ENCLAVE_IMAGE") {
            opts.enclave.image_path = PathBuf::from(image);
        }
        opts.enclave.simulation = env_flag("CUSTODY_SIMULATION", opts.enclave.simulation);
        opts.enclave.log_level = enclave_log_verbosity(&opts.log_level);
        opts
    }

    /// Snapshot disclosed by the info API's `getServerConfiguration`.
    pub fn snapshot(&self) -> ServerConfiguration {
        ServerConfiguration {
            log_level: self.log_level.clone(),
            simulation: self.enclave.simulation,
            check_cert: self.check_cert,
            check_zmq_sig: self.check_zmq_sig,
            auto_sign: self.auto_sign,
            generate_test_keys: self.generate_test_keys,
            check_key_ownership: self.check_key_ownership,
            num_workers: self.num_workers,
        }
    }
}

fn env_string(name: &str, default: String) -> String {
    std::env::var(name).unwrap_or(default)
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(raw) => matches!(raw.as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

fn env_parsed<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(variable = name, value = %raw, "unparsable value, using default");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_production_safe() {
        let opts = InitOptions::default();
        assert!(opts.check_cert);
        assert!(opts.check_zmq_sig);
        assert!(!opts.auto_sign);
        assert!(!opts.generate_test_keys);
        assert!(!opts.enclave.simulation);
    }

    #[test]
    fn log_level_name_maps_to_enclave_verbosity() {
        assert_eq!(InitOptions::default().enclave.log_level, 2);
        assert_eq!(enclave_log_verbosity("trace"), 4);
        assert_eq!(enclave_log_verbosity("debug"), 3);
        assert_eq!(enclave_log_verbosity("warn"), 1);
        assert_eq!(enclave_log_verbosity("off"), 0);
    }

    #[test]
    fn snapshot_mirrors_the_options() {
        let opts = InitOptions {
            log_level: "debug".to_string(),
            auto_sign: true,
            ..InitOptions::default()
        };
        let snap = opts.snapshot();
        assert_eq!(snap.log_level, "debug");
        assert!(snap.auto_sign);
        assert_eq!(snap.num_workers, opts.num_workers);
    }
}
