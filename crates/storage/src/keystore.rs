//! The storage boundary trait and the in-memory test backend.

use std::collections::HashMap;
use std::sync::Mutex;

use custody_types::{CustodyError, Result};
use sha2::{Digest, Sha256};

/// Short digest of a stored value. Lets operators compare stores and spot
/// drift without the sealed material ever being disclosed.
pub fn value_fingerprint(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    hex::encode(&digest[..8])
}

/// Persistent key-value store for key identifiers and sealed key material.
///
/// Values are opaque to the core: sealed blobs or public-key encodings,
/// always already safe to persist on the untrusted host.
pub trait KeyStore: Send + Sync {
    /// Store a value under `name`, recording the creation time. Overwriting
    /// an existing key is an error: key material is never silently replaced.
    fn put(&self, name: &str, value: &str) -> Result<()>;

    /// Fetch a value by name.
    fn get(&self, name: &str) -> Result<Option<String>>;

    /// Existence check by identifier.
    fn exists(&self, name: &str) -> Result<bool>;

    /// All stored key identifiers.
    fn list_keys(&self) -> Result<Vec<String>>;

    /// Most recently created key identifier and its unix creation time.
    fn last_created(&self) -> Result<Option<(String, u64)>>;
}

/// In-memory backend used by tests and simulation mode.
#[derive(Default)]
pub struct MemoryKeyStore {
    // name -> (value, created_at, insertion sequence)
    entries: Mutex<HashMap<String, (String, u64, u64)>>,
    counter: Mutex<u64>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn put(&self, name: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().expect("key store lock poisoned");
        if entries.contains_key(name) {
            return Err(CustodyError::StorageFailure(format!(
                "key already exists: {}",
                name
            )));
        }
        let mut counter = self.counter.lock().expect("key store lock poisoned");
        *counter += 1;
        let created_at = chrono::Utc::now().timestamp() as u64;
        entries.insert(name.to_string(), (value.to_string(), created_at, *counter));
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().expect("key store lock poisoned");
        Ok(entries.get(name).map(|(value, _, _)| value.clone()))
    }

    fn exists(&self, name: &str) -> Result<bool> {
        let entries = self.entries.lock().expect("key store lock poisoned");
        Ok(entries.contains_key(name))
    }

    fn list_keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.lock().expect("key store lock poisoned");
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn last_created(&self) -> Result<Option<(String, u64)>> {
        let entries = self.entries.lock().expect("key store lock poisoned");
        Ok(entries
            .iter()
            .max_by_key(|(_, (_, created_at, seq))| (*created_at, *seq))
            .map(|(name, (_, created_at, _))| (name.clone(), *created_at)))
    }
}
