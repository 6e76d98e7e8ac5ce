//! Persistent key-value store for key metadata.
//!
//! The custody core treats storage strictly as `get/exists/list`; the
//! on-disk format is an implementation detail behind the [`KeyStore`]
//! trait. Two backends: SQLite for the server, an in-memory map for tests.

pub mod keystore;
pub mod sqlite;

pub use keystore::{value_fingerprint, KeyStore, MemoryKeyStore};
pub use sqlite::SqliteKeyStore;
