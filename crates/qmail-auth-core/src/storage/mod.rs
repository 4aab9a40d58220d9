//! Durable client-side storage for the auth state.
//!
//! The session store writes one serialized [`PersistedAuthState`] blob under
//! a fixed namespace after every mutation and reads it once at startup.
//! Backends:
//! - `FileStorage`: JSON file in the cache directory
//! - `KeyringStorage`: OS keychain entry
//! - `MemoryStorage`: process-local, for ephemeral sessions and tests

pub mod file;
pub mod keychain;
pub mod memory;
pub mod persisted;

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use file::FileStorage;
pub use keychain::KeyringStorage;
pub use memory::MemoryStorage;
pub use persisted::{PersistedAuthState, RestoreError, SCHEMA_VERSION, STORAGE_NAMESPACE};

/// Single-writer key/value slot holding the serialized auth state.
pub trait StateStorage: Send + Sync {
    /// Read the stored blob, `None` when nothing has been written yet.
    fn load(&self) -> Result<Option<String>>;

    fn save(&self, blob: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    File,
    Keyring,
    Memory,
}

impl FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StorageKind::File),
            "keyring" | "keychain" => Ok(StorageKind::Keyring),
            "memory" => Ok(StorageKind::Memory),
            other => Err(anyhow::anyhow!("Unknown storage backend: {}", other)),
        }
    }
}

/// Open the configured backend. `dir` is only used by file storage.
pub fn open(kind: StorageKind, dir: PathBuf) -> Box<dyn StateStorage> {
    match kind {
        StorageKind::File => Box::new(FileStorage::new(dir)),
        StorageKind::Keyring => Box::new(KeyringStorage::new()),
        StorageKind::Memory => Box::new(MemoryStorage::new()),
    }
}
