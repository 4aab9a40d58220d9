use anyhow::{Context, Result};
use keyring::Entry;

use super::{StateStorage, STORAGE_NAMESPACE};

/// Account name of the single keychain entry holding the auth state
const KEYRING_ACCOUNT: &str = "auth-state";

/// Auth state in the OS keychain.
pub struct KeyringStorage {
    service: String,
}

impl KeyringStorage {
    pub fn new() -> Self {
        Self {
            service: STORAGE_NAMESPACE.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, KEYRING_ACCOUNT).context("Failed to create keyring entry")
    }
}

impl Default for KeyringStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStorage for KeyringStorage {
    fn load(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(blob) => Ok(Some(blob)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to read auth state from keychain"),
        }
    }

    fn save(&self, blob: &str) -> Result<()> {
        self.entry()?
            .set_password(blob)
            .context("Failed to store auth state in keychain")
    }
}
