use std::sync::{Arc, Mutex};

use anyhow::Result;

use super::StateStorage;

/// Process-local storage. Clones share the same slot.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    blob: Arc<Mutex<Option<String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            blob: Arc::new(Mutex::new(Some(blob.into()))),
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.blob.lock().map(|b| b.clone()).unwrap_or(None)
    }
}

impl StateStorage for MemoryStorage {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.contents())
    }

    fn save(&self, blob: &str) -> Result<()> {
        let mut slot = self
            .blob
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory storage lock poisoned"))?;
        *slot = Some(blob.to_string());
        Ok(())
    }
}
