use std::path::PathBuf;

use anyhow::{Context, Result};

use super::{StateStorage, STORAGE_NAMESPACE};

/// Auth state as a JSON file in the cache directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", STORAGE_NAMESPACE))
    }
}

impl StateStorage for FileStorage {
    fn load(&self) -> Result<Option<String>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read auth state file: {}", path.display()))?;
        Ok(Some(contents))
    }

    fn save(&self, blob: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create storage directory: {}", self.dir.display()))?;
        std::fs::write(self.path(), blob).context("Failed to write auth state file")?;
        Ok(())
    }
}
