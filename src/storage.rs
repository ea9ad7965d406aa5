//! Durable key-value storage for client-local state.
//!
//! The store keeps one file per key under a directory, which is all the
//! durability the client needs: the resident keys are the session id and
//! the transcript snapshot. Values are plain UTF-8 strings. Writes go
//! through a temp file plus rename so a crash never leaves a half-written
//! value behind.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// String-keyed durable storage backed by one file per key.
#[derive(Debug, Clone)]
pub struct KvStore {
    dir: PathBuf,
}

impl KvStore {
    /// Opens (and creates if needed) a store rooted at `dir`.
    pub fn open(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create storage directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    /// Reads the value stored under `key`, or `None` if absent.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let value = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read storage key {}", path.display()))?;
        Ok(Some(value))
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.key_path(key);
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, value)
            .with_context(|| format!("Failed to write storage key {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;
        Ok(())
    }

    /// Removes `key`. Removing an absent key is not an error.
    pub fn remove(&self, key: &str) -> Result<()> {
        let path = self.key_path(key);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove storage key {}", path.display()))?;
        }
        Ok(())
    }

    /// Maps a key to its backing file, keeping the name filesystem-safe.
    fn key_path(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(safe)
    }
}
