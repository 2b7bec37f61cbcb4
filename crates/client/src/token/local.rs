//! Key/value local storage, optionally backed by a JSON file

use super::{TokenPolicy, TokenStore};
use crate::Result;
use crate::error::ClientError;
use directories::ProjectDirs;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// String key/value store
///
/// Tokens are written JSON-encoded and decoded on read. When opened from a
/// file, every write is flushed back to it.
#[derive(Debug, Default)]
pub struct LocalStorage {
    items: RwLock<BTreeMap<String, String>>,
    path: Option<PathBuf>,
}

impl LocalStorage {
    /// Storage that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open (or create on first write) a file-backed storage
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let items: BTreeMap<String, String> = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), entries = items.len(), "Opened local storage");

        Ok(Self {
            items: RwLock::new(items),
            path: Some(path),
        })
    }

    /// Platform data directory location, if one can be determined
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "rest-client")
            .map(|dirs| dirs.data_dir().join("local_storage.json"))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// # Errors
    ///
    /// Returns an error if the backing file cannot be written
    pub fn set_item(&self, key: &str, value: impl Into<String>) -> Result<()> {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        items.insert(key.to_string(), value.into());
        self.flush(&items)
    }

    /// # Errors
    ///
    /// Returns an error if the backing file cannot be written
    pub fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        if items.remove(key).is_some() {
            self.flush(&items)?;
        }
        Ok(())
    }

    fn flush(&self, items: &BTreeMap<String, String>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(items)?)?;
        Ok(())
    }
}

impl TokenStore for LocalStorage {
    fn get(&self, name: &str) -> Result<Option<String>> {
        let Some(raw) = self.get_item(name) else {
            return Ok(None);
        };
        let token: Option<String> = serde_json::from_str(&raw).map_err(|e| {
            ClientError::Storage(format!("stored value for {name} is not a JSON string: {e}"))
        })?;
        Ok(token.filter(|t| !t.is_empty()))
    }

    fn set(&self, name: &str, token: &str, _policy: &TokenPolicy) -> Result<()> {
        self.set_item(name, serde_json::to_string(token)?)
    }

    fn clear(&self, name: &str) -> Result<()> {
        self.remove_item(name)
    }
}
