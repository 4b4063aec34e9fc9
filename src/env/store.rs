//! Persisted variable store (`mcp-environment.json`).

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

/// Flat `NAME -> value` map, persisted as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvStore {
    values: IndexMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: std::io::Error },
    #[error("Failed to serialize variable store: {0}")]
    Serialize(serde_json::Error),
    #[error("Failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: std::io::Error },
}

impl EnvStore {
    /// Load the store. A missing file is an empty store; so is a malformed
    /// one, with a warning, so setup can rewrite it.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        match serde_json::from_str::<IndexMap<String, String>>(&content) {
            Ok(values) => Ok(Self { values }),
            Err(e) => {
                log::warn!("Ignoring malformed variable store {}: {}", path.display(), e);
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let output = serde_json::to_string_pretty(&self.values).map_err(StoreError::Serialize)?;
        std::fs::write(path, output).map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
    }

    /// Remove a variable. Returns whether it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        self.values.shift_remove(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Export every stored variable into this process's environment so
    /// spawned children inherit it.
    pub fn apply_to_process(&self) {
        for (name, value) in &self.values {
            std::env::set_var(name, value);
        }
    }
}

/// Asterisks, one per character, capped at 8.
pub fn mask(value: &str) -> String {
    "*".repeat(value.chars().count().min(8))
}
