//! Key-value persistence for session credentials. The file store keeps a flat
//! JSON object on disk and rereads it on every access, so a credential written
//! by another command is picked up by a running refresh chain.

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::Mutex,
};
use thiserror::Error;
use tracing::debug;

/// Storage key of the current access token.
pub const TOKEN_KEY: &str = "token";
/// Storage key of the refresh credential.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("state file {path} is not a JSON object")]
    Corrupt { path: PathBuf },
    #[error("state file encoding: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store lock poisoned")]
    Poisoned,
}

pub trait CredentialStore: Send + Sync {
    /// # Errors
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<SecretString>, StoreError>;

    /// # Errors
    /// Returns an error if the backing storage cannot be written.
    fn set(&self, key: &str, value: &SecretString) -> Result<(), StoreError>;

    /// # Errors
    /// Returns an error if the backing storage cannot be written.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// JSON file backed store.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn load(&self) -> Result<Map<String, Value>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        if raw.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str(&raw)? {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::Corrupt {
                path: self.path.clone(),
            }),
        }
    }

    fn save(&self, map: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        // write to a sibling file first so readers never see a partial document
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(map)?).map_err(|e| self.io_error(e))?;
        restrict_permissions(&tmp).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;

        debug!(path = %self.path.display(), keys = map.len(), "state file saved");

        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut Map<String, Value>)) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut map = self.load()?;
        apply(&mut map);
        self.save(&map)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<SecretString>, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let map = self.load()?;
        Ok(map
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
            .map(|value| SecretString::from(value.to_string())))
    }

    fn set(&self, key: &str, value: &SecretString) -> Result<(), StoreError> {
        let value = value.expose_secret().to_string();
        self.update(|map| {
            map.insert(key.to_string(), Value::String(value));
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|map| {
            map.remove(key);
        })
    }
}

/// In-memory store, used when nothing should touch the disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, SecretString>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<SecretString>, StoreError> {
        let values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &SecretString) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        values.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    #[test]
    fn file_store_missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("session.json"));
        assert!(store.get(REFRESH_TOKEN_KEY).unwrap().is_none());
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        FileStore::new(&path)
            .set(REFRESH_TOKEN_KEY, &secret("refresh-1"))
            .unwrap();

        let reopened = FileStore::new(&path);
        let value = reopened.get(REFRESH_TOKEN_KEY).unwrap().unwrap();
        assert_eq!(value.expose_secret(), "refresh-1");
        assert!(reopened.get(TOKEN_KEY).unwrap().is_none());
    }

    #[test]
    fn file_store_remove_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("session.json"));
        store.set(TOKEN_KEY, &secret("access")).unwrap();
        store.set(REFRESH_TOKEN_KEY, &secret("refresh")).unwrap();

        store.remove(TOKEN_KEY).unwrap();

        assert!(store.get(TOKEN_KEY).unwrap().is_none());
        assert_eq!(
            store.get(REFRESH_TOKEN_KEY).unwrap().unwrap().expose_secret(),
            "refresh"
        );
    }

    #[test]
    fn file_store_rejects_non_object_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "[1, 2, 3]").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(
            store.get(TOKEN_KEY),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn file_store_ignores_empty_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, r#"{"refreshToken": ""}"#).unwrap();

        let store = FileStore::new(&path);
        assert!(store.get(REFRESH_TOKEN_KEY).unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = FileStore::new(&path);
        store.set(TOKEN_KEY, &secret("access")).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        store.set(REFRESH_TOKEN_KEY, &secret("r")).unwrap();
        assert_eq!(
            store.get(REFRESH_TOKEN_KEY).unwrap().unwrap().expose_secret(),
            "r"
        );
        store.remove(REFRESH_TOKEN_KEY).unwrap();
        assert!(store.get(REFRESH_TOKEN_KEY).unwrap().is_none());
    }
}
