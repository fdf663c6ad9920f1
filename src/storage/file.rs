//! File-backed store: one `<key>.json` document per key.

use super::KeyValueStore;
use crate::error::{CanopyError, Result};
use serde_json::Value;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::trace;

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open a store rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(CanopyError::storage(key, "invalid store key"));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key)?;
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(CanopyError::storage(key, err.to_string())),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|err| CanopyError::storage(key, format!("corrupt JSON: {err}")))
    }

    fn set(&mut self, key: &str, value: &Value) -> Result<()> {
        let path = self.path_for(key)?;
        let temp_path = self.dir.join(format!("{key}.json.tmp"));

        let write = || -> std::io::Result<()> {
            fs::create_dir_all(&self.dir)?;
            let file = fs::File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
            writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
            fs::rename(&temp_path, &path)
        };
        write().map_err(|err| {
            let _ = fs::remove_file(&temp_path);
            CanopyError::storage(key, err.to_string())
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            let _ = fs::set_permissions(&path, perms);
        }

        trace!(key, path = %path.display(), "Wrote store value");
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(CanopyError::storage(key, err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_roundtrip() {
        let temp = TempDir::new().expect("temp dir");
        let mut store = JsonFileStore::new(temp.path().join("state"));

        assert!(store.get("checkpoints").unwrap().is_none());
        store.set("checkpoints", &json!({"q": {"issues": []}})).unwrap();
        assert_eq!(
            store.get("checkpoints").unwrap(),
            Some(json!({"q": {"issues": []}}))
        );
        assert!(!temp.path().join("state/checkpoints.json.tmp").exists());

        store.remove("checkpoints").unwrap();
        store.remove("checkpoints").unwrap();
        assert!(store.get("checkpoints").unwrap().is_none());
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let temp = TempDir::new().expect("temp dir");
        let mut store = JsonFileStore::new(temp.path());
        assert!(store.set("../escape", &json!(1)).is_err());
        assert!(store.get("").is_err());
    }

    #[test]
    fn test_corrupt_file_is_storage_error() {
        let temp = TempDir::new().expect("temp dir");
        fs::write(temp.path().join("pending-changes.json"), "{not json").unwrap();
        let store = JsonFileStore::new(temp.path());
        assert!(matches!(
            store.get("pending-changes"),
            Err(CanopyError::Storage { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().expect("temp dir");
        let mut store = JsonFileStore::new(temp.path());
        store.set("expanded-nodes", &json!(["P-1"])).unwrap();
        let metadata = fs::metadata(temp.path().join("expanded-nodes.json")).unwrap();
        assert_eq!(metadata.permissions().mode() & 0o777, 0o600);
    }
}
