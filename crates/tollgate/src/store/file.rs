//! Filesystem storage backend.
//!
//! One file per key under a root directory; slashes in keys become
//! directories, created on demand when a record is written. `list` is a
//! single-level listing: it returns `prefix/name` entries and an empty
//! vec when the directory does not exist.

use std::path::{Path, PathBuf};

use tokio::fs;
use toll_common::TollError;

#[derive(Clone)]
pub struct FileStore {
    root: PathBuf,
}

fn io_err(e: std::io::Error) -> TollError {
    TollError::Storage(e.to_string())
}

impl FileStore {
    /// Open the storage root, creating it if needed.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, TollError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(io_err)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key.trim_start_matches('/'))
    }

    pub async fn put(&self, key: &str, value: &[u8]) -> Result<(), TollError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        fs::write(&path, value).await.map_err(io_err)
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>, TollError> {
        match fs::read(self.path_for(key)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TollError::NotFound(key.to_string()))
            }
            Err(e) => Err(io_err(e)),
        }
    }

    pub async fn key_exists(&self, key: &str) -> Result<bool, TollError> {
        match fs::metadata(self.path_for(key)).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err(e)),
        }
    }

    pub async fn list(&self, prefix: &str) -> Result<Vec<String>, TollError> {
        let dir = prefix.trim_start_matches('/').trim_end_matches('/');
        let mut entries = match fs::read_dir(self.root.join(dir)).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let file_type = entry.file_type().await.map_err(io_err)?;
            if file_type.is_dir() {
                continue;
            }
            keys.push(format!("{}/{}", dir, entry.file_name().to_string_lossy()));
        }
        Ok(keys)
    }

    pub async fn delete(&self, key: &str) -> Result<(), TollError> {
        fs::remove_file(self.path_for(key)).await.map_err(io_err)
    }
}
