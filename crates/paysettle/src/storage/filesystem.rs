use std::io::Write;
use std::path::{Component, Path, PathBuf};

use crate::error::StorageError;

/// Storage key for an uploaded payment file.
pub fn payment_file_key(file_id: &str) -> String {
    format!("payments/{}.csv", file_id)
}

/// Write-once object storage for uploaded files.
pub trait BlobStore: Send + Sync {
    /// Stores `content` under `key` and returns the stored path.
    fn put(&self, key: &str, content: &[u8]) -> Result<String, StorageError>;

    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;
}

/// Blob store rooted at a local directory.
pub struct FilesystemBlobStore {
    root: PathBuf,
}

impl FilesystemBlobStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `key` inside the root. Keys are relative, `/`-separated and
    /// may not climb out of the root.
    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let well_formed = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !well_formed {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }
}

impl BlobStore for FilesystemBlobStore {
    fn put(&self, key: &str, content: &[u8]) -> Result<String, StorageError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            self.ensure_directory(parent)?;
        }

        // create_new: never overwrite an earlier upload
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| StorageError::WriteFile {
                path: path.clone(),
                source: e,
            })?;
        file.write_all(content).map_err(|e| StorageError::WriteFile {
            path: path.clone(),
            source: e,
        })?;

        Ok(path.to_string_lossy().into_owned())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(key)?;
        std::fs::read(&path).map_err(|e| StorageError::ReadFile { path, source: e })
    }
}
