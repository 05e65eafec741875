use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::{check_key, ObjectMeta, ObjectStore};
use crate::error::StorageError;

/// Object store backed by a directory tree.
pub struct FileObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl FileObjectStore {
    pub fn new<P: AsRef<Path>>(root: P, public_base_url: &str) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        check_key(key)?;
        Ok(self.root.join(key))
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

impl ObjectStore for FileObjectStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            self.ensure_directory(parent)?;
        }

        // create_new fails on an existing file, so a key is written once.
        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::ObjectExists(key.to_string()));
            }
            Err(e) => {
                return Err(StorageError::WriteObject {
                    key: key.to_string(),
                    source: e,
                });
            }
        };

        file.write_all(bytes).map_err(|e| StorageError::WriteObject {
            key: key.to_string(),
            source: e,
        })
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        std::fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
            _ => StorageError::ReadObject {
                key: key.to_string(),
                source: e,
            },
        })
    }

    fn head(&self, key: &str) -> Result<ObjectMeta, StorageError> {
        let path = self.path_for(key)?;
        let meta = std::fs::metadata(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
            _ => StorageError::ReadObject {
                key: key.to_string(),
                source: e,
            },
        })?;
        Ok(ObjectMeta {
            key: key.to_string(),
            size: meta.len(),
        })
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteObject {
                key: key.to_string(),
                source: e,
            }),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}
