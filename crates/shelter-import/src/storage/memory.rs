use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use super::{check_key, ObjectMeta, ObjectStore};
use crate::error::StorageError;

/// In-process object store.
///
/// Keys can be marked as failing (every call on them returns
/// `StorageError::Unavailable`) or dropped after staging, which lets tests
/// simulate an object store that loses or refuses individual blobs.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    failing: Mutex<HashSet<String>>,
    fail_puts_after: Mutex<Option<usize>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every operation on `key` fail.
    pub fn fail_key(&self, key: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(key.to_string());
        }
    }

    /// Lets the next `n` puts succeed and fails every put after that.
    pub fn fail_puts_after(&self, n: usize) {
        if let Ok(mut limit) = self.fail_puts_after.lock() {
            *limit = Some(n);
        }
    }

    /// Removes an object behind the importer's back.
    pub fn forget(&self, key: &str) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.remove(key);
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self, key: &str) -> Result<(), StorageError> {
        check_key(key)?;
        let failing = self
            .failing
            .lock()
            .map_err(|_| StorageError::Unavailable("lock poisoned".to_string()))?;
        if failing.contains(key) {
            return Err(StorageError::Unavailable(format!("injected failure for {}", key)));
        }
        Ok(())
    }

    fn objects(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>, StorageError> {
        self.objects
            .lock()
            .map_err(|_| StorageError::Unavailable("lock poisoned".to_string()))
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.check(key)?;
        {
            let mut limit = self
                .fail_puts_after
                .lock()
                .map_err(|_| StorageError::Unavailable("lock poisoned".to_string()))?;
            match limit.as_mut() {
                Some(0) => {
                    return Err(StorageError::Unavailable(format!(
                        "injected put failure for {}",
                        key
                    )))
                }
                Some(n) => *n -= 1,
                None => {}
            }
        }

        let mut objects = self.objects()?;
        if objects.contains_key(key) {
            return Err(StorageError::ObjectExists(key.to_string()));
        }
        objects.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.check(key)?;
        self.objects()?
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn head(&self, key: &str) -> Result<ObjectMeta, StorageError> {
        self.check(key)?;
        self.objects()?
            .get(key)
            .map(|bytes| ObjectMeta {
                key: key.to_string(),
                size: bytes.len() as u64,
            })
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.check(key)?;
        self.objects()?.remove(key);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("memory://{}", key)
    }
}
