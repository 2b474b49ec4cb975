//! Token Store
//!
//! Durable persistence for the single session record, layered over an
//! external key-value string store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{IdentityError, StorageError};
use crate::types::SessionRecord;

/// Well-known key the session record lives under.
pub const SESSION_STORAGE_KEY: &str = "identity.session";

/// External key-value storage medium (for dependency injection).
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &str) -> Result<Option<String>, IdentityError>;

    /// Write a value.
    async fn set(&self, key: &str, value: &str) -> Result<(), IdentityError>;

    /// Remove a value. Removing an absent key is a no-op.
    async fn remove(&self, key: &str) -> Result<(), IdentityError>;
}

/// In-memory storage backend.
#[derive(Default)]
pub struct InMemoryStorageBackend {
    values: Mutex<HashMap<String, String>>,
}

impl InMemoryStorageBackend {
    /// Create new in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorageBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, IdentityError> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), IdentityError> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), IdentityError> {
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Mock storage backend for testing.
#[derive(Default)]
pub struct MockStorageBackend {
    values: Mutex<HashMap<String, String>>,
    set_history: Mutex<Vec<(String, String)>>,
    remove_history: Mutex<Vec<String>>,
    should_fail: Mutex<bool>,
}

impl MockStorageBackend {
    /// Create new mock backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set backend to fail all operations.
    pub fn set_should_fail(&self, should_fail: bool) -> &Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    /// Pre-populate a raw value.
    pub fn add_value(&self, key: &str, value: &str) -> &Self {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Get write history.
    pub fn get_set_history(&self) -> Vec<(String, String)> {
        self.set_history.lock().unwrap().clone()
    }

    /// Get remove history.
    pub fn get_remove_history(&self) -> Vec<String> {
        self.remove_history.lock().unwrap().clone()
    }

    fn check_error(&self) -> Result<(), IdentityError> {
        if *self.should_fail.lock().unwrap() {
            return Err(IdentityError::Storage(StorageError::WriteFailed {
                message: "Mock storage failure".to_string(),
            }));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for MockStorageBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, IdentityError> {
        self.check_error()?;
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), IdentityError> {
        self.check_error()?;
        self.set_history
            .lock()
            .unwrap()
            .push((key.to_string(), value.to_string()));
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), IdentityError> {
        self.check_error()?;
        self.remove_history.lock().unwrap().push(key.to_string());
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Serializes the session record into the backing store.
///
/// All operations touch the backend directly; there is no caching layer.
pub struct TokenStore<B: StorageBackend> {
    backend: Arc<B>,
}

impl<B: StorageBackend> TokenStore<B> {
    /// Create new token store.
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Persist the session record, replacing any prior one.
    pub async fn save(&self, record: &SessionRecord) -> Result<(), IdentityError> {
        let serialized =
            serde_json::to_string(record).map_err(|e| StorageError::WriteFailed {
                message: e.to_string(),
            })?;
        self.backend.set(SESSION_STORAGE_KEY, &serialized).await
    }

    /// Load the persisted record. An absent record is a normal empty
    /// result, not an error.
    pub async fn load(&self) -> Result<Option<SessionRecord>, IdentityError> {
        let Some(serialized) = self.backend.get(SESSION_STORAGE_KEY).await? else {
            return Ok(None);
        };

        let record =
            serde_json::from_str(&serialized).map_err(|e| StorageError::CorruptedRecord {
                message: e.to_string(),
            })?;
        Ok(Some(record))
    }

    /// Remove the persisted record. Idempotent.
    pub async fn clear(&self) -> Result<(), IdentityError> {
        self.backend.remove(SESSION_STORAGE_KEY).await
    }
}
