//! Persistence for calibration records.
//!
//! [`RawStorage`] mirrors the browser's string key/value storage API and
//! [`JsonRepository`] turns any such storage into a [`CalibrationRepository`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::calibration::CalibrationRecord;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("storage is not available")]
    Unavailable,
    #[error("storage quota exceeded while writing {0}")]
    QuotaExceeded(String),
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Typed record store keyed by the namespaced calibration key.
pub trait CalibrationRepository {
    /// Returns `None` for absent, malformed or invalid records.
    fn get(&self, key: &str) -> Option<CalibrationRecord>;

    fn put(&mut self, key: &str, record: &CalibrationRecord) -> Result<(), RepositoryError>;
}

/// String key/value storage.
pub trait RawStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, RepositoryError>;

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), RepositoryError>;
}

// ============================================================================
// JSON adapter
// ============================================================================

/// Stores records as JSON strings in a [`RawStorage`].
#[derive(Debug, Clone, Default)]
pub struct JsonRepository<S> {
    storage: S,
}

impl<S: RawStorage> JsonRepository<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_inner(self) -> S {
        self.storage
    }
}

impl<S: RawStorage> CalibrationRepository for JsonRepository<S> {
    fn get(&self, key: &str) -> Option<CalibrationRecord> {
        let raw = match self.storage.get_item(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "calibration read failed");
                return None;
            }
        };
        match serde_json::from_str::<CalibrationRecord>(&raw) {
            Ok(record) if record.is_valid() => Some(record),
            Ok(_) => {
                tracing::warn!(key, "ignoring invalid calibration record");
                None
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "ignoring malformed calibration record");
                None
            }
        }
    }

    fn put(&mut self, key: &str, record: &CalibrationRecord) -> Result<(), RepositoryError> {
        let json = serde_json::to_string(record)?;
        self.storage.set_item(key, &json)
    }
}

// ============================================================================
// In-memory storage
// ============================================================================

/// Single-owner in-memory storage with an optional byte quota.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: HashMap<String, String>,
    quota_bytes: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that rejects writes pushing the total key+value size past `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            items: HashMap::new(),
            quota_bytes: Some(bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn used_bytes_without(&self, key: &str) -> usize {
        self.items
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl RawStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), RepositoryError> {
        if let Some(quota) = self.quota_bytes {
            if self.used_bytes_without(key) + key.len() + value.len() > quota {
                return Err(RepositoryError::QuotaExceeded(key.to_owned()));
            }
        }
        self.items.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// Cloneable handle to one in-memory map. Writers are not coordinated; the
/// last write wins.
#[derive(Debug, Clone, Default)]
pub struct SharedMemoryStorage {
    items: Arc<RwLock<HashMap<String, String>>>,
}

impl SharedMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl RawStorage for SharedMemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self.items.read().get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), RepositoryError> {
        self.items.write().insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// Storage that is never available, e.g. when the browser denies access.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStorage;

impl RawStorage for NoStorage {
    fn get_item(&self, _key: &str) -> Result<Option<String>, RepositoryError> {
        Err(RepositoryError::Unavailable)
    }

    fn set_item(&mut self, _key: &str, _value: &str) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable)
    }
}
