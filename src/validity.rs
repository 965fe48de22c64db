//! Memo of device identifiers known to exist.

use log::debug;
use std::collections::HashSet;
use std::future::Future;
use tokio::sync::Mutex;

/// Existence lookup against the device registry
pub trait DeviceRegistry {
    fn device_exists(
        &self,
        jia_isu_uuid: &str,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
}

/// Why a device could not be confirmed
#[derive(Debug)]
pub enum ValidityError {
    NotFound,
    Lookup(sqlx::Error),
}

impl std::fmt::Display for ValidityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidityError::NotFound => write!(f, "device not found"),
            ValidityError::Lookup(e) => write!(f, "device lookup failed: {}", e),
        }
    }
}

impl std::error::Error for ValidityError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ValidityError::NotFound => None,
            ValidityError::Lookup(e) => Some(e),
        }
    }
}

/// Set of device identifiers confirmed to exist
///
/// Entries are never evicted for the lifetime of the cache.
pub struct ValidityCache<R> {
    registry: R,
    known: Mutex<HashSet<String>>,
}

impl<R: DeviceRegistry> ValidityCache<R> {
    pub fn new(registry: R) -> Self {
        Self {
            registry,
            known: Mutex::new(HashSet::new()),
        }
    }

    /// Return once the device is known to exist
    ///
    /// The lock is held across the registry lookup so concurrent first
    /// submissions for one device trigger a single lookup.
    pub async fn ensure_known(&self, jia_isu_uuid: &str) -> Result<(), ValidityError> {
        let mut known = self.known.lock().await;
        if known.contains(jia_isu_uuid) {
            return Ok(());
        }

        match self.registry.device_exists(jia_isu_uuid).await {
            Ok(true) => {
                debug!("Device {} confirmed, caching", jia_isu_uuid);
                known.insert(jia_isu_uuid.to_string());
                Ok(())
            }
            Ok(false) => Err(ValidityError::NotFound),
            Err(e) => Err(ValidityError::Lookup(e)),
        }
    }

    /// Record a device as existing without a lookup (after registration)
    pub async fn mark_known(&self, jia_isu_uuid: &str) {
        self.known.lock().await.insert(jia_isu_uuid.to_string());
    }

    pub async fn known_count(&self) -> usize {
        self.known.lock().await.len()
    }
}
