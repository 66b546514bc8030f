//! Append-only audit trail for vault operations
//!
//! Records every mutating or export operation with a human-readable action
//! string. The ledger is stored as plaintext JSON, unlike the encrypted
//! collections: audit entries are low-sensitivity metadata, not secrets.
//! The ledger is capped; appending past the cap evicts the oldest entries.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::error;
use uuid::Uuid;

use crate::blobstore::BlobStore;
use crate::error::{VaultError, VaultResult};

/// Storage key for the audit ledger
pub const AUDIT_LOG_KEY: &str = "securepass_audit_log";

/// Default maximum entries retained
pub const MAX_LOG_ENTRIES: usize = 1000;

/// Single audit ledger entry, immutable once appended
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Size-bounded, append-only event ledger.
///
/// The ledger owns its storage key: nothing else writes it. Reads are
/// fail-soft (a corrupt ledger degrades to empty); appends are persisted
/// read-modify-write under an instance lock.
pub struct AuditLog {
    store: Arc<dyn BlobStore>,
    entries: Mutex<Vec<AuditEntry>>,
    max_entries: usize,
}

impl AuditLog {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self::with_capacity(store, MAX_LOG_ENTRIES)
    }

    pub fn with_capacity(store: Arc<dyn BlobStore>, max_entries: usize) -> Self {
        Self {
            store,
            entries: Mutex::new(Vec::new()),
            max_entries,
        }
    }

    /// Load the ledger from storage, defaulting to empty on any failure
    pub async fn load(&self) -> Vec<AuditEntry> {
        let mut entries = self.entries.lock().await;
        *entries = self.read_ledger().await;
        entries.clone()
    }

    /// Append an entry and persist the (possibly trimmed) ledger.
    ///
    /// Returns the appended entry. A persistence failure propagates; the
    /// in-memory ledger is not updated in that case.
    pub async fn append(&self, action: &str, detail: Option<String>) -> VaultResult<AuditEntry> {
        let entry = AuditEntry {
            id: Uuid::new_v4(),
            action: action.to_string(),
            detail,
            timestamp: Utc::now(),
        };

        let mut entries = self.entries.lock().await;

        let mut ledger = self.read_ledger().await;
        ledger.push(entry.clone());
        if ledger.len() > self.max_entries {
            let excess = ledger.len() - self.max_entries;
            ledger.drain(..excess);
        }

        let bytes = serde_json::to_vec(&ledger)?;
        self.store.set(AUDIT_LOG_KEY, &bytes).await?;

        *entries = ledger;
        Ok(entry)
    }

    /// The in-memory ledger as of the last load or append
    pub async fn snapshot(&self) -> Vec<AuditEntry> {
        self.entries.lock().await.clone()
    }

    /// Remove the ledger entirely
    pub async fn clear(&self) -> VaultResult<()> {
        let mut entries = self.entries.lock().await;
        self.store.remove(AUDIT_LOG_KEY).await?;
        entries.clear();
        Ok(())
    }

    async fn read_ledger(&self) -> Vec<AuditEntry> {
        let bytes = match self.store.get(AUDIT_LOG_KEY).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Vec::new(),
            Err(e) => {
                error!("failed to load audit ledger: {e}");
                return Vec::new();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(ledger) => ledger,
            Err(e) => {
                let corruption = VaultError::ReadCorruption(e.to_string());
                error!("audit ledger unreadable, starting empty: {corruption}");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blobstore::MemoryBlobStore;

    fn setup() -> AuditLog {
        AuditLog::new(Arc::new(MemoryBlobStore::new()))
    }

    #[tokio::test]
    async fn test_append_and_snapshot() {
        let log = setup();

        log.append("User registered", None).await.unwrap();
        log.append("Added password entry: Bank", Some("Bank".to_string()))
            .await
            .unwrap();

        let entries = log.snapshot().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "User registered");
        assert_eq!(entries[1].detail.as_deref(), Some("Bank"));
    }

    #[tokio::test]
    async fn test_ledger_survives_reload() {
        let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());

        let log = AuditLog::new(Arc::clone(&store));
        log.append("User logged in", None).await.unwrap();

        let fresh = AuditLog::new(store);
        let entries = fresh.load().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "User logged in");
    }

    #[tokio::test]
    async fn test_trims_to_most_recent() {
        let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
        let log = AuditLog::with_capacity(store, 1000);

        for i in 0..1005 {
            log.append(&format!("action {i}"), None).await.unwrap();
        }

        let entries = log.snapshot().await;
        assert_eq!(entries.len(), 1000);
        assert_eq!(entries[0].action, "action 5");
        assert_eq!(entries[999].action, "action 1004");
    }

    #[tokio::test]
    async fn test_corrupt_ledger_degrades_to_empty() {
        let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
        store.set(AUDIT_LOG_KEY, b"{not json").await.unwrap();

        let log = AuditLog::new(store);
        assert!(log.load().await.is_empty());

        // Appending over the corrupt ledger starts a fresh one
        log.append("User logged in", None).await.unwrap();
        assert_eq!(log.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_removes_ledger() {
        let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
        let log = AuditLog::new(Arc::clone(&store));

        log.append("User logged in", None).await.unwrap();
        log.clear().await.unwrap();

        assert!(log.snapshot().await.is_empty());
        assert!(store.get(AUDIT_LOG_KEY).await.unwrap().is_none());
    }
}
