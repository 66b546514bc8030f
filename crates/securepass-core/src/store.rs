//! Generic encrypted collection storage
//!
//! A `VaultStore<T>` owns one storage key holding one envelope whose
//! decrypted payload is the JSON array of records. Reads are fail-soft (a
//! missing or unreadable collection is an empty one); writes are fail-hard.
//! Every mutating operation runs a full load-modify-save cycle under a
//! per-instance lock and appends one audit entry.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{error, warn};
use uuid::Uuid;

use crate::audit::AuditLog;
use crate::blobstore::BlobStore;
use crate::crypto::Cipher;
use crate::error::{VaultError, VaultResult};
use crate::records::{PasswordImport, PasswordRecord, VaultRecord};

/// Storage key for the password collection
pub const PASSWORDS_KEY: &str = "securepass_passwords";

/// Storage key for the backup-code collection
pub const BACKUP_CODES_KEY: &str = "securepass_backup_codes";

/// Storage key for the AI-credential collection
pub const AI_CREDENTIALS_KEY: &str = "securepass_ai_credentials";

/// Encrypted collection of records of one kind.
///
/// The store is the sole writer of its storage key. The in-memory list
/// always reflects the last successful load or save.
pub struct VaultStore<T: VaultRecord> {
    storage_key: String,
    store: Arc<dyn BlobStore>,
    cipher: Arc<Cipher>,
    audit: Arc<AuditLog>,
    records: Mutex<Vec<T>>,
}

impl<T: VaultRecord> VaultStore<T> {
    pub fn new(
        storage_key: &str,
        store: Arc<dyn BlobStore>,
        cipher: Arc<Cipher>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            storage_key: storage_key.to_string(),
            store,
            cipher,
            audit,
            records: Mutex::new(Vec::new()),
        }
    }

    /// Load the collection from storage.
    ///
    /// An absent key is a valid empty vault. Present-but-unreadable data is
    /// logged as `ReadCorruption` and degraded to an empty collection rather
    /// than locking the caller out.
    pub async fn load(&self) -> Vec<T> {
        let mut records = self.records.lock().await;
        *records = self.read_collection().await;
        records.clone()
    }

    /// Replace the collection wholesale and persist it.
    ///
    /// The in-memory list is updated only after the write succeeds.
    pub async fn save(&self, list: Vec<T>) -> VaultResult<()> {
        let mut records = self.records.lock().await;
        self.persist(&list).await?;
        *records = list;
        Ok(())
    }

    /// Create a record from a draft, persist, and audit it
    pub async fn add(&self, draft: T::Draft) -> VaultResult<T> {
        let mut records = self.records.lock().await;

        let record = T::from_draft(draft, Uuid::new_v4(), Utc::now());

        let mut list = self.read_collection().await;
        list.push(record.clone());
        self.persist(&list).await?;
        *records = list;

        self.audit_best_effort(&T::describe_add(record.label())).await;
        Ok(record)
    }

    /// Merge a patch into the record with the given id.
    ///
    /// A missing id is a benign no-op: the collection is unchanged but it is
    /// still persisted and exactly one audit entry is appended.
    pub async fn update(&self, id: Uuid, patch: T::Patch) -> VaultResult<()> {
        let mut records = self.records.lock().await;

        let now = Utc::now();
        let mut list = self.read_collection().await;
        for record in list.iter_mut() {
            if record.id() == id {
                record.apply_patch(&patch, now);
            }
        }
        self.persist(&list).await?;
        *records = list;

        let label = T::patch_label(&patch).unwrap_or("Unknown");
        self.audit_best_effort(&T::describe_update(label)).await;
        Ok(())
    }

    /// Remove the record with the given id, persist, and audit it
    pub async fn remove(&self, id: Uuid) -> VaultResult<()> {
        let mut records = self.records.lock().await;

        let mut list = self.read_collection().await;
        let label = list
            .iter()
            .find(|r| r.id() == id)
            .map(|r| r.label().to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        list.retain(|r| r.id() != id);
        self.persist(&list).await?;
        *records = list;

        self.audit_best_effort(&T::describe_remove(&label)).await;
        Ok(())
    }

    /// The current plaintext collection, with the export recorded in the
    /// audit trail.
    ///
    /// Downstream handling of the returned records is the caller's
    /// responsibility; they leave the core's confidentiality guarantee here.
    pub async fn export_all(&self) -> Vec<T> {
        let snapshot = self.records.lock().await.clone();
        self.audit_best_effort(&T::describe_export()).await;
        snapshot
    }

    /// Read-only snapshot of the in-memory collection, no audit entry
    pub async fn snapshot(&self) -> Vec<T> {
        self.records.lock().await.clone()
    }

    /// Fail-soft read of the stored collection
    async fn read_collection(&self) -> Vec<T> {
        let envelope = match self.store.get(&self.storage_key).await {
            Ok(Some(bytes)) => match String::from_utf8(bytes) {
                Ok(envelope) => envelope,
                Err(e) => {
                    self.log_corruption(&VaultError::ReadCorruption(e.to_string()));
                    return Vec::new();
                }
            },
            Ok(None) => return Vec::new(),
            Err(e) => {
                self.log_corruption(&e);
                return Vec::new();
            }
        };

        let plaintext = match self.cipher.decrypt(&envelope).await {
            Ok(plaintext) => plaintext,
            Err(e) => {
                self.log_corruption(&e);
                return Vec::new();
            }
        };

        match serde_json::from_slice(&plaintext) {
            Ok(list) => list,
            Err(e) => {
                self.log_corruption(&VaultError::ReadCorruption(e.to_string()));
                Vec::new()
            }
        }
    }

    /// Serialize, encrypt, and write the collection (fail-hard)
    async fn persist(&self, list: &[T]) -> VaultResult<()> {
        let plaintext = serde_json::to_vec(list)?;
        let envelope = self.cipher.encrypt(&plaintext).await?;
        self.store.set(&self.storage_key, envelope.as_bytes()).await
    }

    /// Audit writes never fail a data operation that already succeeded
    async fn audit_best_effort(&self, action: &str) {
        if let Err(e) = self.audit.append(action, None).await {
            warn!("audit entry not recorded for {}: {e}", self.storage_key);
        }
    }

    fn log_corruption(&self, e: &VaultError) {
        error!(
            "failed to load collection {}, treating as empty: {e}",
            self.storage_key
        );
    }
}

impl VaultStore<PasswordRecord> {
    /// Import externally supplied password records.
    ///
    /// Candidates missing a required field are dropped. A supplied id or
    /// creation time is preserved; `updated_at` is always refreshed. Returns
    /// the number of accepted candidates.
    pub async fn import_many(&self, candidates: Vec<PasswordImport>) -> VaultResult<usize> {
        let mut records = self.records.lock().await;

        let now = Utc::now();
        let accepted: Vec<PasswordRecord> = candidates
            .into_iter()
            .filter(PasswordImport::is_valid)
            .map(|candidate| candidate.into_record(now))
            .collect();
        let count = accepted.len();

        let mut list = self.read_collection().await;
        list.extend(accepted);
        self.persist(&list).await?;
        *records = list;

        self.audit_best_effort(&format!("Imported {count} password entries"))
            .await;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blobstore::MemoryBlobStore;
    use crate::config::KeySource;
    use crate::crypto::KeyManager;
    use crate::records::{PasswordDraft, PasswordPatch};

    struct Fixture {
        store: Arc<dyn BlobStore>,
        cipher: Arc<Cipher>,
        audit: Arc<AuditLog>,
    }

    impl Fixture {
        fn new() -> Self {
            let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
            let keys = Arc::new(KeyManager::new(KeySource::BuiltIn, 1000));
            Self {
                cipher: Arc::new(Cipher::new(keys)),
                audit: Arc::new(AuditLog::new(Arc::clone(&store))),
                store,
            }
        }

        fn passwords(&self) -> VaultStore<PasswordRecord> {
            VaultStore::new(
                PASSWORDS_KEY,
                Arc::clone(&self.store),
                Arc::clone(&self.cipher),
                Arc::clone(&self.audit),
            )
        }
    }

    fn bank_draft() -> PasswordDraft {
        PasswordDraft {
            title: "Bank".to_string(),
            username: "alice".to_string(),
            password: "x".to_string(),
            website: "bank.com".to_string(),
            notes: String::new(),
        }
    }

    #[tokio::test]
    async fn test_load_empty_vault() {
        let fixture = Fixture::new();
        assert!(fixture.passwords().load().await.is_empty());
    }

    #[tokio::test]
    async fn test_add_and_reload() {
        let fixture = Fixture::new();
        let store = fixture.passwords();

        let record = store.add(bank_draft()).await.unwrap();
        assert_eq!(record.created_at, record.updated_at);

        // A fresh store instance over the same byte store sees the record
        let fresh = fixture.passwords();
        let loaded = fresh.load().await;
        assert_eq!(loaded, vec![record]);
    }

    #[tokio::test]
    async fn test_stored_blob_is_not_plaintext() {
        let fixture = Fixture::new();
        fixture.passwords().add(bank_draft()).await.unwrap();

        let blob = fixture.store.get(PASSWORDS_KEY).await.unwrap().unwrap();
        let stored = String::from_utf8(blob).unwrap();
        assert!(!stored.contains("Bank"));
        assert!(!stored.contains("alice"));
    }

    #[tokio::test]
    async fn test_ids_are_unique_and_stable() {
        let fixture = Fixture::new();
        let store = fixture.passwords();

        let first = store.add(bank_draft()).await.unwrap();
        let second = store.add(bank_draft()).await.unwrap();
        assert_ne!(first.id, second.id);

        store
            .update(
                first.id,
                PasswordPatch {
                    notes: Some("checking".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let loaded = store.load().await;
        let updated = loaded.iter().find(|r| r.id == first.id).unwrap();
        assert_eq!(updated.notes, "checking");
        assert_eq!(updated.created_at, first.created_at);
        assert!(updated.updated_at >= first.updated_at);
    }

    #[tokio::test]
    async fn test_update_missing_id_is_benign_noop() {
        let fixture = Fixture::new();
        let store = fixture.passwords();
        let record = store.add(bank_draft()).await.unwrap();

        let audit_before = fixture.audit.snapshot().await.len();
        store
            .update(
                Uuid::new_v4(),
                PasswordPatch {
                    title: Some("Nobody".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let loaded = store.load().await;
        assert_eq!(loaded, vec![record]);

        let audit_after = fixture.audit.snapshot().await;
        assert_eq!(audit_after.len(), audit_before + 1);
        assert_eq!(
            audit_after.last().unwrap().action,
            "Updated password entry: Nobody"
        );
    }

    #[tokio::test]
    async fn test_remove_logs_label() {
        let fixture = Fixture::new();
        let store = fixture.passwords();

        let record = store.add(bank_draft()).await.unwrap();
        store.remove(record.id).await.unwrap();

        assert!(store.load().await.is_empty());
        let entries = fixture.audit.snapshot().await;
        assert_eq!(
            entries.last().unwrap().action,
            "Deleted password entry: Bank"
        );

        // Removing again logs "Unknown"
        store.remove(record.id).await.unwrap();
        let entries = fixture.audit.snapshot().await;
        assert_eq!(
            entries.last().unwrap().action,
            "Deleted password entry: Unknown"
        );
    }

    #[tokio::test]
    async fn test_corrupt_envelope_degrades_to_empty() {
        let fixture = Fixture::new();
        let store = fixture.passwords();
        store.add(bank_draft()).await.unwrap();

        fixture
            .store
            .set(PASSWORDS_KEY, b"AAAA not an envelope")
            .await
            .unwrap();

        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_export_logs_and_returns_snapshot() {
        let fixture = Fixture::new();
        let store = fixture.passwords();
        let record = store.add(bank_draft()).await.unwrap();

        let exported = store.export_all().await;
        assert_eq!(exported, vec![record]);

        let entries = fixture.audit.snapshot().await;
        assert_eq!(entries.last().unwrap().action, "Exported password entries");
    }

    #[tokio::test]
    async fn test_import_filters_and_counts() {
        let fixture = Fixture::new();
        let store = fixture.passwords();

        let supplied_id = Uuid::new_v4();
        let candidates = vec![
            PasswordImport {
                id: Some(supplied_id),
                title: "Bank".to_string(),
                username: "alice".to_string(),
                password: "x".to_string(),
                ..Default::default()
            },
            PasswordImport {
                title: "No username".to_string(),
                password: "y".to_string(),
                ..Default::default()
            },
        ];

        let count = store.import_many(candidates).await.unwrap();
        assert_eq!(count, 1);

        let loaded = store.load().await;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, supplied_id);

        let entries = fixture.audit.snapshot().await;
        assert_eq!(entries.last().unwrap().action, "Imported 1 password entries");
    }

    #[tokio::test]
    async fn test_mutations_see_writes_from_sibling_instance() {
        let fixture = Fixture::new();
        let first = fixture.passwords();
        let second = fixture.passwords();

        first.add(bank_draft()).await.unwrap();

        // A second instance that never called load still starts its
        // load-modify-save cycle from the stored state.
        let mut draft = bank_draft();
        draft.title = "Email".to_string();
        second.add(draft).await.unwrap();

        assert_eq!(first.load().await.len(), 2);
    }
}
