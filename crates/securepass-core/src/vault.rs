//! Assembled vault: one shared key manager and cipher behind the three
//! encrypted collections, the audit ledger, and authentication.

use std::sync::Arc;

use crate::audit::AuditLog;
use crate::auth::Authenticator;
use crate::blobstore::BlobStore;
use crate::config::VaultConfig;
use crate::crypto::{Cipher, CredentialHasher, KeyManager};
use crate::records::{AiCredentialRecord, BackupCodeRecord, PasswordRecord};
use crate::store::{VaultStore, AI_CREDENTIALS_KEY, BACKUP_CODES_KEY, PASSWORDS_KEY};

/// The vault core wired together over one byte store.
///
/// All collections share a single key manager, so the encryption key is
/// derived at most once per process regardless of which collection is
/// touched first.
pub struct Vault {
    pub audit: Arc<AuditLog>,
    pub auth: Authenticator,
    pub passwords: VaultStore<PasswordRecord>,
    pub backup_codes: VaultStore<BackupCodeRecord>,
    pub ai_credentials: VaultStore<AiCredentialRecord>,
}

impl Vault {
    pub fn new(store: Arc<dyn BlobStore>, config: &VaultConfig) -> Self {
        let keys = Arc::new(KeyManager::new(
            config.key_source.clone(),
            config.kdf_iterations,
        ));
        let cipher = Arc::new(Cipher::new(keys));
        let audit = Arc::new(AuditLog::with_capacity(
            Arc::clone(&store),
            config.audit_max_entries,
        ));

        Self {
            auth: Authenticator::new(
                Arc::clone(&store),
                CredentialHasher::new(config.kdf_iterations),
                Arc::clone(&audit),
            ),
            passwords: VaultStore::new(
                PASSWORDS_KEY,
                Arc::clone(&store),
                Arc::clone(&cipher),
                Arc::clone(&audit),
            ),
            backup_codes: VaultStore::new(
                BACKUP_CODES_KEY,
                Arc::clone(&store),
                Arc::clone(&cipher),
                Arc::clone(&audit),
            ),
            ai_credentials: VaultStore::new(
                AI_CREDENTIALS_KEY,
                Arc::clone(&store),
                Arc::clone(&cipher),
                Arc::clone(&audit),
            ),
            audit,
        }
    }
}
