//! Account registration and login
//!
//! Authentication is independent of the encrypted collections: account
//! passwords are one-way hashed per account (never used as encryption keys)
//! and stored under a per-email key. A minimal identity marker is cached so
//! a session survives restarts without re-authentication; its presence alone
//! is sufficient to be treated as logged in.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::audit::AuditLog;
use crate::blobstore::BlobStore;
use crate::crypto::CredentialHasher;
use crate::error::{VaultError, VaultResult};

/// Storage key for the cached session identity
pub const USER_KEY: &str = "securepass_user";

/// Storage key for one account's credential record
pub fn credential_key(email: &str) -> String {
    format!("securepass_creds_{email}")
}

/// Authenticated identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// One registered account's stored credential.
///
/// Protected only by the one-way hash; never passed through the vault
/// cipher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountCredential {
    pub hashed_password: String,
    pub salt: String,
    pub created_at: DateTime<Utc>,
}

/// Login, registration, and session restore over the byte store
pub struct Authenticator {
    store: Arc<dyn BlobStore>,
    hasher: CredentialHasher,
    audit: Arc<AuditLog>,
    session: Mutex<Option<User>>,
}

impl Authenticator {
    pub fn new(store: Arc<dyn BlobStore>, hasher: CredentialHasher, audit: Arc<AuditLog>) -> Self {
        Self {
            store,
            hasher,
            audit,
            session: Mutex::new(None),
        }
    }

    /// Create an account and start a session for it
    pub async fn register(&self, email: &str, password: &str) -> VaultResult<User> {
        let key = credential_key(email);
        if self.store.get(&key).await?.is_some() {
            return Err(VaultError::AccountExists);
        }

        let (hashed_password, salt) = self.hasher.hash_password(password);
        let credential = AccountCredential {
            hashed_password,
            salt,
            created_at: Utc::now(),
        };
        self.store
            .set(&key, &serde_json::to_vec(&credential)?)
            .await?;

        let user = self.start_session(email).await?;
        self.audit_best_effort("User registered").await;
        Ok(user)
    }

    /// Verify credentials and start a session.
    ///
    /// Unknown email and wrong password produce the same failure; the
    /// message never distinguishes them.
    pub async fn login(&self, email: &str, password: &str) -> VaultResult<User> {
        let stored = self
            .store
            .get(&credential_key(email))
            .await?
            .ok_or(VaultError::AuthenticationFailure)?;

        let credential: AccountCredential = serde_json::from_slice(&stored)
            .map_err(|_| VaultError::AuthenticationFailure)?;

        if !self.hasher.verify_password(
            password,
            &credential.hashed_password,
            &credential.salt,
        ) {
            return Err(VaultError::AuthenticationFailure);
        }

        let user = self.start_session(email).await?;
        self.audit_best_effort("User logged in").await;
        Ok(user)
    }

    /// End the session and drop the cached identity
    pub async fn logout(&self) -> VaultResult<()> {
        let mut session = self.session.lock().await;
        self.store.remove(USER_KEY).await?;
        *session = None;
        self.audit_best_effort("User logged out").await;
        Ok(())
    }

    /// Restore the session from the cached identity, if any.
    ///
    /// An unparseable cache is discarded rather than surfaced.
    pub async fn current_user(&self) -> Option<User> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return session.clone();
        }

        let bytes = self.store.get(USER_KEY).await.ok()??;
        match serde_json::from_slice::<User>(&bytes) {
            Ok(user) => {
                *session = Some(user.clone());
                Some(user)
            }
            Err(_) => {
                let _ = self.store.remove(USER_KEY).await;
                None
            }
        }
    }

    /// Record a password-recovery request for an existing account.
    ///
    /// Delivery of the recovery message is an external collaborator; the
    /// core only verifies the account and audits the request.
    pub async fn recover_password(&self, email: &str) -> VaultResult<()> {
        if self.store.get(&credential_key(email)).await?.is_none() {
            return Err(VaultError::AuthenticationFailure);
        }

        self.audit_best_effort(&format!("Password recovery requested for {email}"))
            .await;
        Ok(())
    }

    async fn start_session(&self, email: &str) -> VaultResult<User> {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            created_at: Utc::now(),
        };

        let mut session = self.session.lock().await;
        self.store
            .set(USER_KEY, &serde_json::to_vec(&user)?)
            .await?;
        *session = Some(user.clone());
        Ok(user)
    }

    async fn audit_best_effort(&self, action: &str) {
        if let Err(e) = self.audit.append(action, None).await {
            warn!("audit entry not recorded: {e}");
        }
    }
}
