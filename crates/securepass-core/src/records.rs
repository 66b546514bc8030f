//! Record types for the three encrypted collections
//!
//! All three collections share the same shape constraints (immutable `id`,
//! `created_at` set once, `updated_at` refreshed on every mutation); the
//! `VaultRecord` trait captures that shape so one generic store serves all
//! of them.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Shape contract for records held in an encrypted collection.
///
/// `Draft` is the caller-supplied portion of a new record (everything except
/// `id` and the timestamps); `Patch` is a partial update where absent fields
/// leave the record untouched.
pub trait VaultRecord:
    Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{
    type Draft: Send;
    type Patch: Send + Sync;

    /// Build a full record from a draft
    fn from_draft(draft: Self::Draft, id: Uuid, now: DateTime<Utc>) -> Self;

    fn id(&self) -> Uuid;

    /// Merge a patch into this record and refresh `updated_at`
    fn apply_patch(&mut self, patch: &Self::Patch, now: DateTime<Utc>);

    /// Primary human-readable label, used in audit entries
    fn label(&self) -> &str;

    /// Label carried by a patch, if the patch touches it
    fn patch_label(patch: &Self::Patch) -> Option<&str>;

    fn describe_add(label: &str) -> String;
    fn describe_update(label: &str) -> String;
    fn describe_remove(label: &str) -> String;
    fn describe_export() -> String;
}

// ---------------------------------------------------------------------------
// Passwords
// ---------------------------------------------------------------------------

/// A stored login credential
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PasswordRecord {
    pub id: Uuid,
    pub title: String,
    pub username: String,
    pub password: String,
    pub website: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied fields of a new password record
#[derive(Debug, Clone)]
pub struct PasswordDraft {
    pub title: String,
    pub username: String,
    pub password: String,
    pub website: String,
    pub notes: String,
}

/// Partial update of a password record
#[derive(Debug, Clone, Default)]
pub struct PasswordPatch {
    pub title: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
}

impl VaultRecord for PasswordRecord {
    type Draft = PasswordDraft;
    type Patch = PasswordPatch;

    fn from_draft(draft: PasswordDraft, id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title,
            username: draft.username,
            password: draft.password,
            website: draft.website,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
        }
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn apply_patch(&mut self, patch: &PasswordPatch, now: DateTime<Utc>) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(username) = &patch.username {
            self.username = username.clone();
        }
        if let Some(password) = &patch.password {
            self.password = password.clone();
        }
        if let Some(website) = &patch.website {
            self.website = website.clone();
        }
        if let Some(notes) = &patch.notes {
            self.notes = notes.clone();
        }
        self.updated_at = now;
    }

    fn label(&self) -> &str {
        &self.title
    }

    fn patch_label(patch: &PasswordPatch) -> Option<&str> {
        patch.title.as_deref()
    }

    fn describe_add(label: &str) -> String {
        format!("Added password entry: {label}")
    }

    fn describe_update(label: &str) -> String {
        format!("Updated password entry: {label}")
    }

    fn describe_remove(label: &str) -> String {
        format!("Deleted password entry: {label}")
    }

    fn describe_export() -> String {
        "Exported password entries".to_string()
    }
}

/// A password record as supplied by an external import.
///
/// Candidates may carry their own id and creation time; missing fields are
/// filled in at import. Supplied ids are accepted as-is, without a
/// uniqueness check against the existing collection.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PasswordImport {
    pub id: Option<Uuid>,
    pub title: String,
    pub username: String,
    pub password: String,
    pub website: String,
    pub notes: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl PasswordImport {
    /// A candidate is accepted only when all required fields are non-empty
    pub fn is_valid(&self) -> bool {
        !self.title.is_empty() && !self.username.is_empty() && !self.password.is_empty()
    }

    /// Materialize the candidate into a record
    pub fn into_record(self, now: DateTime<Utc>) -> PasswordRecord {
        PasswordRecord {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            title: self.title,
            username: self.username,
            password: self.password,
            website: self.website,
            notes: self.notes,
            created_at: self.created_at.unwrap_or(now),
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Two-factor backup codes
// ---------------------------------------------------------------------------

/// One-time backup codes for a service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupCodeRecord {
    pub id: Uuid,
    pub service: String,
    pub codes: Vec<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BackupCodeDraft {
    pub service: String,
    pub codes: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct BackupCodePatch {
    pub service: Option<String>,
    pub codes: Option<Vec<String>>,
    pub description: Option<String>,
}

impl VaultRecord for BackupCodeRecord {
    type Draft = BackupCodeDraft;
    type Patch = BackupCodePatch;

    fn from_draft(draft: BackupCodeDraft, id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id,
            service: draft.service,
            codes: draft.codes,
            description: draft.description,
            created_at: now,
            updated_at: now,
        }
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn apply_patch(&mut self, patch: &BackupCodePatch, now: DateTime<Utc>) {
        if let Some(service) = &patch.service {
            self.service = service.clone();
        }
        if let Some(codes) = &patch.codes {
            self.codes = codes.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        self.updated_at = now;
    }

    fn label(&self) -> &str {
        &self.service
    }

    fn patch_label(patch: &BackupCodePatch) -> Option<&str> {
        patch.service.as_deref()
    }

    fn describe_add(label: &str) -> String {
        format!("Added backup codes for: {label}")
    }

    fn describe_update(label: &str) -> String {
        format!("Updated backup codes for: {label}")
    }

    fn describe_remove(label: &str) -> String {
        format!("Deleted backup codes for: {label}")
    }

    fn describe_export() -> String {
        "Exported backup codes".to_string()
    }
}

// ---------------------------------------------------------------------------
// AI service credentials
// ---------------------------------------------------------------------------

/// An API key for an AI service, with an optional custom endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AiCredentialRecord {
    pub id: Uuid,
    pub service: String,
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AiCredentialDraft {
    pub service: String,
    pub api_key: String,
    pub endpoint: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct AiCredentialPatch {
    pub service: Option<String>,
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub description: Option<String>,
}

impl VaultRecord for AiCredentialRecord {
    type Draft = AiCredentialDraft;
    type Patch = AiCredentialPatch;

    fn from_draft(draft: AiCredentialDraft, id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id,
            service: draft.service,
            api_key: draft.api_key,
            endpoint: draft.endpoint,
            description: draft.description,
            created_at: now,
            updated_at: now,
        }
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn apply_patch(&mut self, patch: &AiCredentialPatch, now: DateTime<Utc>) {
        if let Some(service) = &patch.service {
            self.service = service.clone();
        }
        if let Some(api_key) = &patch.api_key {
            self.api_key = api_key.clone();
        }
        if let Some(endpoint) = &patch.endpoint {
            self.endpoint = Some(endpoint.clone());
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        self.updated_at = now;
    }

    fn label(&self) -> &str {
        &self.service
    }

    fn patch_label(patch: &AiCredentialPatch) -> Option<&str> {
        patch.service.as_deref()
    }

    fn describe_add(label: &str) -> String {
        format!("Added AI credential for: {label}")
    }

    fn describe_update(label: &str) -> String {
        format!("Updated AI credential for: {label}")
    }

    fn describe_remove(label: &str) -> String {
        format!("Deleted AI credential for: {label}")
    }

    fn describe_export() -> String {
        "Exported AI credentials".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_sets_both_timestamps() {
        let now = Utc::now();
        let record = PasswordRecord::from_draft(
            PasswordDraft {
                title: "Bank".to_string(),
                username: "alice".to_string(),
                password: "x".to_string(),
                website: "bank.com".to_string(),
                notes: String::new(),
            },
            Uuid::new_v4(),
            now,
        );

        assert_eq!(record.created_at, now);
        assert_eq!(record.updated_at, now);
    }

    #[test]
    fn test_patch_refreshes_updated_at_only() {
        let created = Utc::now();
        let mut record = PasswordRecord::from_draft(
            PasswordDraft {
                title: "Bank".to_string(),
                username: "alice".to_string(),
                password: "x".to_string(),
                website: "bank.com".to_string(),
                notes: String::new(),
            },
            Uuid::new_v4(),
            created,
        );

        let later = created + chrono::Duration::seconds(5);
        record.apply_patch(
            &PasswordPatch {
                password: Some("y".to_string()),
                ..Default::default()
            },
            later,
        );

        assert_eq!(record.password, "y");
        assert_eq!(record.title, "Bank");
        assert_eq!(record.created_at, created);
        assert_eq!(record.updated_at, later);
    }

    #[test]
    fn test_import_validation() {
        let valid = PasswordImport {
            title: "Bank".to_string(),
            username: "alice".to_string(),
            password: "x".to_string(),
            ..Default::default()
        };
        assert!(valid.is_valid());

        let missing_password = PasswordImport {
            title: "Bank".to_string(),
            username: "alice".to_string(),
            ..Default::default()
        };
        assert!(!missing_password.is_valid());
    }

    #[test]
    fn test_import_preserves_supplied_identity() {
        let id = Uuid::new_v4();
        let created = Utc::now() - chrono::Duration::days(30);
        let now = Utc::now();

        let record = PasswordImport {
            id: Some(id),
            title: "Bank".to_string(),
            username: "alice".to_string(),
            password: "x".to_string(),
            created_at: Some(created),
            ..Default::default()
        }
        .into_record(now);

        assert_eq!(record.id, id);
        assert_eq!(record.created_at, created);
        assert_eq!(record.updated_at, now);
    }

    #[test]
    fn test_record_json_shape() {
        let record = AiCredentialRecord::from_draft(
            AiCredentialDraft {
                service: "OpenAI".to_string(),
                api_key: "sk-test".to_string(),
                endpoint: None,
                description: String::new(),
            },
            Uuid::new_v4(),
            Utc::now(),
        );

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("apiKey").is_some());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("endpoint").is_none());
    }
}
