//! Byte-addressable blob storage backing the vault
//!
//! The vault core treats persistence as a string-keyed map of opaque blobs.
//! `FileBlobStore` is the durable implementation (one file per key, atomic
//! writes); `MemoryBlobStore` backs tests and ephemeral use.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{VaultError, VaultResult};

/// Default data directory name
const DATA_DIR: &str = ".securepass";

/// Get the default data directory path
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DATA_DIR)
}

/// String-keyed map of opaque byte blobs.
///
/// Write failures must surface as `PersistenceFailure`; an absent key is a
/// valid state, not an error.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read the blob at `key`, or `None` if absent
    async fn get(&self, key: &str) -> VaultResult<Option<Vec<u8>>>;

    /// Write the blob at `key`
    async fn set(&self, key: &str, value: &[u8]) -> VaultResult<()>;

    /// Remove the blob at `key`; removing an absent key is a no-op
    async fn remove(&self, key: &str) -> VaultResult<()>;
}

/// In-process blob store
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.blobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> VaultResult<Option<Vec<u8>>> {
        Ok(self.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> VaultResult<()> {
        self.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> VaultResult<()> {
        self.lock().remove(key);
        Ok(())
    }
}

/// File-backed blob store: one file per key under a data directory.
///
/// Writes go to a temp file first and are renamed into place, so a partially
/// written blob is never observable. Unix permissions are 700 on the
/// directory and 600 on each blob file.
pub struct FileBlobStore {
    base_dir: PathBuf,
}

impl FileBlobStore {
    /// Open a store rooted at `base_dir`, creating the directory if needed
    pub async fn open(base_dir: &Path) -> VaultResult<Self> {
        if !base_dir.exists() {
            fs::create_dir_all(base_dir).await?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let perms = std::fs::Permissions::from_mode(0o700);
                std::fs::set_permissions(base_dir, perms)?;
            }
        }

        Ok(Self {
            base_dir: base_dir.to_path_buf(),
        })
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(encode_key(key))
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn get(&self, key: &str) -> VaultResult<Option<Vec<u8>>> {
        match fs::read(self.blob_path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> VaultResult<()> {
        let path = self.blob_path(key);
        let temp_path = self.base_dir.join(format!("{}.tmp", encode_key(key)));

        let write = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(value).await?;
            file.sync_all().await?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let perms = std::fs::Permissions::from_mode(0o600);
                std::fs::set_permissions(&temp_path, perms)?;
            }

            fs::rename(&temp_path, &path).await
        };

        write
            .await
            .map_err(|e: std::io::Error| VaultError::PersistenceFailure(e.to_string()))
    }

    async fn remove(&self, key: &str) -> VaultResult<()> {
        match fs::remove_file(self.blob_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Map a storage key to a safe file name.
///
/// Keys may contain arbitrary text (account emails are embedded in
/// credential keys); every byte outside [A-Za-z0-9._-] is percent-encoded.
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
                encoded.push(byte as char);
            }
            _ => {
                encoded.push('%');
                encoded.push_str(&format!("{byte:02X}"));
            }
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryBlobStore::new();

        assert!(store.get("missing").await.unwrap().is_none());

        store.set("key", b"value").await.unwrap();
        assert_eq!(store.get("key").await.unwrap().unwrap(), b"value");

        store.remove("key").await.unwrap();
        assert!(store.get("key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileBlobStore::open(temp_dir.path()).await.unwrap();

        assert!(store.get("securepass_passwords").await.unwrap().is_none());

        store.set("securepass_passwords", b"envelope").await.unwrap();
        assert_eq!(
            store.get("securepass_passwords").await.unwrap().unwrap(),
            b"envelope"
        );

        // Overwrite is atomic from the reader's perspective
        store.set("securepass_passwords", b"envelope2").await.unwrap();
        assert_eq!(
            store.get("securepass_passwords").await.unwrap().unwrap(),
            b"envelope2"
        );

        store.remove("securepass_passwords").await.unwrap();
        assert!(store.get("securepass_passwords").await.unwrap().is_none());

        // Removing an absent key is a no-op
        store.remove("securepass_passwords").await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();

        {
            let store = FileBlobStore::open(temp_dir.path()).await.unwrap();
            store.set("key", b"durable").await.unwrap();
        }

        let store = FileBlobStore::open(temp_dir.path()).await.unwrap();
        assert_eq!(store.get("key").await.unwrap().unwrap(), b"durable");
    }

    #[tokio::test]
    async fn test_keys_with_special_characters() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileBlobStore::open(temp_dir.path()).await.unwrap();

        let key = "securepass_creds_alice@example.com";
        store.set(key, b"creds").await.unwrap();
        assert_eq!(store.get(key).await.unwrap().unwrap(), b"creds");

        // A different email must not collide
        let other = "securepass_creds_alice%40example.com";
        assert!(store.get(other).await.unwrap().is_none());
    }

    #[test]
    fn test_encode_key() {
        assert_eq!(encode_key("securepass_passwords"), "securepass_passwords");
        assert_eq!(encode_key("a@b.c"), "a%40b.c");
        assert_eq!(encode_key("a/b"), "a%2Fb");
    }
}
