//! Vault configuration
//!
//! Non-sensitive settings stored in plaintext TOML alongside the vault data.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{VaultError, VaultResult};

/// Config file name inside the data directory
const CONFIG_FILE: &str = "config.toml";

/// Source material for the vault encryption key.
///
/// The original SecurePass design derives the vault key from constants baked
/// into the application, so anyone holding the constants can decrypt any
/// vault. `BuiltIn` reproduces that behavior and its data format; deployments
/// that want a real secret must select `Passphrase` instead. The choice is
/// deliberately surfaced here rather than hard-wired.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum KeySource {
    /// Fixed application passphrase and salt, compatible with existing vaults.
    BuiltIn,
    /// Deployment-supplied passphrase and salt.
    Passphrase { passphrase: String, salt: String },
}

impl KeySource {
    /// Passphrase bytes fed to the KDF
    pub fn passphrase(&self) -> &[u8] {
        match self {
            KeySource::BuiltIn => b"demo-master-key-32-characters!",
            KeySource::Passphrase { passphrase, .. } => passphrase.as_bytes(),
        }
    }

    /// Salt bytes fed to the KDF
    pub fn salt(&self) -> &[u8] {
        match self {
            KeySource::BuiltIn => b"securepass-salt",
            KeySource::Passphrase { salt, .. } => salt.as_bytes(),
        }
    }
}

/// Vault configuration (non-sensitive, stored in plaintext)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// PBKDF2-HMAC-SHA256 iteration count for key derivation and
    /// password hashing
    pub kdf_iterations: u32,

    /// Where the vault encryption key is derived from
    pub key_source: KeySource,

    /// Maximum audit ledger entries retained (oldest evicted first)
    pub audit_max_entries: usize,

    /// Idle duration before the session lock fires, in seconds
    pub session_timeout_seconds: u64,

    /// Delay before a copied secret is erased from the clipboard, in seconds
    pub clipboard_clear_seconds: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            kdf_iterations: 100_000,
            key_source: KeySource::BuiltIn,
            audit_max_entries: 1000,
            session_timeout_seconds: 30 * 60,
            clipboard_clear_seconds: 30,
        }
    }
}

/// Load vault configuration, falling back to defaults if absent
pub async fn load_config(base_dir: &Path) -> VaultResult<VaultConfig> {
    let config_path = base_dir.join(CONFIG_FILE);

    if !config_path.exists() {
        return Ok(VaultConfig::default());
    }

    let content = fs::read_to_string(&config_path).await?;
    let config: VaultConfig =
        toml::from_str(&content).map_err(|e| VaultError::ConfigError(e.to_string()))?;

    Ok(config)
}

/// Save vault configuration
pub async fn save_config(base_dir: &Path, config: &VaultConfig) -> VaultResult<()> {
    fs::create_dir_all(base_dir).await?;

    let config_path = base_dir.join(CONFIG_FILE);
    let content =
        toml::to_string_pretty(config).map_err(|e| VaultError::ConfigError(e.to_string()))?;

    fs::write(&config_path, content).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = VaultConfig::default();
        assert_eq!(config.kdf_iterations, 100_000);
        assert_eq!(config.audit_max_entries, 1000);
        assert_eq!(config.key_source, KeySource::BuiltIn);
    }

    #[tokio::test]
    async fn test_load_missing_returns_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_config(temp_dir.path()).await.unwrap();
        assert_eq!(config.clipboard_clear_seconds, 30);
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();

        let mut config = VaultConfig::default();
        config.key_source = KeySource::Passphrase {
            passphrase: "deployment-secret".to_string(),
            salt: "deployment-salt".to_string(),
        };
        config.session_timeout_seconds = 600;

        save_config(temp_dir.path(), &config).await.unwrap();
        let reloaded = load_config(temp_dir.path()).await.unwrap();

        assert_eq!(reloaded.key_source, config.key_source);
        assert_eq!(reloaded.session_timeout_seconds, 600);
    }
}
