//! Cryptographic operations for vault security
//!
//! - AES-256-GCM for the encrypted collection envelopes
//! - PBKDF2-HMAC-SHA256 for vault key derivation and password hashing
//! - Secure memory handling with zeroization

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;
use tokio::sync::OnceCell;
use zeroize::Zeroize;

use crate::config::KeySource;
use crate::error::{VaultError, VaultResult};

/// Size of AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of AES-GCM nonce in bytes
pub const NONCE_SIZE: usize = 12;

/// Size of AES-GCM authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// Size of the per-account password-hash salt in bytes
pub const SALT_SIZE: usize = 16;

/// Derives and caches the vault encryption key for the process lifetime.
///
/// The first `key()` call performs the PBKDF2 derivation; every later call
/// returns the cached key. Initialization is single-flight: concurrent first
/// callers all await the same derivation and observe the same key.
pub struct KeyManager {
    source: KeySource,
    iterations: u32,
    key: OnceCell<Secret<[u8; KEY_SIZE]>>,
    derivations: AtomicU32,
}

impl KeyManager {
    pub fn new(source: KeySource, iterations: u32) -> Self {
        Self {
            source,
            iterations,
            key: OnceCell::new(),
            derivations: AtomicU32::new(0),
        }
    }

    /// The vault encryption key, derived on first use
    pub async fn key(&self) -> VaultResult<&Secret<[u8; KEY_SIZE]>> {
        self.key
            .get_or_try_init(|| async {
                if self.iterations == 0 {
                    return Err(VaultError::KeyDerivationError(
                        "iteration count must be non-zero".to_string(),
                    ));
                }

                self.derivations.fetch_add(1, Ordering::SeqCst);

                let mut key = [0u8; KEY_SIZE];
                pbkdf2_hmac::<Sha256>(
                    self.source.passphrase(),
                    self.source.salt(),
                    self.iterations,
                    &mut key,
                );

                Ok(Secret::new(key))
            })
            .await
    }

    /// How many derivations have run (at most one per process lifetime)
    pub fn derivation_count(&self) -> u32 {
        self.derivations.load(Ordering::SeqCst)
    }
}

/// Authenticated-encryption envelope over the vault key.
///
/// An envelope is `base64(nonce || ciphertext+tag)`, the unit persisted for
/// every encrypted collection.
pub struct Cipher {
    keys: Arc<KeyManager>,
}

impl Cipher {
    pub fn new(keys: Arc<KeyManager>) -> Self {
        Self { keys }
    }

    /// Encrypt plaintext into a text-encoded envelope.
    ///
    /// A fresh random nonce is generated on every call; nonces are never
    /// reused with the vault key.
    pub async fn encrypt(&self, plaintext: &[u8]) -> VaultResult<String> {
        let key = self.keys.key().await?;
        let cipher = Aes256Gcm::new_from_slice(key.expose_secret())
            .map_err(|e| VaultError::EncryptionError(e.to_string()))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| VaultError::EncryptionError(e.to_string()))?;

        let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(combined))
    }

    /// Decrypt a text-encoded envelope.
    ///
    /// Fails with `IntegrityFailure` on bad encoding, truncated input, or an
    /// authentication tag mismatch. Callers must not treat this as "no data".
    pub async fn decrypt(&self, envelope: &str) -> VaultResult<Vec<u8>> {
        let combined = BASE64
            .decode(envelope)
            .map_err(|_| VaultError::IntegrityFailure)?;

        if combined.len() < NONCE_SIZE + TAG_SIZE {
            return Err(VaultError::IntegrityFailure);
        }

        let key = self.keys.key().await?;
        let cipher = Aes256Gcm::new_from_slice(key.expose_secret())
            .map_err(|e| VaultError::EncryptionError(e.to_string()))?;

        let nonce = Nonce::from_slice(&combined[..NONCE_SIZE]);

        cipher
            .decrypt(nonce, &combined[NONCE_SIZE..])
            .map_err(|_| VaultError::IntegrityFailure)
    }
}

/// One-way hashing of account passwords for authentication.
///
/// Same KDF family as the vault key but with a fresh random salt per hash.
/// Never used to derive data-at-rest encryption keys.
pub struct CredentialHasher {
    iterations: u32,
}

impl CredentialHasher {
    pub fn new(iterations: u32) -> Self {
        Self { iterations }
    }

    /// Hash a password with a fresh random salt.
    ///
    /// Returns the base64-encoded digest and salt.
    pub fn hash_password(&self, password: &str) -> (String, String) {
        let mut salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);

        let mut digest = [0u8; KEY_SIZE];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, self.iterations, &mut digest);

        let encoded = (BASE64.encode(digest), BASE64.encode(salt));
        digest.zeroize();
        encoded
    }

    /// Re-derive with the stored salt and compare against the stored digest.
    pub fn verify_password(&self, password: &str, digest_b64: &str, salt_b64: &str) -> bool {
        let Ok(salt) = BASE64.decode(salt_b64) else {
            return false;
        };
        let Ok(expected) = BASE64.decode(digest_b64) else {
            return false;
        };

        let mut digest = [0u8; KEY_SIZE];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, self.iterations, &mut digest);

        let matches = constant_time_compare(&digest, &expected);
        digest.zeroize();
        matches
    }
}

/// Constant-time comparison to prevent timing attacks
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
