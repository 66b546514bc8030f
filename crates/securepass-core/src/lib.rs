//! SecurePass Core - Encrypted local credential vault
//!
//! This crate provides:
//! - AES-256-GCM envelopes for collections at rest
//! - PBKDF2-HMAC-SHA256 key derivation and password hashing
//! - Generic encrypted record collections with a size-bounded audit trail
//! - Inactivity session lock and self-clearing clipboard transfer

pub mod audit;
pub mod auth;
pub mod blobstore;
pub mod clipboard;
pub mod config;
pub mod crypto;
pub mod error;
pub mod records;
pub mod session;
pub mod store;
pub mod vault;

pub use audit::*;
pub use auth::*;
pub use blobstore::*;
pub use clipboard::*;
pub use config::*;
pub use crypto::*;
pub use error::*;
pub use records::*;
pub use session::*;
pub use store::*;
pub use vault::*;
