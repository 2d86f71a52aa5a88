//! # safeport-core
//!
//! Core file encryption for SafePort including:
//! - AES-GCM encryption (128/192/256-bit) with PBKDF2-SHA256 key derivation
//! - A self-describing `salt || nonce || ciphertext` container
//! - Per-user artifact storage in SQLite with a JSON file fallback

pub mod artifact;
pub mod crypto;
pub mod error;
pub mod settings;
pub mod storage;
mod safeport;

pub use artifact::{format_size, Artifact, ArtifactKind, Download, NewArtifact};
pub use crypto::{decrypt_file, decrypt_file_async, encrypt_file, encrypt_file_async, KeySize};
pub use error::{Result, SafePortError};
pub use safeport::{is_weak_password, SafePort, MIN_PASSWORD_LEN};
pub use settings::{default_data_dir, Settings, SettingsManager};
pub use storage::{ArtifactStore, ArtifactTier, StoreConfig, StoreStatus, Tier};
