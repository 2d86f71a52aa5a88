//! Cryptographic pipeline for file encryption
//!
//! This module provides:
//! - PBKDF2-HMAC-SHA256 key derivation
//! - AES-GCM (128/192/256) authenticated encryption
//! - The `salt ‖ nonce ‖ ciphertext` container codec
//! - `encrypt_file` / `decrypt_file` tying the three together

pub mod container;
mod encryption;
mod key_derivation;
mod pipeline;
mod secure_memory;

pub use encryption::{open, seal, Sealed, NONCE_LEN, TAG_LEN};
pub use key_derivation::{derive_key, generate_salt, KeySize, PBKDF2_ITERATIONS, SALT_LEN};
pub use pipeline::{decrypt_file, decrypt_file_async, encrypt_file, encrypt_file_async};
pub use secure_memory::DerivedKey;
