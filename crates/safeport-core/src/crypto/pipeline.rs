//! File-level encryption: KDF + AEAD + container in one call
//!
//! The synchronous functions do the work; the async wrappers move it onto
//! tokio's blocking pool so a PBKDF2 run never stalls the runtime.

use tracing::debug;

use super::container::{pack, unpack};
use super::encryption::{open, seal};
use super::key_derivation::{derive_key, generate_salt, KeySize};
use crate::error::{Result, SafePortError};

/// Encrypt raw file bytes into a self-contained container
///
/// Generates a new salt and nonce on every call, so encrypting the same file
/// twice with the same password yields different containers.
pub fn encrypt_file(plaintext: &[u8], password: &[u8], key_size: KeySize) -> Result<Vec<u8>> {
    let salt = generate_salt()?;
    let key = derive_key(password, &salt, key_size);
    let sealed = seal(&key, plaintext)?;

    Ok(pack(&salt, &sealed.nonce, &sealed.ciphertext))
}

/// Decrypt a container produced by [`encrypt_file`]
///
/// The key size is not recorded in the container; pass the one stored with
/// the artifact. A wrong password, wrong key size or tampered bytes all
/// surface as [`SafePortError::AuthenticationFailure`].
pub fn decrypt_file(container: &[u8], password: &[u8], key_size: KeySize) -> Result<Vec<u8>> {
    let parts = unpack(container)?;
    let key = derive_key(password, parts.salt, key_size);
    open(&key, parts.nonce, parts.ciphertext)
}

/// Async [`encrypt_file`]
pub async fn encrypt_file_async(
    plaintext: Vec<u8>,
    password: Vec<u8>,
    key_size: KeySize,
) -> Result<Vec<u8>> {
    let len = plaintext.len();
    let container = run_blocking(move || encrypt_file(&plaintext, &password, key_size)).await?;
    debug!("Encrypted {} bytes with {}", len, key_size);
    Ok(container)
}

/// Async [`decrypt_file`]
pub async fn decrypt_file_async(
    container: Vec<u8>,
    password: Vec<u8>,
    key_size: KeySize,
) -> Result<Vec<u8>> {
    let plaintext = run_blocking(move || decrypt_file(&container, &password, key_size)).await?;
    debug!("Decrypted {} bytes with {}", plaintext.len(), key_size);
    Ok(plaintext)
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SafePortError::PrimitiveUnavailable(format!("crypto worker: {}", e)))?
}
