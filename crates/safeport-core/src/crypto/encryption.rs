//! AES-GCM authenticated encryption at 128, 192 and 256 bits
//!
//! Output of [`seal`]: a fresh 12-byte nonce plus `ciphertext ‖ tag`, where
//! the tag is the trailing 16 bytes. Associated data is always empty.

use aes_gcm::{
    aead::{consts::U12, generic_array::GenericArray, Aead, KeyInit},
    aes::Aes192,
    Aes128Gcm, Aes256Gcm, AesGcm,
};
use rand::{rngs::OsRng, RngCore};

use super::{DerivedKey, KeySize};
use crate::error::{Result, SafePortError};

/// GCM nonce length (96 bits)
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag length (128 bits)
pub const TAG_LEN: usize = 16;

type Aes192Gcm = AesGcm<Aes192, U12>;

/// Result of a single encryption call
#[derive(Debug, Clone)]
pub struct Sealed {
    /// Nonce generated for this call only
    pub nonce: [u8; NONCE_LEN],
    /// Ciphertext with the auth tag appended
    pub ciphertext: Vec<u8>,
}

/// Encrypt plaintext under `key` with a freshly generated random nonce
///
/// There is no way to pass a nonce in: every call draws a new one from the
/// OS random source, so a key never sees the same nonce twice.
pub fn seal(key: &DerivedKey, plaintext: &[u8]) -> Result<Sealed> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|e| SafePortError::PrimitiveUnavailable(format!("OS random source: {}", e)))?;

    let ciphertext = match key.size() {
        KeySize::Aes128 => encrypt_with::<Aes128Gcm>(key, &nonce, plaintext)?,
        KeySize::Aes192 => encrypt_with::<Aes192Gcm>(key, &nonce, plaintext)?,
        KeySize::Aes256 => encrypt_with::<Aes256Gcm>(key, &nonce, plaintext)?,
    };

    Ok(Sealed { nonce, ciphertext })
}

/// Decrypt `ciphertext ‖ tag` and verify its tag
///
/// Any verification failure is reported as [`SafePortError::AuthenticationFailure`];
/// no plaintext is returned in that case.
pub fn open(key: &DerivedKey, nonce: &[u8; NONCE_LEN], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() < TAG_LEN {
        return Err(SafePortError::AuthenticationFailure);
    }

    match key.size() {
        KeySize::Aes128 => decrypt_with::<Aes128Gcm>(key, nonce, ciphertext),
        KeySize::Aes192 => decrypt_with::<Aes192Gcm>(key, nonce, ciphertext),
        KeySize::Aes256 => decrypt_with::<Aes256Gcm>(key, nonce, ciphertext),
    }
}

fn cipher_for<C: KeyInit>(key: &DerivedKey) -> Result<C> {
    C::new_from_slice(key.as_bytes())
        .map_err(|e| SafePortError::PrimitiveUnavailable(format!("cipher init: {}", e)))
}

fn encrypt_with<C>(key: &DerivedKey, nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>>
where
    C: Aead + KeyInit + aes_gcm::AeadCore<NonceSize = U12>,
{
    let cipher = cipher_for::<C>(key)?;
    cipher
        .encrypt(GenericArray::from_slice(nonce.as_slice()), plaintext)
        .map_err(|e| SafePortError::PrimitiveUnavailable(format!("encryption: {}", e)))
}

fn decrypt_with<C>(key: &DerivedKey, nonce: &[u8; NONCE_LEN], ciphertext: &[u8]) -> Result<Vec<u8>>
where
    C: Aead + KeyInit + aes_gcm::AeadCore<NonceSize = U12>,
{
    let cipher = cipher_for::<C>(key)?;
    cipher
        .decrypt(GenericArray::from_slice(nonce.as_slice()), ciphertext)
        .map_err(|_| SafePortError::AuthenticationFailure)
}
