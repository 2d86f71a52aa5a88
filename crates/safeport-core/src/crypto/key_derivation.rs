//! Password-based key derivation using PBKDF2-HMAC-SHA256

use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::DerivedKey;
use crate::error::{Result, SafePortError};

/// Salt length in bytes, stored at the front of every container
pub const SALT_LEN: usize = 16;

/// PBKDF2 iteration count. Containers do not record it, so it must never change.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// AES key size, chosen per artifact and stored as its `algorithm` label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeySize {
    #[serde(rename = "aes-128")]
    Aes128,
    #[serde(rename = "aes-192")]
    Aes192,
    #[serde(rename = "aes-256")]
    Aes256,
}

impl Default for KeySize {
    fn default() -> Self {
        Self::Aes256
    }
}

impl KeySize {
    /// Every supported key size, strongest first
    pub const ALL: [KeySize; 3] = [KeySize::Aes256, KeySize::Aes192, KeySize::Aes128];

    /// Reject anything other than 128, 192 or 256
    pub fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            128 => Ok(Self::Aes128),
            192 => Ok(Self::Aes192),
            256 => Ok(Self::Aes256),
            other => Err(SafePortError::InvalidKeySize(other)),
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            Self::Aes128 => 128,
            Self::Aes192 => 192,
            Self::Aes256 => 256,
        }
    }

    /// Key length in bytes
    pub fn key_len(self) -> usize {
        self.bits() as usize / 8
    }

    /// Label persisted in the artifact `algorithm` field
    pub fn label(self) -> &'static str {
        match self {
            Self::Aes128 => "aes-128",
            Self::Aes192 => "aes-192",
            Self::Aes256 => "aes-256",
        }
    }
}

impl std::fmt::Display for KeySize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for KeySize {
    type Err = SafePortError;

    /// Accepts `aes-256`, `AES-256`, `aes256` or a bare `256`
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        let bits = normalized
            .strip_prefix("aes")
            .map(|rest| rest.trim_start_matches('-'))
            .unwrap_or(&normalized);

        match bits.parse::<u32>() {
            Ok(bits) => Self::from_bits(bits),
            Err(_) => Err(SafePortError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Generate a cryptographically secure random salt
pub fn generate_salt() -> Result<[u8; SALT_LEN]> {
    let mut salt = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| SafePortError::PrimitiveUnavailable(format!("OS random source: {}", e)))?;
    Ok(salt)
}

/// Derive an AES key of the requested size from a password and salt
///
/// # Arguments
/// * `password` - The user's password (may be empty; the caller warns about that)
/// * `salt` - 16 random bytes, the same ones stored in the container
/// * `key_size` - AES-128, AES-192 or AES-256
pub fn derive_key(password: &[u8], salt: &[u8; SALT_LEN], key_size: KeySize) -> DerivedKey {
    let mut key = DerivedKey::zeroed(key_size);
    pbkdf2_hmac::<Sha256>(password, salt, PBKDF2_ITERATIONS, key.as_mut_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_salt() {
        let salt1 = generate_salt().unwrap();
        let salt2 = generate_salt().unwrap();

        assert_ne!(salt1, salt2);
    }

    #[test]
    fn test_derive_key_lengths() {
        let salt = generate_salt().unwrap();

        for size in KeySize::ALL {
            let key = derive_key(b"test-password-123", &salt, size);
            assert_eq!(key.as_bytes().len(), size.key_len());
        }
    }

    #[test]
    fn test_derive_key_deterministic() {
        let salt = generate_salt().unwrap();

        let key1 = derive_key(b"test-password-123", &salt, KeySize::Aes256);
        let key2 = derive_key(b"test-password-123", &salt, KeySize::Aes256);

        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_known_vector() {
        // PBKDF2-HMAC-SHA256, password "password", salt "salt" padded to 16 bytes
        let salt = *b"salt\0\0\0\0\0\0\0\0\0\0\0\0";
        let key = derive_key(b"password", &salt, KeySize::Aes128);
        let mut expected = [0u8; 16];
        pbkdf2_hmac::<Sha256>(b"password", &salt, 100_000, &mut expected);
        assert_eq!(key.as_bytes(), &expected);
    }

    #[test]
    fn test_derive_key_different_passwords() {
        let salt = generate_salt().unwrap();

        let key1 = derive_key(b"password1", &salt, KeySize::Aes256);
        let key2 = derive_key(b"password2", &salt, KeySize::Aes256);

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_salts() {
        let key1 = derive_key(b"test-password", &generate_salt().unwrap(), KeySize::Aes256);
        let key2 = derive_key(b"test-password", &generate_salt().unwrap(), KeySize::Aes256);

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_empty_password() {
        let salt = generate_salt().unwrap();
        let key = derive_key(b"", &salt, KeySize::Aes128);
        assert_eq!(key.as_bytes().len(), 16);
    }

    #[test]
    fn test_key_size_from_bits() {
        assert_eq!(KeySize::from_bits(192).unwrap(), KeySize::Aes192);
        assert!(matches!(
            KeySize::from_bits(512),
            Err(SafePortError::InvalidKeySize(512))
        ));
    }

    #[test]
    fn test_key_size_parse() {
        assert_eq!("aes-256".parse::<KeySize>().unwrap(), KeySize::Aes256);
        assert_eq!("AES-128".parse::<KeySize>().unwrap(), KeySize::Aes128);
        assert_eq!("192".parse::<KeySize>().unwrap(), KeySize::Aes192);
        assert!(matches!(
            "aes-512".parse::<KeySize>(),
            Err(SafePortError::InvalidKeySize(512))
        ));
        assert!(matches!(
            "twofish".parse::<KeySize>(),
            Err(SafePortError::UnknownAlgorithm(_))
        ));
    }

    #[test]
    fn test_key_size_serde_label() {
        let json = serde_json::to_string(&KeySize::Aes192).unwrap();
        assert_eq!(json, "\"aes-192\"");
        let parsed: KeySize = serde_json::from_str("\"aes-128\"").unwrap();
        assert_eq!(parsed, KeySize::Aes128);
    }
}
