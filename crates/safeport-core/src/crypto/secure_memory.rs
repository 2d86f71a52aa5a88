//! Secure memory handling with automatic zeroization

use zeroize::{Zeroize, ZeroizeOnDrop};

use super::KeySize;

/// Largest key the cipher unit accepts (AES-256)
const MAX_KEY_LEN: usize = 32;

/// Password-derived AES key - automatically zeroed when dropped
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; MAX_KEY_LEN],
    #[zeroize(skip)]
    size: KeySize,
}

impl DerivedKey {
    /// All-zero key of the given size, filled in by the KDF
    pub(super) fn zeroed(size: KeySize) -> Self {
        Self {
            key: [0u8; MAX_KEY_LEN],
            size,
        }
    }

    pub(super) fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.key[..self.size.key_len()]
    }

    /// Get the key bytes (use carefully - avoid copying)
    pub fn as_bytes(&self) -> &[u8] {
        &self.key[..self.size.key_len()]
    }

    /// The AES variant this key belongs to
    pub fn size(&self) -> KeySize {
        self.size
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("size", &self.size)
            .field("key", &"[REDACTED]")
            .finish()
    }
}
