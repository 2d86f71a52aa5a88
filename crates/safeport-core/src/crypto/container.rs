//! Self-contained encrypted file layout
//!
//! ```text
//! [ salt (16 bytes) | nonce (12 bytes) | ciphertext ‖ tag (rest) ]
//! ```
//!
//! Salt and nonce sizes are fixed, so there is no header, length prefix or
//! version byte.

use super::{NONCE_LEN, SALT_LEN};
use crate::error::{Result, SafePortError};

/// Bytes in front of the ciphertext
pub const HEADER_LEN: usize = SALT_LEN + NONCE_LEN;

/// Borrowed view of an unpacked container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Container<'a> {
    pub salt: &'a [u8; SALT_LEN],
    pub nonce: &'a [u8; NONCE_LEN],
    pub ciphertext: &'a [u8],
}

/// Concatenate salt, nonce and ciphertext into a single buffer
pub fn pack(salt: &[u8; SALT_LEN], nonce: &[u8; NONCE_LEN], ciphertext: &[u8]) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    buffer.extend_from_slice(salt);
    buffer.extend_from_slice(nonce);
    buffer.extend_from_slice(ciphertext);
    buffer
}

/// Slice a buffer back into salt, nonce and ciphertext
pub fn unpack(buffer: &[u8]) -> Result<Container<'_>> {
    if buffer.len() < HEADER_LEN {
        return Err(SafePortError::MalformedContainer(format!(
            "expected at least {} bytes, got {}",
            HEADER_LEN,
            buffer.len()
        )));
    }

    let (salt, rest) = buffer.split_at(SALT_LEN);
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

    let salt = salt
        .try_into()
        .map_err(|_| SafePortError::MalformedContainer("salt slice".to_string()))?;
    let nonce = nonce
        .try_into()
        .map_err(|_| SafePortError::MalformedContainer("nonce slice".to_string()))?;

    Ok(Container {
        salt,
        nonce,
        ciphertext,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_layout() {
        let salt = [1u8; SALT_LEN];
        let nonce = [2u8; NONCE_LEN];
        let packed = pack(&salt, &nonce, &[3, 4, 5]);

        assert_eq!(packed.len(), HEADER_LEN + 3);
        assert_eq!(&packed[..16], &salt);
        assert_eq!(&packed[16..28], &nonce);
        assert_eq!(&packed[28..], &[3, 4, 5]);
    }

    #[test]
    fn test_unpack_splits_fields() {
        let salt = [9u8; SALT_LEN];
        let nonce = [8u8; NONCE_LEN];
        let packed = pack(&salt, &nonce, b"payload");

        let container = unpack(&packed).unwrap();
        assert_eq!(container.salt, &salt);
        assert_eq!(container.nonce, &nonce);
        assert_eq!(container.ciphertext, b"payload");
    }

    #[test]
    fn test_unpack_header_only() {
        let packed = vec![0u8; HEADER_LEN];
        let container = unpack(&packed).unwrap();
        assert!(container.ciphertext.is_empty());
    }

    #[test]
    fn test_unpack_too_short() {
        for len in [0, 1, 16, 27] {
            let buffer = vec![0u8; len];
            let result = unpack(&buffer);
            assert!(matches!(result, Err(SafePortError::MalformedContainer(_))));
        }
    }
}
