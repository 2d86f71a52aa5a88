//! Artifact type definitions
//!
//! An artifact is one stored file, either the container produced by
//! encryption or the plaintext recovered by decryption. Artifacts are
//! immutable once saved.

use base64::Engine;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::KeySize;
use crate::error::{Result, SafePortError};

/// Suffix appended to the original name of an encrypted file
pub const ENCRYPTED_SUFFIX: &str = ".encrypted";

/// MIME type used for every payload
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Which logical collection an artifact belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Encrypted,
    Decrypted,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Encrypted => "encrypted",
            Self::Decrypted => "decrypted",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArtifactKind {
    type Err = SafePortError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "encrypted" => Ok(Self::Encrypted),
            "decrypted" => Ok(Self::Decrypted),
            other => Err(SafePortError::InvalidArtifact(format!(
                "unknown artifact kind: {}",
                other
            ))),
        }
    }
}

/// A persisted artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Unique identifier
    pub id: Uuid,

    /// User namespace this artifact belongs to
    pub owner_id: String,

    /// File name shown to the user
    pub display_name: String,

    /// `data:` URL holding the base64-encoded bytes
    pub payload: String,

    /// Size in bytes before encoding
    pub byte_size: u64,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    pub kind: ArtifactKind,

    /// Key size used to encrypt (encrypted artifacts only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<KeySize>,

    /// Name of the encrypted file this was recovered from (decrypted artifacts only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
}

impl Artifact {
    /// Decode the payload back into raw bytes
    pub fn bytes(&self) -> Result<Vec<u8>> {
        decode_data_url(&self.payload).map(|(_, bytes)| bytes)
    }

    /// Whether `term` occurs in the display name, ignoring case
    pub fn matches(&self, term: &str) -> bool {
        self.display_name
            .to_lowercase()
            .contains(&term.to_lowercase())
    }
}

/// An artifact that has not been saved yet
///
/// The store assigns `id` and `created_at` on save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArtifact {
    pub owner_id: String,
    pub display_name: String,
    pub payload: String,
    pub byte_size: u64,
    pub kind: ArtifactKind,
    pub algorithm: Option<KeySize>,
    pub source_name: Option<String>,
}

impl NewArtifact {
    /// Describe the container produced by encrypting `original_name`
    ///
    /// `byte_size` records the size of the submitted file, not the container.
    pub fn encrypted(
        owner_id: &str,
        original_name: &str,
        original_size: u64,
        container: &[u8],
        algorithm: KeySize,
    ) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            display_name: encrypted_name(original_name),
            payload: encode_data_url(DEFAULT_MIME, container),
            byte_size: original_size,
            kind: ArtifactKind::Encrypted,
            algorithm: Some(algorithm),
            source_name: None,
        }
    }

    /// Describe the plaintext recovered from the encrypted file `source_name`
    pub fn decrypted(owner_id: &str, source_name: &str, plaintext: &[u8]) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            display_name: decrypted_name(source_name),
            payload: encode_data_url(DEFAULT_MIME, plaintext),
            byte_size: plaintext.len() as u64,
            kind: ArtifactKind::Decrypted,
            algorithm: None,
            source_name: Some(source_name.to_string()),
        }
    }

    /// Check the per-kind field rules before persisting
    pub fn validate(&self) -> Result<()> {
        if self.owner_id.is_empty() {
            return Err(SafePortError::InvalidArtifact("owner id is empty".to_string()));
        }
        if self.display_name.is_empty() {
            return Err(SafePortError::InvalidArtifact("display name is empty".to_string()));
        }
        match self.kind {
            ArtifactKind::Encrypted if self.algorithm.is_none() => Err(SafePortError::InvalidArtifact(
                "encrypted artifact needs an algorithm".to_string(),
            )),
            ArtifactKind::Encrypted if self.source_name.is_some() => Err(SafePortError::InvalidArtifact(
                "encrypted artifact cannot have a source name".to_string(),
            )),
            ArtifactKind::Decrypted if self.algorithm.is_some() => Err(SafePortError::InvalidArtifact(
                "decrypted artifact cannot have an algorithm".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Assign identity and creation time
    ///
    /// The timestamp is cut to microseconds, the finest precision every
    /// tier stores, so an artifact reads back exactly as it was saved.
    pub fn into_artifact(self) -> Artifact {
        Artifact {
            id: Uuid::new_v4(),
            owner_id: self.owner_id,
            display_name: self.display_name,
            payload: self.payload,
            byte_size: self.byte_size,
            created_at: Utc::now().trunc_subsecs(6),
            kind: self.kind,
            algorithm: self.algorithm,
            source_name: self.source_name,
        }
    }
}

/// A materialized payload ready to be written out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// `report.pdf` -> `report.pdf.encrypted`
pub fn encrypted_name(original_name: &str) -> String {
    format!("{}{}", original_name, ENCRYPTED_SUFFIX)
}

/// `report.pdf.encrypted` -> `report.pdf`; names without the suffix are kept
pub fn decrypted_name(source_name: &str) -> String {
    match source_name.strip_suffix(ENCRYPTED_SUFFIX) {
        Some(original) if !original.is_empty() => original.to_string(),
        _ => source_name.to_string(),
    }
}

/// Encode bytes as a `data:<mime>;base64,<...>` URL
pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Split a base64 `data:` URL into its MIME type and decoded bytes
pub fn decode_data_url(url: &str) -> Result<(String, Vec<u8>)> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| SafePortError::InvalidPayload("missing data: prefix".to_string()))?;
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| SafePortError::InvalidPayload("missing ',' separator".to_string()))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| SafePortError::InvalidPayload("payload is not base64".to_string()))?;

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| SafePortError::InvalidPayload(format!("Base64 decode error: {}", e)))?;

    let mime = if mime.is_empty() { DEFAULT_MIME } else { mime };
    Ok((mime.to_string(), bytes))
}

/// Human-readable size: `512 B`, `1.50 KB`, `3.00 MB`, `1.20 GB`
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else if bytes < GB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypted_artifact_fields() {
        let new = NewArtifact::encrypted("alice", "notes.txt", 3, &[1, 2, 3, 4], KeySize::Aes192);

        assert_eq!(new.display_name, "notes.txt.encrypted");
        assert_eq!(new.byte_size, 3);
        assert_eq!(new.kind, ArtifactKind::Encrypted);
        assert_eq!(new.algorithm, Some(KeySize::Aes192));
        assert!(new.validate().is_ok());
    }

    #[test]
    fn test_decrypted_artifact_fields() {
        let new = NewArtifact::decrypted("alice", "notes.txt.encrypted", b"hello");

        assert_eq!(new.display_name, "notes.txt");
        assert_eq!(new.source_name.as_deref(), Some("notes.txt.encrypted"));
        assert_eq!(new.algorithm, None);
        assert!(new.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_mismatched_fields() {
        let mut new = NewArtifact::encrypted("alice", "a", 1, b"x", KeySize::Aes256);
        new.algorithm = None;
        assert!(new.validate().is_err());

        let mut new = NewArtifact::decrypted("alice", "a", b"x");
        new.algorithm = Some(KeySize::Aes128);
        assert!(new.validate().is_err());

        let new = NewArtifact::decrypted("", "a", b"x");
        assert!(new.validate().is_err());
    }

    #[test]
    fn test_into_artifact_assigns_identity() {
        let a = NewArtifact::decrypted("bob", "f", b"1").into_artifact();
        let b = NewArtifact::decrypted("bob", "f", b"1").into_artifact();
        assert_ne!(a.id, b.id);
        assert_eq!(a.bytes().unwrap(), b"1");
    }

    #[test]
    fn test_created_at_has_microsecond_precision() {
        let a = NewArtifact::decrypted("bob", "f", b"1").into_artifact();
        assert_eq!(a.created_at.timestamp_subsec_nanos() % 1_000, 0);
    }

    #[test]
    fn test_decrypted_name() {
        assert_eq!(decrypted_name("photo.png.encrypted"), "photo.png");
        assert_eq!(decrypted_name("photo.png"), "photo.png");
        assert_eq!(decrypted_name(".encrypted"), ".encrypted");
    }

    #[test]
    fn test_data_url() {
        let url = encode_data_url("text/plain", b"hi");
        assert_eq!(url, "data:text/plain;base64,aGk=");

        let (mime, bytes) = decode_data_url(&url).unwrap();
        assert_eq!(mime, "text/plain");
        assert_eq!(bytes, b"hi");
    }

    #[test]
    fn test_data_url_rejects_garbage() {
        assert!(decode_data_url("aGk=").is_err());
        assert!(decode_data_url("data:text/plain,hi").is_err());
        assert!(decode_data_url("data:;base64,!!!").is_err());
    }

    #[test]
    fn test_matches_ignores_case() {
        let a = NewArtifact::decrypted("u", "Quarterly-Report.PDF.encrypted", b"").into_artifact();
        assert!(a.matches("report"));
        assert!(a.matches("PDF"));
        assert!(!a.matches("invoice"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.00 GB");
    }

    #[test]
    fn test_artifact_json_shape() {
        let a = NewArtifact::encrypted("u", "f", 1, b"x", KeySize::Aes256).into_artifact();
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["ownerId"], "u");
        assert_eq!(json["kind"], "encrypted");
        assert_eq!(json["algorithm"], "aes-256");
        assert!(json.get("sourceName").is_none());
    }
}
