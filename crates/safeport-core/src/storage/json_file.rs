//! JSON file storage tier
//!
//! The fallback tier. Both collections live in a single JSON document that
//! is read whole on open and rewritten whole on every change, with a hard
//! size cap.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use super::ArtifactTier;
use crate::artifact::{Artifact, ArtifactKind};
use crate::error::{Result, SafePortError};

/// Default size cap for the serialized document (5 MiB)
pub const DEFAULT_CAPACITY_BYTES: usize = 5 * 1024 * 1024;

const FILE_VERSION: u32 = 1;

/// File format for persistent storage
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct StorageFile {
    version: u32,
    encrypted_files: Vec<Artifact>,
    decrypted_files: Vec<Artifact>,
}

impl StorageFile {
    fn collection(&self, kind: ArtifactKind) -> &Vec<Artifact> {
        match kind {
            ArtifactKind::Encrypted => &self.encrypted_files,
            ArtifactKind::Decrypted => &self.decrypted_files,
        }
    }

    fn collection_mut(&mut self, kind: ArtifactKind) -> &mut Vec<Artifact> {
        match kind {
            ArtifactKind::Encrypted => &mut self.encrypted_files,
            ArtifactKind::Decrypted => &mut self.decrypted_files,
        }
    }

    fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.encrypted_files.iter().chain(self.decrypted_files.iter())
    }
}

/// JSON-file-backed artifact tier
pub struct JsonFileTier {
    /// Path of the JSON document
    path: PathBuf,
    /// Largest serialized document this tier will write
    capacity: usize,
    /// In-memory copy of the document, replaced only after a successful write
    cache: RwLock<StorageFile>,
}

impl JsonFileTier {
    /// Open the document at `path`, creating its directory if needed
    ///
    /// An unreadable or corrupt document is discarded and the tier starts
    /// empty.
    pub async fn open(path: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = Self::load(&path).await;
        debug!(
            "JSON artifact tier opened at {:?} ({} entries)",
            path,
            file.iter().count()
        );

        Ok(Self {
            path,
            capacity,
            cache: RwLock::new(file),
        })
    }

    async fn load(path: &Path) -> StorageFile {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No existing fallback file found");
                return StorageFile::default();
            }
            Err(e) => {
                warn!("Could not read fallback file {:?}: {}", path, e);
                return StorageFile::default();
            }
        };

        match serde_json::from_str::<StorageFile>(&contents) {
            Ok(file) => file,
            Err(e) => {
                warn!("Discarding corrupt fallback file {:?}: {}", path, e);
                StorageFile::default()
            }
        }
    }

    /// Serialize `file`, enforce the size cap, and write it atomically
    async fn persist(&self, file: &StorageFile) -> Result<()> {
        let contents = serde_json::to_string(file)?;
        if contents.len() > self.capacity {
            return Err(SafePortError::QuotaExceeded {
                needed: contents.len(),
                capacity: self.capacity,
            });
        }

        // Write atomically using a temp file
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;

        debug!("Saved fallback file ({} bytes)", contents.len());
        Ok(())
    }

    /// Apply `change` to a copy of the document, persist it, then publish it
    async fn update<T>(&self, change: impl FnOnce(&mut StorageFile) -> Result<T>) -> Result<T> {
        let mut cache = self.cache.write().await;
        let mut next = cache.clone();
        next.version = FILE_VERSION;

        let value = change(&mut next)?;
        self.persist(&next).await?;
        *cache = next;
        Ok(value)
    }

}

#[async_trait]
impl ArtifactTier for JsonFileTier {
    async fn insert(&self, artifact: &Artifact) -> Result<()> {
        self.update(|file| {
            if file.iter().any(|a| a.id == artifact.id) {
                return Err(SafePortError::StorageError(format!(
                    "Duplicate artifact id: {}",
                    artifact.id
                )));
            }
            // Newest first, like the collection is displayed
            file.collection_mut(artifact.kind).insert(0, artifact.clone());
            Ok(())
        })
        .await?;

        debug!("Stored artifact in fallback: {}", artifact.id);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Artifact>> {
        let cache = self.cache.read().await;
        let found = cache.iter().find(|a| a.id == id).cloned();
        Ok(found)
    }

    async fn list(&self, owner_id: &str, kind: ArtifactKind) -> Result<Vec<Artifact>> {
        let cache = self.cache.read().await;
        let mut artifacts: Vec<Artifact> = cache
            .collection(kind)
            .iter()
            .filter(|a| a.owner_id == owner_id)
            .cloned()
            .collect();
        artifacts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(artifacts)
    }

    async fn remove(&self, id: Uuid) -> Result<bool> {
        if self.get(id).await?.is_none() {
            return Ok(false);
        }

        self.update(|file| {
            file.encrypted_files.retain(|a| a.id != id);
            file.decrypted_files.retain(|a| a.id != id);
            Ok(())
        })
        .await?;

        debug!("Deleted artifact from fallback: {}", id);
        Ok(true)
    }

    async fn remove_all(&self, ids: &[Uuid]) -> Result<usize> {
        let present = {
            let cache = self.cache.read().await;
            cache.iter().filter(|a| ids.contains(&a.id)).count()
        };
        if present == 0 {
            return Ok(0);
        }

        // One rewrite of the document for the whole batch
        self.update(|file| {
            file.encrypted_files.retain(|a| !ids.contains(&a.id));
            file.decrypted_files.retain(|a| !ids.contains(&a.id));
            Ok(())
        })
        .await?;

        debug!("Deleted {} artifacts from fallback", present);
        Ok(present)
    }

    async fn clear(&self, owner_id: &str, kind: ArtifactKind) -> Result<usize> {
        self.update(|file| {
            let collection = file.collection_mut(kind);
            let before = collection.len();
            collection.retain(|a| a.owner_id != owner_id);
            Ok(before - collection.len())
        })
        .await
    }

    async fn all(&self) -> Result<Vec<Artifact>> {
        let cache = self.cache.read().await;
        let artifacts: Vec<Artifact> = cache.iter().cloned().collect();
        Ok(artifacts)
    }

    fn backend_name(&self) -> &'static str {
        "JSON File"
    }
}
