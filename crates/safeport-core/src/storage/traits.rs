//! Storage trait definitions

use async_trait::async_trait;
use uuid::Uuid;

use crate::artifact::{Artifact, ArtifactKind};
use crate::error::Result;

/// One persistence tier behind the artifact store
///
/// Tiers receive fully formed artifacts; identity and timestamps are
/// assigned once by the store so an artifact keeps its id if it later moves
/// between tiers.
#[async_trait]
pub trait ArtifactTier: Send + Sync {
    /// Insert a new artifact. Fails if the id already exists.
    async fn insert(&self, artifact: &Artifact) -> Result<()>;

    /// Fetch an artifact by id
    async fn get(&self, id: Uuid) -> Result<Option<Artifact>>;

    /// All artifacts of one kind owned by `owner_id`, newest first
    async fn list(&self, owner_id: &str, kind: ArtifactKind) -> Result<Vec<Artifact>>;

    /// Remove an artifact. Returns whether anything was removed.
    async fn remove(&self, id: Uuid) -> Result<bool>;

    /// Remove every listed artifact in one write. Returns how many existed.
    async fn remove_all(&self, ids: &[Uuid]) -> Result<usize>;

    /// Remove every artifact of one kind owned by `owner_id`
    async fn clear(&self, owner_id: &str, kind: ArtifactKind) -> Result<usize>;

    /// Every artifact in the tier, regardless of owner
    async fn all(&self) -> Result<Vec<Artifact>>;

    /// Get a human-readable name for this tier
    fn backend_name(&self) -> &'static str;
}
