//! Two-tier artifact store
//!
//! Every call is tried against the primary tier first. If the primary is
//! missing or the call fails there, the store marks itself degraded and
//! serves the call from the fallback tier instead. Callers only see an error
//! when both tiers fail.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{ArtifactTier, JsonFileTier, SqliteTier};
use crate::artifact::{Artifact, ArtifactKind, Download, NewArtifact};
use crate::error::{Result, SafePortError};

/// Which tier served a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Primary,
    Fallback,
}

/// Locations and limits for the two tiers
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// SQLite database file
    pub database_path: PathBuf,
    /// JSON document used when the database is unavailable
    pub fallback_path: PathBuf,
    /// Size cap for the fallback document
    pub fallback_capacity: usize,
}

/// Snapshot of the store's health, for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStatus {
    pub degraded: bool,
    pub primary_backend: Option<&'static str>,
    pub fallback_backend: &'static str,
    pub last_tier: Option<Tier>,
}

type ViewKey = (String, ArtifactKind);

/// Per-user artifact store over a primary and a fallback tier
pub struct ArtifactStore {
    /// Primary tier; `None` while unavailable
    primary: RwLock<Option<Arc<dyn ArtifactTier>>>,
    /// Fallback tier, always present
    fallback: Arc<dyn ArtifactTier>,
    /// Used by `recover` to reopen the primary
    database_path: Option<PathBuf>,
    degraded: AtomicBool,
    closed: AtomicBool,
    last_tier: RwLock<Option<Tier>>,
    /// Listings the caller has loaded, kept in sync with successful writes
    view: RwLock<HashMap<ViewKey, Vec<Artifact>>>,
}

impl ArtifactStore {
    /// Open both tiers described by `config`
    ///
    /// A primary that cannot be opened is not an error: the store starts in
    /// degraded mode. Failure to open the fallback is.
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let fallback = JsonFileTier::open(&config.fallback_path, config.fallback_capacity).await?;

        let primary: Option<Arc<dyn ArtifactTier>> =
            match SqliteTier::open(&config.database_path).await {
                Ok(tier) => Some(Arc::new(tier) as Arc<dyn ArtifactTier>),
                Err(e) => {
                    warn!("Primary store unavailable, using fallback: {}", e);
                    None
                }
            };

        let mut store = Self::from_tiers(primary, Arc::new(fallback)).await;
        store.database_path = Some(config.database_path.clone());
        Ok(store)
    }

    /// Build a store from already opened tiers
    ///
    /// The store also starts degraded when the fallback still holds
    /// artifacts from an earlier outage, so they stay visible until
    /// `recover` moves them into the primary.
    pub async fn from_tiers(primary: Option<Arc<dyn ArtifactTier>>, fallback: Arc<dyn ArtifactTier>) -> Self {
        let pending = match fallback.all().await {
            Ok(artifacts) => artifacts.len(),
            Err(e) => {
                warn!("Could not read fallback store: {}", e);
                0
            }
        };
        let degraded = primary.is_none() || pending > 0;

        if let Some(tier) = &primary {
            debug!("Artifact store using {} with {} fallback", tier.backend_name(), fallback.backend_name());
        }
        if pending > 0 {
            warn!("{} artifacts from an earlier outage are still in the fallback store", pending);
        }

        Self {
            primary: RwLock::new(primary),
            fallback,
            database_path: None,
            degraded: AtomicBool::new(degraded),
            closed: AtomicBool::new(false),
            last_tier: RwLock::new(None),
            view: RwLock::new(HashMap::new()),
        }
    }

    /// Whether calls may currently be served by the fallback tier
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Tier that served the most recent call
    pub async fn last_tier(&self) -> Option<Tier> {
        *self.last_tier.read().await
    }

    pub async fn status(&self) -> StoreStatus {
        StoreStatus {
            degraded: self.is_degraded(),
            primary_backend: self.primary.read().await.as_ref().map(|t| t.backend_name()),
            fallback_backend: self.fallback.backend_name(),
            last_tier: self.last_tier().await,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SafePortError::StoreClosed);
        }
        Ok(())
    }

    async fn primary(&self) -> Option<Arc<dyn ArtifactTier>> {
        self.primary.read().await.clone()
    }

    fn primary_failed(&self, op: &str, error: &SafePortError) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            warn!("Primary store failed during {}, switching to fallback: {}", op, error);
        } else {
            debug!("Primary store failed during {}: {}", op, error);
        }
    }

    async fn served(&self, tier: Tier) {
        *self.last_tier.write().await = Some(tier);
    }

    /// Persist a new artifact, assigning its id and creation time
    pub async fn save(&self, new: NewArtifact) -> Result<Artifact> {
        self.ensure_open()?;
        new.validate()?;
        let artifact = new.into_artifact();

        let mut tier = Tier::Fallback;
        let mut stored = false;
        if let Some(primary) = self.primary().await {
            match primary.insert(&artifact).await {
                Ok(()) => {
                    tier = Tier::Primary;
                    stored = true;
                }
                Err(e) => self.primary_failed("save", &e),
            }
        }
        if !stored {
            self.fallback.insert(&artifact).await?;
        }
        self.served(tier).await;

        // Durable write succeeded; now reflect it in loaded listings
        let key = (artifact.owner_id.clone(), artifact.kind);
        if let Some(listing) = self.view.write().await.get_mut(&key) {
            listing.insert(0, artifact.clone());
        }

        info!("Saved {} artifact {} ({:?} tier)", artifact.kind, artifact.id, tier);
        Ok(artifact)
    }

    /// Fetch one artifact by id
    pub async fn get(&self, id: Uuid) -> Result<Option<Artifact>> {
        self.ensure_open()?;

        if let Some(primary) = self.primary().await {
            match primary.get(id).await {
                Ok(Some(artifact)) => {
                    self.served(Tier::Primary).await;
                    return Ok(Some(artifact));
                }
                Ok(None) if !self.is_degraded() => {
                    self.served(Tier::Primary).await;
                    return Ok(None);
                }
                Ok(None) => {}
                Err(e) => self.primary_failed("get", &e),
            }
        }

        let found = self.fallback.get(id).await?;
        self.served(Tier::Fallback).await;
        Ok(found)
    }

    /// All artifacts of `kind` owned by `owner_id`, newest first
    ///
    /// While degraded, artifacts written to the fallback are merged into the
    /// primary's results so nothing saved during an outage disappears.
    pub async fn list(&self, owner_id: &str, kind: ArtifactKind) -> Result<Vec<Artifact>> {
        self.ensure_open()?;

        let mut from_primary = None;
        if let Some(primary) = self.primary().await {
            match primary.list(owner_id, kind).await {
                Ok(artifacts) => from_primary = Some(artifacts),
                Err(e) => self.primary_failed("list", &e),
            }
        }

        let artifacts = match from_primary {
            Some(artifacts) if !self.is_degraded() => {
                self.served(Tier::Primary).await;
                artifacts
            }
            Some(mut artifacts) => {
                match self.fallback.list(owner_id, kind).await {
                    Ok(extra) => merge_newest_first(&mut artifacts, extra),
                    Err(e) => warn!("Fallback listing failed, showing primary only: {}", e),
                }
                self.served(Tier::Primary).await;
                artifacts
            }
            None => {
                let artifacts = self.fallback.list(owner_id, kind).await?;
                self.served(Tier::Fallback).await;
                artifacts
            }
        };

        self.view
            .write()
            .await
            .insert((owner_id.to_string(), kind), artifacts.clone());

        Ok(artifacts)
    }

    /// Artifacts whose display name contains `term`, ignoring case
    pub async fn search(&self, owner_id: &str, kind: ArtifactKind, term: &str) -> Result<Vec<Artifact>> {
        let artifacts = self.list(owner_id, kind).await?;
        Ok(artifacts.into_iter().filter(|a| a.matches(term)).collect())
    }

    /// Delete an artifact. Deleting an unknown id is not an error.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.ensure_open()?;

        let mut removed = false;
        let mut primary_ok = false;
        if let Some(primary) = self.primary().await {
            match primary.remove(id).await {
                Ok(hit) => {
                    removed = hit;
                    primary_ok = true;
                }
                Err(e) => self.primary_failed("delete", &e),
            }
        }

        // The artifact may have been written to the fallback during an outage.
        // A fallback failure only matters if the primary did not hold it.
        match self.fallback.remove(id).await {
            Ok(hit) => removed |= hit,
            Err(e) if removed => warn!("Fallback delete failed for {}: {}", id, e),
            Err(e) => return Err(e),
        }
        self.served(if primary_ok { Tier::Primary } else { Tier::Fallback }).await;

        for listing in self.view.write().await.values_mut() {
            listing.retain(|a| a.id != id);
        }

        if removed {
            info!("Deleted artifact {}", id);
        } else {
            debug!("Delete of unknown artifact {} ignored", id);
        }
        Ok(())
    }

    /// Delete every artifact of `kind` owned by `owner_id`
    pub async fn clear(&self, owner_id: &str, kind: ArtifactKind) -> Result<usize> {
        self.ensure_open()?;

        let mut removed = 0;
        let mut primary_ok = false;
        if let Some(primary) = self.primary().await {
            match primary.clear(owner_id, kind).await {
                Ok(count) => {
                    removed += count;
                    primary_ok = true;
                }
                Err(e) => self.primary_failed("clear", &e),
            }
        }

        // Artifacts left in the fallback would reappear, so its failure is fatal
        removed += self.fallback.clear(owner_id, kind).await?;
        self.served(if primary_ok { Tier::Primary } else { Tier::Fallback }).await;

        self.view
            .write()
            .await
            .insert((owner_id.to_string(), kind), Vec::new());

        info!("Cleared {} {} artifacts for {}", removed, kind, owner_id);
        Ok(removed)
    }

    /// Decode an artifact's payload into downloadable bytes
    pub fn download(&self, artifact: &Artifact) -> Result<Download> {
        let (mime, bytes) = crate::artifact::decode_data_url(&artifact.payload)?;
        Ok(Download {
            file_name: artifact.display_name.clone(),
            mime,
            bytes,
        })
    }

    /// Last listing loaded for `owner_id` / `kind`, without touching storage
    pub async fn cached(&self, owner_id: &str, kind: ArtifactKind) -> Option<Vec<Artifact>> {
        self.view
            .read()
            .await
            .get(&(owner_id.to_string(), kind))
            .cloned()
    }

    /// Reopen the primary if needed and move fallback artifacts into it
    ///
    /// Returns the number of artifacts migrated. The degraded flag is
    /// cleared only when the fallback has been fully drained.
    pub async fn recover(&self) -> Result<usize> {
        self.ensure_open()?;

        let primary = match self.primary().await {
            Some(primary) => primary,
            None => {
                let path = self.database_path.as_ref().ok_or_else(|| {
                    SafePortError::StoreUnavailable("no primary tier configured".to_string())
                })?;
                let tier: Arc<dyn ArtifactTier> = Arc::new(SqliteTier::open(path).await?);
                *self.primary.write().await = Some(tier.clone());
                info!("Primary store reopened");
                tier
            }
        };

        let pending = self.fallback.all().await?;
        let mut migrated = 0;
        for artifact in &pending {
            if primary.get(artifact.id).await?.is_none() {
                primary.insert(artifact).await?;
                migrated += 1;
            }
        }

        // Everything is in the primary now; drain the fallback in one write
        let ids: Vec<Uuid> = pending.iter().map(|a| a.id).collect();
        self.fallback.remove_all(&ids).await?;

        self.degraded.store(false, Ordering::SeqCst);
        info!("Store recovered, {} artifacts migrated from fallback", migrated);
        Ok(migrated)
    }

    /// End the store's lifecycle. Further calls fail with `StoreClosed`.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.primary.write().await.take();
        self.view.write().await.clear();
        debug!("Artifact store closed");
    }
}

/// Add `extra` artifacts not already present, keeping newest-first order
fn merge_newest_first(artifacts: &mut Vec<Artifact>, extra: Vec<Artifact>) {
    for artifact in extra {
        if !artifacts.iter().any(|a| a.id == artifact.id) {
            artifacts.push(artifact);
        }
    }
    artifacts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
