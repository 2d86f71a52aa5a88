//! SQLite storage tier
//!
//! The primary tier. Every call opens its own connection on tokio's blocking
//! pool, runs one statement or transaction, and drops the connection before
//! returning, on success and failure alike.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::ArtifactTier;
use crate::artifact::{Artifact, ArtifactKind};
use crate::crypto::KeySize;
use crate::error::{Result, SafePortError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS artifacts (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('encrypted', 'decrypted')),
    display_name TEXT NOT NULL,
    payload TEXT NOT NULL,
    byte_size INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    algorithm TEXT,
    source_name TEXT
);

CREATE INDEX IF NOT EXISTS idx_artifacts_owner_kind
    ON artifacts (owner_id, kind, created_at DESC);
"#;

const SELECT_COLUMNS: &str =
    "id, owner_id, kind, display_name, payload, byte_size, created_at, algorithm, source_name";

/// How long a connection waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed artifact tier
pub struct SqliteTier {
    path: PathBuf,
}

impl SqliteTier {
    /// Open (or create) the database at `path` and make sure the schema exists
    ///
    /// Any failure here means the tier is unusable and is reported as
    /// [`SafePortError::StoreUnavailable`].
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let tier = Self {
            path: path.as_ref().to_path_buf(),
        };

        tier.with_conn(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(|e| {
            SafePortError::StoreUnavailable(format!("{}: {}", tier.path.display(), e))
        })?;

        debug!("SQLite artifact tier opened at: {:?}", tier.path);
        Ok(tier)
    }

    /// Run `f` against a fresh connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = Connection::open(&path)?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            f(&mut conn)
            // conn dropped here, closing the database handle
        })
        .await
        .map_err(|e| SafePortError::StorageError(format!("SQLite worker failed: {}", e)))?
    }
}

/// Raw row data from the artifacts table, before parsing into domain types
#[derive(Debug)]
struct ArtifactRow {
    id: String,
    owner_id: String,
    kind: String,
    display_name: String,
    payload: String,
    byte_size: i64,
    created_at: String,
    algorithm: Option<String>,
    source_name: Option<String>,
}

impl ArtifactRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            kind: row.get(2)?,
            display_name: row.get(3)?,
            payload: row.get(4)?,
            byte_size: row.get(5)?,
            created_at: row.get(6)?,
            algorithm: row.get(7)?,
            source_name: row.get(8)?,
        })
    }
}

impl TryFrom<ArtifactRow> for Artifact {
    type Error = SafePortError;

    fn try_from(row: ArtifactRow) -> Result<Self> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| SafePortError::StorageError(format!("Invalid artifact UUID: {}", e)))?;
        let kind = row.kind.parse::<ArtifactKind>()?;
        let byte_size = u64::try_from(row.byte_size)
            .map_err(|_| SafePortError::StorageError(format!("Invalid byte size: {}", row.byte_size)))?;
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|e| SafePortError::StorageError(format!("Invalid timestamp: {}", e)))?
            .with_timezone(&Utc);
        let algorithm = row
            .algorithm
            .as_deref()
            .map(str::parse::<KeySize>)
            .transpose()?;

        Ok(Artifact {
            id,
            owner_id: row.owner_id,
            display_name: row.display_name,
            payload: row.payload,
            byte_size,
            created_at,
            kind,
            algorithm,
            source_name: row.source_name,
        })
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    // Fixed-width UTC so lexical order matches chronological order
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn collect_rows<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Artifact>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, ArtifactRow::from_row)?;

    let mut artifacts = Vec::new();
    for row in rows {
        artifacts.push(row?.try_into()?);
    }
    Ok(artifacts)
}

#[async_trait]
impl ArtifactTier for SqliteTier {
    async fn insert(&self, artifact: &Artifact) -> Result<()> {
        let artifact = artifact.clone();
        let byte_size = i64::try_from(artifact.byte_size)
            .map_err(|_| SafePortError::InvalidArtifact("byte size too large".to_string()))?;

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO artifacts (id, owner_id, kind, display_name, payload, byte_size, created_at, algorithm, source_name) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    artifact.id.to_string(),
                    artifact.owner_id,
                    artifact.kind.as_str(),
                    artifact.display_name,
                    artifact.payload,
                    byte_size,
                    timestamp(&artifact.created_at),
                    artifact.algorithm.map(KeySize::label),
                    artifact.source_name,
                ],
            )?;
            tx.commit()?;
            debug!("Inserted artifact: {}", artifact.id);
            Ok(())
        })
        .await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Artifact>> {
        self.with_conn(move |conn| {
            let sql = format!("SELECT {} FROM artifacts WHERE id = ?1", SELECT_COLUMNS);
            let row = conn
                .query_row(&sql, [id.to_string()], ArtifactRow::from_row)
                .optional()?;
            row.map(Artifact::try_from).transpose()
        })
        .await
    }

    async fn list(&self, owner_id: &str, kind: ArtifactKind) -> Result<Vec<Artifact>> {
        let owner_id = owner_id.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM artifacts WHERE owner_id = ?1 AND kind = ?2 \
                 ORDER BY created_at DESC, rowid DESC",
                SELECT_COLUMNS
            );
            collect_rows(conn, &sql, params![owner_id, kind.as_str()])
        })
        .await
    }

    async fn remove(&self, id: Uuid) -> Result<bool> {
        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM artifacts WHERE id = ?1", [id.to_string()])?;
            debug!("Deleted artifact {} ({} rows)", id, removed);
            Ok(removed > 0)
        })
        .await
    }

    async fn remove_all(&self, ids: &[Uuid]) -> Result<usize> {
        let ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut removed = 0;
            {
                let mut stmt = tx.prepare("DELETE FROM artifacts WHERE id = ?1")?;
                for id in &ids {
                    removed += stmt.execute([id])?;
                }
            }
            tx.commit()?;
            Ok(removed)
        })
        .await
    }

    async fn clear(&self, owner_id: &str, kind: ArtifactKind) -> Result<usize> {
        let owner_id = owner_id.to_string();
        self.with_conn(move |conn| {
            let removed = conn.execute(
                "DELETE FROM artifacts WHERE owner_id = ?1 AND kind = ?2",
                params![owner_id, kind.as_str()],
            )?;
            Ok(removed)
        })
        .await
    }

    async fn all(&self) -> Result<Vec<Artifact>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM artifacts ORDER BY created_at DESC, rowid DESC",
                SELECT_COLUMNS
            );
            collect_rows(conn, &sql, [])
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "SQLite"
    }
}
