//! Main SafePort orchestration
//!
//! Wires the crypto pipeline to the artifact store: every successful
//! encryption or decryption is saved for the user that requested it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::artifact::{Artifact, ArtifactKind, Download, NewArtifact};
use crate::crypto::{decrypt_file_async, encrypt_file_async, KeySize};
use crate::error::{Result, SafePortError};
use crate::settings::{Settings, SettingsManager};
use crate::storage::{ArtifactStore, StoreStatus};

/// Passwords shorter than this are accepted but logged as weak
pub const MIN_PASSWORD_LEN: usize = 8;

/// Whether `password` is below the recommended strength
pub fn is_weak_password(password: &str) -> bool {
    password.chars().count() < MIN_PASSWORD_LEN
}

/// Main struct that orchestrates encryption and storage
pub struct SafePort {
    /// Artifact store shared with callers that need direct access
    store: Arc<ArtifactStore>,
    /// Settings manager (non-sensitive config)
    settings_manager: SettingsManager,
    data_dir: PathBuf,
}

impl SafePort {
    /// Open SafePort with its stores and settings under `data_dir`
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&data_dir).await?;

        let settings_manager = SettingsManager::new(&data_dir);
        let config = settings_manager.get().store_config(&data_dir);
        let store = ArtifactStore::open(&config).await?;

        if store.is_degraded() {
            warn!("Running in degraded mode, artifacts are kept in {:?}", config.fallback_path);
        }
        info!("SafePort opened at {:?}", data_dir);

        Ok(Self {
            store: Arc::new(store),
            settings_manager,
            data_dir,
        })
    }

    /// Create SafePort over an already opened store
    pub fn with_store(store: Arc<ArtifactStore>, data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref().to_path_buf();
        let settings_manager = SettingsManager::new(&data_dir);

        Self {
            store,
            settings_manager,
            data_dir,
        }
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get current settings
    pub fn settings(&self) -> &Settings {
        self.settings_manager.get()
    }

    /// Update settings and save. Store locations take effect on next open.
    pub async fn update_settings(&mut self, settings: Settings) -> Result<()> {
        self.settings_manager.update(settings).await
    }

    pub fn default_algorithm(&self) -> KeySize {
        self.settings().default_algorithm
    }

    pub async fn set_default_algorithm(&mut self, algorithm: KeySize) -> Result<()> {
        self.settings_manager.set_default_algorithm(algorithm).await?;
        info!("Default algorithm set to {}", algorithm);
        Ok(())
    }

    /// Encrypt `bytes` with `password` and save the container for `owner_id`
    pub async fn encrypt(
        &self,
        owner_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
        password: &str,
        algorithm: KeySize,
    ) -> Result<Artifact> {
        if is_weak_password(password) {
            warn!("Encrypting {} with a weak password", file_name);
        }

        let original_size = bytes.len() as u64;
        let container =
            encrypt_file_async(bytes, password.as_bytes().to_vec(), algorithm).await?;

        let new = NewArtifact::encrypted(owner_id, file_name, original_size, &container, algorithm);
        let artifact = self.store.save(new).await?;

        info!("Encrypted {} as {}", file_name, artifact.display_name);
        Ok(artifact)
    }

    /// Decrypt a stored encrypted artifact using the algorithm it was saved with
    pub async fn decrypt_artifact(
        &self,
        owner_id: &str,
        artifact: &Artifact,
        password: &str,
    ) -> Result<Artifact> {
        if artifact.owner_id != owner_id {
            return Err(SafePortError::ArtifactNotFound(artifact.id.to_string()));
        }
        if artifact.kind != ArtifactKind::Encrypted {
            return Err(SafePortError::InvalidArtifact(format!(
                "{} is not an encrypted artifact",
                artifact.display_name
            )));
        }
        let algorithm = artifact.algorithm.ok_or_else(|| {
            SafePortError::InvalidArtifact(format!("{} has no algorithm", artifact.display_name))
        })?;

        let container = artifact.bytes()?;
        self.decrypt_upload(owner_id, &artifact.display_name, container, password, algorithm)
            .await
    }

    /// Decrypt a stored artifact looked up by id
    pub async fn decrypt_by_id(&self, owner_id: &str, id: Uuid, password: &str) -> Result<Artifact> {
        let artifact = self.find(owner_id, id).await?;
        self.decrypt_artifact(owner_id, &artifact, password).await
    }

    /// Decrypt a container supplied by the caller and save the plaintext
    pub async fn decrypt_upload(
        &self,
        owner_id: &str,
        file_name: &str,
        container: Vec<u8>,
        password: &str,
        algorithm: KeySize,
    ) -> Result<Artifact> {
        let plaintext =
            decrypt_file_async(container, password.as_bytes().to_vec(), algorithm).await?;

        let new = NewArtifact::decrypted(owner_id, file_name, &plaintext);
        let artifact = self.store.save(new).await?;

        info!("Decrypted {} as {}", file_name, artifact.display_name);
        Ok(artifact)
    }

    /// Fetch an artifact owned by `owner_id`
    pub async fn find(&self, owner_id: &str, id: Uuid) -> Result<Artifact> {
        match self.store.get(id).await? {
            Some(artifact) if artifact.owner_id == owner_id => Ok(artifact),
            _ => Err(SafePortError::ArtifactNotFound(id.to_string())),
        }
    }

    pub async fn list(&self, owner_id: &str, kind: ArtifactKind) -> Result<Vec<Artifact>> {
        self.store.list(owner_id, kind).await
    }

    pub async fn search(&self, owner_id: &str, kind: ArtifactKind, term: &str) -> Result<Vec<Artifact>> {
        self.store.search(owner_id, kind, term).await
    }

    /// Delete one of `owner_id`'s artifacts. Unknown ids are ignored.
    pub async fn delete(&self, owner_id: &str, id: Uuid) -> Result<()> {
        match self.store.get(id).await? {
            Some(artifact) if artifact.owner_id != owner_id => {
                Err(SafePortError::ArtifactNotFound(id.to_string()))
            }
            _ => self.store.delete(id).await,
        }
    }

    /// Materialize one of `owner_id`'s artifacts for download
    pub async fn download(&self, owner_id: &str, id: Uuid) -> Result<Download> {
        let artifact = self.find(owner_id, id).await?;
        debug!("Preparing download of {}", artifact.display_name);
        self.store.download(&artifact)
    }

    pub async fn clear(&self, owner_id: &str, kind: ArtifactKind) -> Result<usize> {
        self.store.clear(owner_id, kind).await
    }

    pub fn is_degraded(&self) -> bool {
        self.store.is_degraded()
    }

    pub async fn status(&self) -> StoreStatus {
        self.store.status().await
    }

    /// Move artifacts saved during an outage back into the primary tier
    pub async fn recover(&self) -> Result<usize> {
        self.store.recover().await
    }

    pub async fn close(&self) {
        self.store.close().await;
        info!("SafePort closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_safeport() -> (SafePort, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let safeport = SafePort::open(temp_dir.path()).await.unwrap();
        (safeport, temp_dir)
    }

    #[tokio::test]
    async fn test_encrypt_then_decrypt_stored() {
        let (safeport, _temp) = test_safeport().await;

        let encrypted = safeport
            .encrypt("alice", "notes.txt", b"secret notes".to_vec(), "correct horse", KeySize::Aes192)
            .await
            .unwrap();
        assert_eq!(encrypted.display_name, "notes.txt.encrypted");
        assert_eq!(encrypted.byte_size, 12);
        assert_eq!(encrypted.algorithm, Some(KeySize::Aes192));
        assert_ne!(encrypted.bytes().unwrap(), b"secret notes");

        let decrypted = safeport
            .decrypt_artifact("alice", &encrypted, "correct horse")
            .await
            .unwrap();
        assert_eq!(decrypted.display_name, "notes.txt");
        assert_eq!(decrypted.kind, ArtifactKind::Decrypted);
        assert_eq!(decrypted.source_name.as_deref(), Some("notes.txt.encrypted"));
        assert_eq!(decrypted.bytes().unwrap(), b"secret notes");

        assert_eq!(safeport.list("alice", ArtifactKind::Encrypted).await.unwrap().len(), 1);
        assert_eq!(safeport.list("alice", ArtifactKind::Decrypted).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_password_saves_nothing() {
        let (safeport, _temp) = test_safeport().await;

        let encrypted = safeport
            .encrypt("alice", "a.bin", vec![1, 2, 3], "right-password", KeySize::Aes256)
            .await
            .unwrap();

        let result = safeport.decrypt_artifact("alice", &encrypted, "wrong-password").await;
        assert!(matches!(result, Err(SafePortError::AuthenticationFailure)));
        assert!(safeport.list("alice", ArtifactKind::Decrypted).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_decrypt_upload_malformed() {
        let (safeport, _temp) = test_safeport().await;

        let result = safeport
            .decrypt_upload("alice", "short.encrypted", vec![0; 27], "pw", KeySize::Aes256)
            .await;
        assert!(matches!(result, Err(SafePortError::MalformedContainer(_))));
    }

    #[tokio::test]
    async fn test_other_users_artifacts_hidden() {
        let (safeport, _temp) = test_safeport().await;

        let encrypted = safeport
            .encrypt("alice", "a", b"x".to_vec(), "password1", KeySize::Aes128)
            .await
            .unwrap();

        assert!(matches!(
            safeport.download("bob", encrypted.id).await,
            Err(SafePortError::ArtifactNotFound(_))
        ));
        assert!(matches!(
            safeport.decrypt_artifact("bob", &encrypted, "password1").await,
            Err(SafePortError::ArtifactNotFound(_))
        ));
        assert!(safeport.delete("bob", encrypted.id).await.is_err());
        assert!(safeport.find("alice", encrypted.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_download_and_delete() {
        let (safeport, _temp) = test_safeport().await;

        let encrypted = safeport
            .encrypt("alice", "a.txt", b"payload".to_vec(), "password1", KeySize::Aes256)
            .await
            .unwrap();

        let download = safeport.download("alice", encrypted.id).await.unwrap();
        assert_eq!(download.file_name, "a.txt.encrypted");
        assert_eq!(download.mime, "application/octet-stream");
        assert_eq!(download.bytes, encrypted.bytes().unwrap());

        safeport.delete("alice", encrypted.id).await.unwrap();
        safeport.delete("alice", encrypted.id).await.unwrap();
        assert!(safeport.list("alice", ArtifactKind::Encrypted).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_decrypting_decrypted_artifact_rejected() {
        let (safeport, _temp) = test_safeport().await;

        let encrypted = safeport
            .encrypt("alice", "a", b"x".to_vec(), "password1", KeySize::Aes256)
            .await
            .unwrap();
        let decrypted = safeport.decrypt_by_id("alice", encrypted.id, "password1").await.unwrap();

        let result = safeport.decrypt_artifact("alice", &decrypted, "password1").await;
        assert!(matches!(result, Err(SafePortError::InvalidArtifact(_))));
    }

    #[tokio::test]
    async fn test_with_store_shares_artifacts() {
        let temp_dir = TempDir::new().unwrap();
        let config = Settings::default().store_config(temp_dir.path());
        let store = Arc::new(ArtifactStore::open(&config).await.unwrap());
        let safeport = SafePort::with_store(store.clone(), temp_dir.path());

        let encrypted = safeport
            .encrypt("alice", "a", b"x".to_vec(), "password1", KeySize::Aes256)
            .await
            .unwrap();

        let listed = store.list("alice", ArtifactKind::Encrypted).await.unwrap();
        assert_eq!(listed, vec![encrypted]);
        assert_eq!(safeport.default_algorithm(), KeySize::Aes256);
    }

    #[tokio::test]
    async fn test_settings_changes_persist() {
        let temp_dir = TempDir::new().unwrap();

        {
            let mut safeport = SafePort::open(temp_dir.path()).await.unwrap();
            safeport.set_default_algorithm(KeySize::Aes128).await.unwrap();

            let mut settings = safeport.settings().clone();
            settings.fallback_capacity_bytes = 1024 * 1024;
            safeport.update_settings(settings).await.unwrap();
            safeport.close().await;
        }

        let safeport = SafePort::open(temp_dir.path()).await.unwrap();
        assert_eq!(safeport.default_algorithm(), KeySize::Aes128);
        assert_eq!(safeport.settings().fallback_capacity_bytes, 1024 * 1024);
    }

    #[test]
    fn test_weak_password() {
        assert!(is_weak_password(""));
        assert!(is_weak_password("short"));
        assert!(!is_weak_password("long enough"));
    }

    #[tokio::test]
    async fn test_closed_safeport() {
        let (safeport, _temp) = test_safeport().await;
        safeport.close().await;

        let result = safeport
            .encrypt("alice", "a", b"x".to_vec(), "password1", KeySize::Aes256)
            .await;
        assert!(matches!(result, Err(SafePortError::StoreClosed)));
    }
}
