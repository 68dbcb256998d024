//! Filesystem session store.
//!
//! The protocol library keeps its own keys in `{session_dir}/whatsapp.db`;
//! this store tracks a small `linked.json` marker beside it so the
//! coordinator knows a link happened, and `wipe` removes the whole session
//! directory for a fresh pairing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;
use waylink_core::error::WaylinkError;
use waylink_core::traits::SessionStore;

const MARKER_FILE: &str = "linked.json";

pub struct FsSessionStore {
    session_dir: PathBuf,
}

impl FsSessionStore {
    pub fn new(session_dir: impl Into<PathBuf>) -> Self {
        Self {
            session_dir: session_dir.into(),
        }
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    fn marker_path(&self) -> PathBuf {
        self.session_dir.join(MARKER_FILE)
    }
}

#[async_trait]
impl SessionStore for FsSessionStore {
    async fn load(&self) -> Result<Option<Vec<u8>>, WaylinkError> {
        match tokio::fs::read(self.marker_path()).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, credentials: &[u8]) -> Result<(), WaylinkError> {
        tokio::fs::create_dir_all(&self.session_dir).await?;
        tokio::fs::write(self.marker_path(), credentials).await?;
        Ok(())
    }

    async fn wipe(&self) -> Result<(), WaylinkError> {
        if self.session_dir.exists() {
            info!("removing session directory {}", self.session_dir.display());
            tokio::fs::remove_dir_all(&self.session_dir).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_is_none_before_first_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSessionStore::new(dir.path().join("session"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSessionStore::new(dir.path().join("session"));

        store.save(br#"{"linked":true}"#).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, br#"{"linked":true}"#);
    }

    #[tokio::test]
    async fn test_wipe_removes_session_directory() {
        let dir = tempfile::tempdir().unwrap();
        let session_dir = dir.path().join("session");
        let store = FsSessionStore::new(&session_dir);

        store.save(b"creds").await.unwrap();
        assert!(session_dir.exists());

        store.wipe().await.unwrap();
        assert!(!session_dir.exists());
        assert!(store.load().await.unwrap().is_none());

        // Wiping an already-clean store is a no-op.
        store.wipe().await.unwrap();
    }
}
