//! Concurrent map of live sessions

use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::Session;
use crate::error::{Error, Result};

/// Live sessions keyed by id
///
/// Each session sits behind its own async mutex, so actions on one session
/// run one at a time while different sessions proceed in parallel.
pub struct SessionManager {
    sessions: DashMap<Uuid, Arc<Mutex<Session>>>,
    index_root: PathBuf,
    isolate_indexes: bool,
}

impl SessionManager {
    /// `index_root` is the configured index path. With `isolate_indexes`
    /// every session gets `<index_root>/<session id>`; otherwise all share it.
    pub fn new(index_root: impl Into<PathBuf>, isolate_indexes: bool) -> Self {
        Self {
            sessions: DashMap::new(),
            index_root: index_root.into(),
            isolate_indexes,
        }
    }

    pub fn index_root(&self) -> &Path {
        &self.index_root
    }

    fn index_path_for(&self, id: Uuid) -> PathBuf {
        if self.isolate_indexes {
            self.index_root.join(id.to_string())
        } else {
            self.index_root.clone()
        }
    }

    /// Start a new session
    pub fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        let session = Session::with_id(id, self.index_path_for(id));
        self.sessions.insert(id, Arc::new(Mutex::new(session)));
        tracing::info!("Created session {}", id);
        id
    }

    pub fn get(&self, id: Uuid) -> Result<Arc<Mutex<Session>>> {
        self.sessions
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    /// End a session; an isolated index directory is deleted with it
    pub async fn remove(&self, id: Uuid) -> Result<()> {
        let (_, session) = self
            .sessions
            .remove(&id)
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))?;

        if self.isolate_indexes {
            let index_path = session.lock().await.index_path().to_path_buf();
            match tokio::fs::remove_dir_all(&index_path).await {
                Ok(()) => tracing::debug!("Removed index {}", index_path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Could not remove {}: {}", index_path.display(), e),
            }
        }

        tracing::info!("Ended session {}", id);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_isolated_index_paths() {
        let manager = SessionManager::new("vector_index", true);
        let a = manager.create();
        let b = manager.create();

        let path_a = manager.get(a).unwrap().lock().await.index_path().to_path_buf();
        let path_b = manager.get(b).unwrap().lock().await.index_path().to_path_buf();
        assert_eq!(path_a, Path::new("vector_index").join(a.to_string()));
        assert_ne!(path_a, path_b);

        let shared = SessionManager::new("vector_index", false);
        let c = shared.create();
        let path_c = shared.get(c).unwrap().lock().await.index_path().to_path_buf();
        assert_eq!(path_c, Path::new("vector_index"));
    }

    #[tokio::test]
    async fn test_remove_deletes_isolated_index() {
        let root = tempfile::tempdir().unwrap();
        let manager = SessionManager::new(root.path(), true);
        let id = manager.create();

        let dir = root.path().join(id.to_string());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("index.json"), b"{}").unwrap();

        manager.remove(id).await.unwrap();
        assert!(!dir.exists());
        assert!(manager.is_empty());
        assert!(matches!(manager.get(id), Err(Error::SessionNotFound(_))));
        assert!(manager.remove(id).await.is_err());
    }
}
