use std::collections::HashMap;
use std::path::PathBuf;

use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::types::UserCredential;

/// Per-user credential persistence. Every attendance operation re-reads the
/// credential; nothing is cached across requests.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<UserCredential>;
    async fn put(&self, credential: &UserCredential) -> Result<()>;
    async fn delete(&self, user_id: &str) -> Result<()>;
    async fn list_all(&self) -> Result<Vec<String>>;
}

/// One JSON document per user; the file name is the Slack user id.
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, user_id: &str) -> PathBuf {
        self.dir.join(user_id)
    }
}

#[async_trait::async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, user_id: &str) -> Result<UserCredential> {
        let data = match tokio::fs::read(self.path_for(user_id)).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(user_id.to_string()))
            }
            Err(e) => return Err(Error::Persist(e.to_string())),
        };
        serde_json::from_slice(&data).map_err(|e| Error::Persist(e.to_string()))
    }

    async fn put(&self, credential: &UserCredential) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::Persist(e.to_string()))?;
        let data =
            serde_json::to_vec(credential).map_err(|e| Error::Persist(e.to_string()))?;
        tokio::fs::write(self.path_for(&credential.id), data)
            .await
            .map_err(|e| Error::Persist(e.to_string()))
    }

    async fn delete(&self, user_id: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(user_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(user_id.to_string()))
            }
            Err(e) => Err(Error::Persist(e.to_string())),
        }
    }

    async fn list_all(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            // No registrations yet.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Enumeration(e.to_string())),
        };

        let mut users = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::Enumeration(e.to_string()))?
        {
            if let Some(name) = entry.file_name().to_str() {
                users.push(name.to_string());
            }
        }
        Ok(users)
    }
}

/// Map-backed store for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryCredentialStore {
    users: RwLock<HashMap<String, UserCredential>>,
}

#[async_trait::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, user_id: &str) -> Result<UserCredential> {
        let users = self.users.read().await;
        users
            .get(user_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(user_id.to_string()))
    }

    async fn put(&self, credential: &UserCredential) -> Result<()> {
        let mut users = self.users.write().await;
        users.insert(credential.id.clone(), credential.clone());
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<()> {
        let mut users = self.users.write().await;
        users
            .remove(user_id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(user_id.to_string()))
    }

    async fn list_all(&self) -> Result<Vec<String>> {
        let users = self.users.read().await;
        Ok(users.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OauthToken;

    fn credential(user_id: &str) -> UserCredential {
        UserCredential {
            id: user_id.to_string(),
            employee_id: "7".to_string(),
            token: OauthToken {
                access_token: "at".to_string(),
                token_type: "bearer".to_string(),
                refresh_token: "rt".to_string(),
                expires_in: 86400,
            },
        }
    }

    #[tokio::test]
    async fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());

        store.put(&credential("U1")).await.unwrap();
        let loaded = store.get("U1").await.unwrap();
        assert_eq!(loaded.employee_id, "7");

        let users = store.list_all().await.unwrap();
        assert_eq!(users, vec!["U1".to_string()]);

        store.delete("U1").await.unwrap();
        assert!(matches!(store.get("U1").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn file_store_put_overwrites_existing_registration() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());

        store.put(&credential("U1")).await.unwrap();
        let mut updated = credential("U1");
        updated.employee_id = "8".to_string();
        store.put(&updated).await.unwrap();

        assert_eq!(store.get("U1").await.unwrap().employee_id, "8");
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn file_store_delete_missing_reports_not_found_every_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());

        store.put(&credential("U1")).await.unwrap();
        store.delete("U1").await.unwrap();
        assert!(matches!(store.delete("U1").await, Err(Error::NotFound(_))));
        assert!(matches!(store.delete("U1").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn file_store_lists_empty_when_dir_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("never-created"));
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn memory_store_matches_file_store_semantics() {
        let store = MemoryCredentialStore::default();

        assert!(matches!(store.get("U1").await, Err(Error::NotFound(_))));
        store.put(&credential("U1")).await.unwrap();
        store.put(&credential("U2")).await.unwrap();

        let mut users = store.list_all().await.unwrap();
        users.sort();
        assert_eq!(users, vec!["U1".to_string(), "U2".to_string()]);

        store.delete("U1").await.unwrap();
        assert!(matches!(store.delete("U1").await, Err(Error::NotFound(_))));
    }
}
