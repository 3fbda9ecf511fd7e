// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Directory-per-instance credential store.
//!
//! Layout: `<root>/<instance_id>/creds.json`. Writes go to a temporary file
//! in the same directory and are renamed into place, so a crash never leaves
//! a half-written credential file behind.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use zapline_core::{InstanceId, SessionCredentials, SessionStore, ZaplineError};

const CREDENTIALS_FILE: &str = "creds.json";

/// Filesystem-backed [`SessionStore`]. Development and single-node use only.
#[derive(Debug, Clone)]
pub struct FilesystemSessionStore {
    root: PathBuf,
}

impl FilesystemSessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn instance_dir(&self, instance_id: &InstanceId) -> Result<PathBuf, ZaplineError> {
        validate_component(instance_id)?;
        Ok(self.root.join(instance_id.as_str()))
    }
}

/// Instance ids become directory names and must not escape the root.
fn validate_component(instance_id: &InstanceId) -> Result<(), ZaplineError> {
    let id = instance_id.as_str();
    let safe = !id.is_empty()
        && id != "."
        && id != ".."
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if safe {
        Ok(())
    } else {
        Err(ZaplineError::Session {
            message: format!("instance id `{id}` is not a valid session directory name"),
            source: None,
        })
    }
}

#[async_trait]
impl SessionStore for FilesystemSessionStore {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn save(
        &self,
        instance_id: &InstanceId,
        credentials: &SessionCredentials,
    ) -> Result<(), ZaplineError> {
        let dir = self.instance_dir(instance_id)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ZaplineError::session(format!("create {}", dir.display()), e))?;

        let tmp = dir.join(format!(".{CREDENTIALS_FILE}.{}.tmp", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, credentials.as_bytes())
            .await
            .map_err(|e| ZaplineError::session(format!("write {}", tmp.display()), e))?;
        let target = dir.join(CREDENTIALS_FILE);
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(ZaplineError::session(
                format!("rename into {}", target.display()),
                e,
            ));
        }

        debug!(instance_id = %instance_id, bytes = credentials.len(), "credentials saved");
        Ok(())
    }

    async fn load(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Option<SessionCredentials>, ZaplineError> {
        let path = self.instance_dir(instance_id)?.join(CREDENTIALS_FILE);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(SessionCredentials::new(bytes))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ZaplineError::session(format!("read {}", path.display()), e)),
        }
    }

    async fn delete(&self, instance_id: &InstanceId) -> Result<(), ZaplineError> {
        let dir = self.instance_dir(instance_id)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(instance_id = %instance_id, "credentials deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ZaplineError::session(
                format!("remove {}", dir.display()),
                e,
            )),
        }
    }

    async fn list(&self) -> Result<Vec<InstanceId>, ZaplineError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ZaplineError::session(
                    format!("list {}", self.root.display()),
                    e,
                ));
            }
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ZaplineError::session("read session directory entry", e))?
        {
            let has_credentials = tokio::fs::try_exists(entry.path().join(CREDENTIALS_FILE))
                .await
                .unwrap_or(false);
            if has_credentials && let Some(name) = entry.file_name().to_str() {
                ids.push(InstanceId::from(name));
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, FilesystemSessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemSessionStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn save_then_load_returns_same_bytes() {
        let (_dir, store) = store();
        let id = InstanceId::from("inst-1");
        let creds = SessionCredentials::new(br#"{"noiseKey":"abc"}"#.to_vec());

        store.save(&id, &creds).await.unwrap();
        assert_eq!(store.load(&id).await.unwrap(), Some(creds));
    }

    #[tokio::test]
    async fn save_replaces_previous_credentials() {
        let (dir, store) = store();
        let id = InstanceId::from("inst-1");
        store.save(&id, &SessionCredentials::new(b"old".to_vec())).await.unwrap();
        store.save(&id, &SessionCredentials::new(b"new".to_vec())).await.unwrap();

        let loaded = store.load(&id).await.unwrap().unwrap();
        assert_eq!(loaded.as_bytes(), b"new");
        // Only the credential file remains; no temp files.
        let files: Vec<_> = std::fs::read_dir(dir.path().join("inst-1")).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn load_and_delete_of_unknown_instance_are_quiet() {
        let (_dir, store) = store();
        let id = InstanceId::from("never-saved");
        assert!(store.load(&id).await.unwrap().is_none());
        store.delete(&id).await.unwrap();
    }

    #[tokio::test]
    async fn delete_removes_credentials() {
        let (_dir, store) = store();
        let id = InstanceId::from("inst-2");
        store.save(&id, &SessionCredentials::new(b"x".to_vec())).await.unwrap();
        store.delete(&id).await.unwrap();
        assert!(store.load(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_returns_sorted_ids_with_credentials() {
        let (dir, store) = store();
        for id in ["b", "a"] {
            store
                .save(&InstanceId::from(id), &SessionCredentials::new(b"x".to_vec()))
                .await
                .unwrap();
        }
        std::fs::create_dir(dir.path().join("empty")).unwrap();

        let ids = store.list().await.unwrap();
        assert_eq!(ids, vec![InstanceId::from("a"), InstanceId::from("b")]);
    }

    #[tokio::test]
    async fn list_of_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemSessionStore::new(dir.path().join("missing"));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn path_traversal_ids_are_rejected() {
        let (_dir, store) = store();
        for bad in ["..", "../etc", "a/b", ""] {
            let err = store.load(&InstanceId::from(bad)).await.unwrap_err();
            assert!(matches!(err, ZaplineError::Session { .. }), "{bad}");
        }
    }
}
