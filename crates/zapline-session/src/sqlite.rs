// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`SessionStore`] trait.
//!
//! All statements run on tokio-rusqlite's single background thread, which
//! also serializes writes.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;
use tracing::debug;

use zapline_core::{InstanceId, SessionCredentials, SessionStore, ZaplineError};

const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA busy_timeout = 5000;
CREATE TABLE IF NOT EXISTS instance_sessions (
    instance_id TEXT PRIMARY KEY NOT NULL,
    credentials BLOB NOT NULL,
    updated_at TEXT NOT NULL
);
";

fn map_tr_err(
    context: &'static str,
) -> impl Fn(tokio_rusqlite::Error<rusqlite::Error>) -> ZaplineError {
    move |e| ZaplineError::Session {
        message: format!("{context}: {e}"),
        source: Some(Box::new(e)),
    }
}

/// SQLite-backed session store.
pub struct SqliteSessionStore {
    conn: Connection,
}

impl SqliteSessionStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ZaplineError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ZaplineError::session(format!("create {}", parent.display()), e)
            })?;
        }
        let conn = Connection::open(path)
            .await
            .map_err(|e| ZaplineError::session(format!("open {}", path.display()), e))?;
        let store = Self::with_connection(conn).await?;
        debug!(path = %path.display(), "sqlite session store opened");
        Ok(store)
    }

    /// In-memory database, mostly useful in tests.
    pub async fn open_in_memory() -> Result<Self, ZaplineError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| ZaplineError::session("open in-memory database", e))?;
        Self::with_connection(conn).await
    }

    async fn with_connection(conn: Connection) -> Result<Self, ZaplineError> {
        conn.call(|conn| conn.execute_batch(SCHEMA))
            .await
            .map_err(map_tr_err("create schema"))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn save(
        &self,
        instance_id: &InstanceId,
        credentials: &SessionCredentials,
    ) -> Result<(), ZaplineError> {
        let id = instance_id.as_str().to_owned();
        let blob = credentials.as_bytes().to_vec();
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO instance_sessions (instance_id, credentials, updated_at) \
                     VALUES (?1, ?2, ?3) \
                     ON CONFLICT(instance_id) DO UPDATE SET \
                     credentials = excluded.credentials, updated_at = excluded.updated_at",
                    rusqlite::params![id, blob, now],
                )
            })
            .await
            .map_err(map_tr_err("save credentials"))?;
        Ok(())
    }

    async fn load(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Option<SessionCredentials>, ZaplineError> {
        let id = instance_id.as_str().to_owned();
        let blob = self
            .conn
            .call(move |conn| {
                conn.query_row(
                    "SELECT credentials FROM instance_sessions WHERE instance_id = ?1",
                    rusqlite::params![id],
                    |row| row.get::<_, Vec<u8>>(0),
                )
                .optional()
            })
            .await
            .map_err(map_tr_err("load credentials"))?;
        Ok(blob.map(SessionCredentials::new))
    }

    async fn delete(&self, instance_id: &InstanceId) -> Result<(), ZaplineError> {
        let id = instance_id.as_str().to_owned();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM instance_sessions WHERE instance_id = ?1",
                    rusqlite::params![id],
                )
            })
            .await
            .map_err(map_tr_err("delete credentials"))?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<InstanceId>, ZaplineError> {
        let ids = self
            .conn
            .call(|conn| {
                let mut stmt = conn
                    .prepare("SELECT instance_id FROM instance_sessions ORDER BY instance_id")?;
                stmt.query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()
            })
            .await
            .map_err(map_tr_err("list sessions"))?;
        Ok(ids.into_iter().map(InstanceId).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_load_delete_cycle() {
        let store = SqliteSessionStore::open_in_memory().await.unwrap();
        let id = InstanceId::from("inst-1");
        assert!(store.load(&id).await.unwrap().is_none());

        store
            .save(&id, &SessionCredentials::new(b"first".to_vec()))
            .await
            .unwrap();
        store
            .save(&id, &SessionCredentials::new(b"second".to_vec()))
            .await
            .unwrap();
        let loaded = store.load(&id).await.unwrap().unwrap();
        assert_eq!(loaded.as_bytes(), b"second");

        store.delete(&id).await.unwrap();
        assert!(store.load(&id).await.unwrap().is_none());
        // Deleting again is not an error.
        store.delete(&id).await.unwrap();
    }

    #[tokio::test]
    async fn list_is_ordered() {
        let store = SqliteSessionStore::open_in_memory().await.unwrap();
        for id in ["zeta", "alpha", "mid"] {
            store
                .save(&InstanceId::from(id), &SessionCredentials::new(vec![1, 2, 3]))
                .await
                .unwrap();
        }
        let ids = store.list().await.unwrap();
        assert_eq!(
            ids,
            vec![
                InstanceId::from("alpha"),
                InstanceId::from("mid"),
                InstanceId::from("zeta")
            ]
        );
    }

    #[tokio::test]
    async fn credentials_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sessions.db");
        let id = InstanceId::from("persisted");
        {
            let store = SqliteSessionStore::open(&path).await.unwrap();
            store
                .save(&id, &SessionCredentials::new(b"blob".to_vec()))
                .await
                .unwrap();
        }
        let reopened = SqliteSessionStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.load(&id).await.unwrap().unwrap().as_bytes(),
            b"blob"
        );
    }
}
