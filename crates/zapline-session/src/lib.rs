// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session credential stores for Zapline.
//!
//! [`FilesystemSessionStore`] keeps one directory per instance and is meant
//! for development. [`SqliteSessionStore`] is the pluggable store used in
//! every other environment.

pub mod filesystem;
pub mod sqlite;

use std::sync::Arc;

use zapline_config::{SessionBackend, SessionConfig};
use zapline_core::{SessionStore, ZaplineError};

pub use filesystem::FilesystemSessionStore;
pub use sqlite::SqliteSessionStore;

/// Build the pluggable session store selected by configuration.
///
/// Returns `None` for the filesystem backend: the manager only falls back to
/// a filesystem store in development and refuses to start otherwise.
pub async fn session_store_from_config(
    config: &SessionConfig,
) -> Result<Option<Arc<dyn SessionStore>>, ZaplineError> {
    match config.backend {
        SessionBackend::Filesystem => Ok(None),
        SessionBackend::Sqlite => {
            let store = SqliteSessionStore::open(&config.database_path).await?;
            Ok(Some(Arc::new(store)))
        }
    }
}

/// Open whichever store the configuration names, filesystem included.
///
/// Used by the operator CLI, which inspects stores directly.
pub async fn open_configured_store(
    config: &SessionConfig,
) -> Result<Arc<dyn SessionStore>, ZaplineError> {
    match session_store_from_config(config).await? {
        Some(store) => Ok(store),
        None => Ok(Arc::new(FilesystemSessionStore::new(&config.directory))),
    }
}
