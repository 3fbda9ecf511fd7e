// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media storage double that keeps everything in memory.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use zapline_core::types::{MediaDescriptor, StoredMedia};
use zapline_core::{MediaStorage, ZaplineError};

/// Records stored media; can be switched to fail every call.
#[derive(Default)]
pub struct MockMediaStorage {
    stored: Mutex<Vec<(MediaDescriptor, Vec<u8>)>>,
    fail: AtomicBool,
}

impl MockMediaStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn stored(&self) -> Vec<(MediaDescriptor, Vec<u8>)> {
        self.stored.lock().await.clone()
    }
}

#[async_trait]
impl MediaStorage for MockMediaStorage {
    async fn store_media(
        &self,
        data: Vec<u8>,
        descriptor: MediaDescriptor,
    ) -> Result<StoredMedia, ZaplineError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ZaplineError::Media {
                message: "injected storage failure".to_string(),
                source: None,
            });
        }
        let storage_id = uuid::Uuid::new_v4().to_string();
        let stored = StoredMedia {
            url: format!("https://media.test/{storage_id}"),
            mime_type: descriptor.mime_type.clone(),
            file_name: descriptor.file_name.clone(),
            size: data.len() as u64,
            expires_at: Some(chrono::Utc::now() + chrono::Duration::hours(24)),
            storage_id,
        };
        self.stored.lock().await.push((descriptor, data));
        Ok(stored)
    }
}
