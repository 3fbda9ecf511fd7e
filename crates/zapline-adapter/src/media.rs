// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound media download and local storage.
//!
//! Media handling is best effort: [`fetch_media`] never fails, it logs and
//! returns `None` so the carrying message is still delivered.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use zapline_config::MediaConfig;
use zapline_core::types::{MediaDescriptor, MediaInfo, StoredMedia};
use zapline_core::vendor::{MediaMessage, VendorMessage};
use zapline_core::{InstanceId, MediaStorage, MessageType, VendorSession, ZaplineError};

use crate::normalize;

/// Download the media of `message` and hand it to `storage`.
///
/// Returns `None` when no storage is configured or any step fails.
pub async fn fetch_media(
    instance_id: &InstanceId,
    session: &dyn VendorSession,
    storage: Option<&Arc<dyn MediaStorage>>,
    message: &VendorMessage,
    message_type: MessageType,
    payload: &MediaMessage,
) -> Option<MediaInfo> {
    let storage = storage?;

    let data = match session.download_media(message).await {
        Ok(data) => data,
        Err(e) => {
            warn!(
                instance_id = %instance_id,
                message_id = %message.key.id,
                error = %e,
                "media download failed, delivering message without media"
            );
            return None;
        }
    };
    debug!(
        instance_id = %instance_id,
        message_id = %message.key.id,
        size = data.len(),
        "downloaded inbound media"
    );

    let descriptor = MediaDescriptor {
        mime_type: payload
            .mimetype
            .clone()
            .unwrap_or_else(|| normalize::default_mime(message_type).to_string()),
        file_name: payload
            .file_name
            .clone()
            .unwrap_or_else(|| format!("{}.{}", message.key.id, extension_for(message_type))),
        message_id: message.key.id.clone(),
    };

    match storage.store_media(data, descriptor).await {
        Ok(stored) => Some(stored.into()),
        Err(e) => {
            warn!(
                instance_id = %instance_id,
                message_id = %message.key.id,
                error = %e,
                "media storage failed, delivering message without media"
            );
            None
        }
    }
}

fn extension_for(message_type: MessageType) -> &'static str {
    match message_type {
        MessageType::Image => "jpg",
        MessageType::Audio => "ogg",
        MessageType::Video => "mp4",
        MessageType::Text | MessageType::Document => "bin",
    }
}

/// A century; keeps `now + ttl` representable.
const MAX_TTL_HOURS: u64 = 24 * 365 * 100;

/// Writes media into a local directory served under `base_url`.
///
/// Files are named `<storage_id>.<ext>`. The expiry is reported to consumers
/// but nothing here deletes expired files.
#[derive(Debug, Clone)]
pub struct LocalMediaStorage {
    directory: PathBuf,
    base_url: String,
    ttl: chrono::Duration,
}

impl LocalMediaStorage {
    pub fn new(directory: impl Into<PathBuf>, base_url: impl Into<String>, ttl_hours: u64) -> Self {
        Self {
            directory: directory.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ttl: chrono::Duration::hours(ttl_hours.min(MAX_TTL_HOURS) as i64),
        }
    }

    /// `None` when media storage is disabled.
    pub fn from_config(config: &MediaConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(&config.directory, &config.base_url, config.ttl_hours))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

/// Keep the original extension when it is short and alphanumeric.
fn stored_extension(file_name: &str, mime_type: &str) -> String {
    let from_name = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()));
    let from_mime = || {
        mime_type
            .split(';')
            .next()
            .and_then(|m| m.split('/').nth(1))
            .map(str::trim)
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
    };
    from_name
        .or_else(from_mime)
        .unwrap_or("bin")
        .to_ascii_lowercase()
}

#[async_trait]
impl MediaStorage for LocalMediaStorage {
    async fn store_media(
        &self,
        data: Vec<u8>,
        descriptor: MediaDescriptor,
    ) -> Result<StoredMedia, ZaplineError> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| ZaplineError::media(format!("create {}", self.directory.display()), e))?;

        let storage_id = uuid::Uuid::new_v4().to_string();
        let stored_name = format!(
            "{storage_id}.{}",
            stored_extension(&descriptor.file_name, &descriptor.mime_type)
        );
        let path = self.directory.join(&stored_name);
        let size = data.len() as u64;
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| ZaplineError::media(format!("write {}", path.display()), e))?;

        debug!(storage_id = %storage_id, size, message_id = %descriptor.message_id, "media stored");
        Ok(StoredMedia {
            url: format!("{}/{stored_name}", self.base_url),
            mime_type: descriptor.mime_type,
            file_name: descriptor.file_name,
            size,
            expires_at: Some(Utc::now() + self.ttl),
            storage_id,
        })
    }
}
