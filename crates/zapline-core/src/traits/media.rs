// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage collaborator for inbound media.

use async_trait::async_trait;

use crate::error::ZaplineError;
use crate::types::{MediaDescriptor, StoredMedia};

/// Persists downloaded media and returns a retrievable URL.
///
/// Failures are never fatal for the inbound message that carried the media.
#[async_trait]
pub trait MediaStorage: Send + Sync + 'static {
    async fn store_media(
        &self,
        data: Vec<u8>,
        descriptor: MediaDescriptor,
    ) -> Result<StoredMedia, ZaplineError>;
}
