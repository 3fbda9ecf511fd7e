// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Boundary to the vendor protocol library.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::types::{InstanceId, SessionCredentials};
use crate::vendor::{OutboundMedia, VendorError, VendorEvent, VendorMessage};

/// A freshly established vendor session and its ordered event stream.
///
/// The stream ending without a close update is treated as a transient loss.
pub struct VendorConnection {
    pub session: Arc<dyn VendorSession>,
    pub events: mpsc::Receiver<VendorEvent>,
}

/// Factory for vendor sessions, one call per connection attempt.
#[async_trait]
pub trait VendorConnector: Send + Sync + 'static {
    /// Establishes a new session, resuming from `credentials` when present.
    ///
    /// Without credentials the vendor starts a pairing flow and reports a QR
    /// challenge through the event stream.
    async fn connect(
        &self,
        instance_id: &InstanceId,
        credentials: Option<SessionCredentials>,
    ) -> Result<VendorConnection, VendorError>;
}

/// Send primitives of one live vendor session.
#[async_trait]
pub trait VendorSession: Send + Sync + 'static {
    /// Sends a text message, returning the vendor-assigned message id.
    async fn send_text(&self, to: &str, text: &str) -> Result<String, VendorError>;

    /// Sends media fetched by the vendor from `media.url`.
    async fn send_media(&self, to: &str, media: &OutboundMedia) -> Result<String, VendorError>;

    /// Downloads and decrypts the media referenced by an inbound message.
    async fn download_media(&self, message: &VendorMessage) -> Result<Vec<u8>, VendorError>;

    async fn mark_read(&self, chat: &str, message_ids: &[String]) -> Result<(), VendorError>;

    async fn profile_picture_url(&self, jid: &str) -> Result<Option<String>, VendorError>;

    /// Revokes the device pairing on the remote side.
    async fn logout(&self) -> Result<(), VendorError>;

    /// Closes the socket without revoking the pairing.
    async fn close(&self);
}
