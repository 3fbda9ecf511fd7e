// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the adapter, manager and session store crates.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier of a managed instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub String);

impl InstanceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(value: &str) -> Self {
        InstanceId(value.to_string())
    }
}

/// Identifier of the tenant that owns an instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        TenantId(value.to_string())
    }
}

/// The (instance, tenant) pair carried by every lifecycle signal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceRef {
    pub instance_id: InstanceId,
    pub tenant_id: TenantId,
}

/// Connection state of one instance.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    QrRequired,
    Error,
}

impl ConnectionStatus {
    /// Statuses during which exactly one vendor session is alive.
    pub fn has_live_session(self) -> bool {
        matches!(
            self,
            ConnectionStatus::Connecting | ConnectionStatus::Connected | ConnectionStatus::QrRequired
        )
    }
}

/// Canonical inbound message kinds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageType {
    Text,
    Image,
    Audio,
    Video,
    Document,
}

impl MessageType {
    pub fn is_media(self) -> bool {
        !matches!(self, MessageType::Text)
    }
}

/// Stored media attached to a [`NormalizedMessage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub url: String,
    pub mime_type: String,
    pub file_name: String,
    pub size_bytes: u64,
    pub expires_at: Option<DateTime<Utc>>,
}

/// The single canonical inbound-message shape handed to downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMessage {
    /// Vendor message id.
    pub id: String,
    /// Chat the message arrived from (reply target).
    pub from: String,
    /// Account the message was addressed to.
    pub to: String,
    /// Text content, caption, or a placeholder for media without caption.
    pub content: String,
    pub message_type: MessageType,
    pub timestamp: DateTime<Utc>,
    /// Sender display name, when the vendor supplies one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaInfo>,
}

/// Opaque per-instance credential blob produced by the vendor library.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredentials(Vec<u8>);

impl SessionCredentials {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        SessionCredentials(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Credentials never show up in logs.
impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionCredentials(<{} bytes redacted>)", self.0.len())
    }
}

/// Delivery status of an outbound send as reported by the vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SendStatus {
    Sent,
}

/// Confirmation of an accepted outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Vendor-assigned message id.
    pub external_id: String,
    pub status: SendStatus,
}

impl SendReceipt {
    pub fn sent(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            status: SendStatus::Sent,
        }
    }
}

/// Metadata passed alongside media bytes to a [`MediaStorage`](crate::MediaStorage).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDescriptor {
    pub mime_type: String,
    pub file_name: String,
    pub message_id: String,
}

/// Result of persisting downloaded media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMedia {
    pub url: String,
    pub mime_type: String,
    pub file_name: String,
    pub size: u64,
    pub expires_at: Option<DateTime<Utc>>,
    pub storage_id: String,
}

impl From<StoredMedia> for MediaInfo {
    fn from(stored: StoredMedia) -> Self {
        MediaInfo {
            url: stored.url,
            mime_type: stored.mime_type,
            file_name: stored.file_name,
            size_bytes: stored.size,
            expires_at: stored.expires_at,
        }
    }
}

/// Why an instance left the connected state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisconnectReason {
    /// An explicit `stop_instance` (or shutdown) closed the session.
    ManualStop,
    /// The remote side revoked the session; no reconnect is attempted.
    Terminal { code: Option<u16>, message: String },
    /// A recoverable connection loss.
    Transient { code: Option<u16>, message: String },
}

impl DisconnectReason {
    pub fn is_transient(&self) -> bool {
        matches!(self, DisconnectReason::Transient { .. })
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::ManualStop => f.write_str("manual stop"),
            DisconnectReason::Terminal { code, message } => match code {
                Some(code) => write!(f, "terminal closure ({code}): {message}"),
                None => write!(f, "terminal closure: {message}"),
            },
            DisconnectReason::Transient { code, message } => match code {
                Some(code) => write!(f, "transient closure ({code}): {message}"),
                None => write!(f, "transient closure: {message}"),
            },
        }
    }
}

/// A managed instance as seen by callers of the manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,
    pub tenant_id: TenantId,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    pub status: ConnectionStatus,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

/// Per-instance line of a [`HealthReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSummary {
    pub id: InstanceId,
    pub tenant_id: TenantId,
    pub name: String,
    pub status: ConnectionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,
}

/// Read-only aggregate returned by the manager health check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub total_instances: usize,
    pub connected_instances: usize,
    /// `total_instances - connected_instances`: instances that are
    /// `connecting`, `qr_required` or in `error` count here too.
    pub disconnected_instances: usize,
    pub instances: Vec<InstanceSummary>,
}
