// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payload types exchanged with the vendor protocol library.
//!
//! The vendor library is an opaque dependency. These types describe only the
//! parts of its event stream and send primitives that Zapline consumes. The
//! inbound message payload mirrors the vendor's JSON shape (camelCase, one
//! optional field per message kind) so that recorded payloads deserialize
//! directly.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{MessageType, SessionCredentials};

/// Chat id the vendor uses for status broadcasts. Never a conversation.
pub const STATUS_BROADCAST_JID: &str = "status@broadcast";

/// Error raised by the vendor library. Propagated to callers unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("vendor error{}: {message}", .code.map(|c| format!(" {c}")).unwrap_or_default())]
pub struct VendorError {
    /// Vendor status code, when the failure carries one.
    pub code: Option<u16>,
    pub message: String,
}

impl VendorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: u16, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }
}

/// Events pushed by a live vendor session, delivered in order.
#[derive(Debug, Clone)]
pub enum VendorEvent {
    ConnectionUpdate(ConnectionUpdate),
    /// The vendor rotated the session credentials; they must be persisted.
    CredentialsUpdate(SessionCredentials),
    /// A batch of inbound (or echoed outbound) messages.
    Messages(Vec<VendorMessage>),
    MessageStatus(Vec<MessageStatusUpdate>),
    Presence(PresenceUpdate),
}

/// Socket state reported in a connection update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Close,
}

/// Details of why the vendor socket closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectInfo {
    pub status_code: Option<u16>,
    #[serde(default)]
    pub message: String,
}

/// A connection-update event. Any subset of fields may be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionUpdate {
    pub connection: Option<ConnectionState>,
    /// Pairing challenge to render as a QR code.
    pub qr: Option<String>,
    pub last_disconnect: Option<DisconnectInfo>,
    /// The account id of the paired device, reported once the socket opens.
    pub own_jid: Option<String>,
}

impl ConnectionUpdate {
    pub fn qr(challenge: impl Into<String>) -> Self {
        Self {
            qr: Some(challenge.into()),
            ..Self::default()
        }
    }

    pub fn state(state: ConnectionState) -> Self {
        Self {
            connection: Some(state),
            ..Self::default()
        }
    }

    pub fn open(own_jid: impl Into<String>) -> Self {
        Self {
            connection: Some(ConnectionState::Open),
            own_jid: Some(own_jid.into()),
            ..Self::default()
        }
    }

    pub fn closed(status_code: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            connection: Some(ConnectionState::Close),
            last_disconnect: Some(DisconnectInfo {
                status_code,
                message: message.into(),
            }),
            ..Self::default()
        }
    }
}

/// Addressing information of a vendor message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageKey {
    pub remote_jid: String,
    pub from_me: bool,
    pub id: String,
    /// Group sender, when the chat is a group.
    pub participant: Option<String>,
}

/// One inbound message as delivered by the vendor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VendorMessage {
    pub key: MessageKey,
    pub message: Option<VendorMessageContent>,
    /// Seconds since the Unix epoch.
    pub message_timestamp: i64,
    pub push_name: Option<String>,
}

/// Heterogeneous message body: at most one of the fields is expected to be set.
///
/// Unknown kinds (stickers, reactions, protocol messages) deserialize with
/// every field empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VendorMessageContent {
    pub conversation: Option<String>,
    pub extended_text_message: Option<ExtendedTextMessage>,
    pub image_message: Option<MediaMessage>,
    pub audio_message: Option<MediaMessage>,
    pub video_message: Option<MediaMessage>,
    pub document_message: Option<MediaMessage>,
}

/// Text with link preview, quoted reply, or mentions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtendedTextMessage {
    pub text: String,
}

/// Common shape of image, audio, video and document payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaMessage {
    pub url: Option<String>,
    pub mimetype: Option<String>,
    pub caption: Option<String>,
    pub file_name: Option<String>,
    pub file_length: Option<u64>,
}

/// Delivery progress of a previously sent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    ServerAck,
    Delivered,
    Read,
    Played,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageStatusUpdate {
    pub message_id: String,
    pub remote_jid: String,
    pub status: DeliveryStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUpdate {
    pub jid: String,
    /// e.g. `available`, `unavailable`, `composing`.
    pub presence: String,
}

/// Outbound media request passed to the vendor send primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMedia {
    pub url: String,
    pub caption: Option<String>,
    pub media_type: MessageType,
}
