// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed lifecycle and message events, fanned out over a broadcast channel.
//!
//! Publishing never blocks. Subscribers that fall behind by more than the
//! channel capacity lose the oldest events (`RecvError::Lagged`).

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use zapline_core::types::InstanceRef;
use zapline_core::vendor::{MessageStatusUpdate, PresenceUpdate};
use zapline_core::{DisconnectReason, InstanceId, MessageType, NormalizedMessage, TenantId};

/// One event about one instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZaplineEvent {
    pub instance_id: InstanceId,
    pub tenant_id: TenantId,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl ZaplineEvent {
    pub fn new(instance: &InstanceRef, payload: EventPayload) -> Self {
        Self {
            instance_id: instance.instance_id.clone(),
            tenant_id: instance.tenant_id.clone(),
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Dotted event name, e.g. `instance.connected`.
    pub fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    InstanceCreated {
        display_name: String,
    },
    InstanceStopped,
    InstanceDeleted,
    InstanceConnected {
        own_jid: Option<String>,
    },
    InstanceDisconnected {
        reason: DisconnectReason,
        will_reconnect: bool,
    },
    InstanceReconnect {
        attempt: u32,
        delay_ms: u64,
    },
    QrCode {
        qr: String,
    },
    MessageReceived {
        message: NormalizedMessage,
    },
    MessageSent {
        to: String,
        external_id: String,
    },
    MediaSent {
        to: String,
        external_id: String,
        media_type: MessageType,
    },
    MessageStatus {
        update: MessageStatusUpdate,
    },
    Presence {
        update: PresenceUpdate,
    },
}

impl EventPayload {
    pub fn event_type(&self) -> &'static str {
        match self {
            EventPayload::InstanceCreated { .. } => "instance.created",
            EventPayload::InstanceStopped => "instance.stopped",
            EventPayload::InstanceDeleted => "instance.deleted",
            EventPayload::InstanceConnected { .. } => "instance.connected",
            EventPayload::InstanceDisconnected { .. } => "instance.disconnected",
            EventPayload::InstanceReconnect { .. } => "instance.reconnect",
            EventPayload::QrCode { .. } => "instance.qr_code",
            EventPayload::MessageReceived { .. } => "message.received",
            EventPayload::MessageSent { .. } => "message.sent",
            EventPayload::MediaSent { .. } => "media.sent",
            EventPayload::MessageStatus { .. } => "message.status",
            EventPayload::Presence { .. } => "presence.update",
        }
    }
}

/// Broadcast fan-out of [`ZaplineEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ZaplineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Returns how many subscribers received the event; 0 without subscribers.
    pub fn publish(&self, event: ZaplineEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Receiver of every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ZaplineEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
