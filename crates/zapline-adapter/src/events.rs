// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed events emitted by a [`ProtocolAdapter`](crate::ProtocolAdapter).

use zapline_core::vendor::{MessageStatusUpdate, PresenceUpdate};
use zapline_core::{DisconnectReason, NormalizedMessage};

/// What happened on the vendor session.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    /// A pairing challenge was issued; status is now `qr_required`.
    QrCode { qr: String },
    /// The socket opened; status is now `connected`.
    Connected { own_jid: Option<String> },
    /// The vendor closed the session. Never emitted for [`disconnect`](crate::ProtocolAdapter::disconnect).
    Closed {
        reason: DisconnectReason,
        should_reconnect: bool,
    },
    Message(NormalizedMessage),
    MessageStatus(MessageStatusUpdate),
    Presence(PresenceUpdate),
}

/// An [`AdapterEvent`] tagged with the session generation that produced it.
///
/// Consumers compare `generation` against
/// [`ProtocolAdapter::generation`](crate::ProtocolAdapter::generation) and
/// drop signals from sessions that have since been replaced or torn down.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterSignal {
    pub generation: u64,
    pub event: AdapterEvent,
}
