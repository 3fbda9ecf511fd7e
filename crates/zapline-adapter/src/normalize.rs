// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filtering and normalization of inbound vendor messages.
//!
//! Vendor payloads are heterogeneous: one optional field per message kind.
//! [`extract`] picks the first known shape, in a fixed precedence order, and
//! everything else is skipped.

use chrono::{DateTime, TimeZone, Utc};

use zapline_core::types::MediaInfo;
use zapline_core::vendor::{MediaMessage, STATUS_BROADCAST_JID, VendorMessage};
use zapline_core::{MessageType, NormalizedMessage};

/// Why an inbound payload produced no [`NormalizedMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    /// Echo of a message this account sent.
    FromMe,
    StatusBroadcast,
    /// Sticker, reaction, protocol message, or an empty body.
    Unsupported,
}

/// The recognized shape of an inbound payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted<'a> {
    Text(String),
    Media {
        message_type: MessageType,
        payload: &'a MediaMessage,
    },
}

impl Extracted<'_> {
    pub fn message_type(&self) -> MessageType {
        match self {
            Extracted::Text(_) => MessageType::Text,
            Extracted::Media { message_type, .. } => *message_type,
        }
    }
}

/// Classify an inbound payload, or say why it is dropped.
pub fn extract(message: &VendorMessage) -> Result<Extracted<'_>, Skip> {
    if message.key.from_me {
        return Err(Skip::FromMe);
    }
    if message.key.remote_jid == STATUS_BROADCAST_JID {
        return Err(Skip::StatusBroadcast);
    }
    let content = message.message.as_ref().ok_or(Skip::Unsupported)?;

    if let Some(text) = &content.conversation {
        return Ok(Extracted::Text(text.clone()));
    }
    if let Some(extended) = &content.extended_text_message {
        return Ok(Extracted::Text(extended.text.clone()));
    }

    let media = [
        (MessageType::Image, &content.image_message),
        (MessageType::Audio, &content.audio_message),
        (MessageType::Video, &content.video_message),
        (MessageType::Document, &content.document_message),
    ];
    media
        .into_iter()
        .find_map(|(message_type, payload)| {
            payload.as_ref().map(|payload| Extracted::Media {
                message_type,
                payload,
            })
        })
        .ok_or(Skip::Unsupported)
}

/// Placeholder text for media that carries neither caption nor file name.
pub fn placeholder(message_type: MessageType) -> &'static str {
    match message_type {
        MessageType::Text => "",
        MessageType::Image => "[image]",
        MessageType::Audio => "[audio]",
        MessageType::Video => "[video]",
        MessageType::Document => "[document]",
    }
}

/// Text content of a media message: caption, else file name, else placeholder.
pub fn media_content(message_type: MessageType, payload: &MediaMessage) -> String {
    [payload.caption.as_deref(), payload.file_name.as_deref()]
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| placeholder(message_type).to_string())
}

/// Default MIME type per media kind, used when the vendor omits one.
pub fn default_mime(message_type: MessageType) -> &'static str {
    match message_type {
        MessageType::Image => "image/jpeg",
        MessageType::Audio => "audio/ogg",
        MessageType::Video => "video/mp4",
        MessageType::Text | MessageType::Document => "application/octet-stream",
    }
}

/// Vendor timestamps are seconds since the epoch; zero or out of range means "now".
pub fn timestamp_from_secs(secs: i64) -> DateTime<Utc> {
    if secs <= 0 {
        return Utc::now();
    }
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}

/// Assemble the canonical message. `to` is the receiving account.
pub fn normalize(
    message: &VendorMessage,
    extracted: &Extracted<'_>,
    to: &str,
    media: Option<MediaInfo>,
) -> NormalizedMessage {
    let content = match extracted {
        Extracted::Text(text) => text.clone(),
        Extracted::Media {
            message_type,
            payload,
        } => media_content(*message_type, payload),
    };

    NormalizedMessage {
        id: message.key.id.clone(),
        from: message.key.remote_jid.clone(),
        to: to.to_string(),
        content,
        message_type: extracted.message_type(),
        timestamp: timestamp_from_secs(message.message_timestamp),
        push_name: message.push_name.clone().filter(|n| !n.is_empty()),
        media,
    }
}

#[cfg(test)]
mod tests {
    use zapline_core::vendor::{ExtendedTextMessage, MessageKey, VendorMessageContent};

    use super::*;

    fn inbound(content: VendorMessageContent) -> VendorMessage {
        VendorMessage {
            key: MessageKey {
                remote_jid: "5511999999999@s.whatsapp.net".into(),
                from_me: false,
                id: "ABC123".into(),
                participant: None,
            },
            message: Some(content),
            message_timestamp: 1_700_000_000,
            push_name: Some("Ana".into()),
        }
    }

    #[test]
    fn plain_text_is_extracted() {
        let msg = inbound(VendorMessageContent {
            conversation: Some("hello".into()),
            ..Default::default()
        });
        let extracted = extract(&msg).unwrap();
        let normalized = normalize(&msg, &extracted, "me@s.whatsapp.net", None);

        assert_eq!(normalized.id, "ABC123");
        assert_eq!(normalized.from, "5511999999999@s.whatsapp.net");
        assert_eq!(normalized.to, "me@s.whatsapp.net");
        assert_eq!(normalized.content, "hello");
        assert_eq!(normalized.message_type, MessageType::Text);
        assert_eq!(normalized.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(normalized.push_name.as_deref(), Some("Ana"));
        assert!(normalized.media.is_none());
    }

    #[test]
    fn extended_text_is_extracted() {
        let msg = inbound(VendorMessageContent {
            extended_text_message: Some(ExtendedTextMessage {
                text: "see https://example.com".into(),
            }),
            ..Default::default()
        });
        assert_eq!(
            extract(&msg).unwrap(),
            Extracted::Text("see https://example.com".into())
        );
    }

    #[test]
    fn echoes_and_status_broadcasts_are_dropped() {
        let mut echo = inbound(VendorMessageContent {
            conversation: Some("mine".into()),
            ..Default::default()
        });
        echo.key.from_me = true;
        assert_eq!(extract(&echo), Err(Skip::FromMe));

        let mut status = inbound(VendorMessageContent {
            conversation: Some("story".into()),
            ..Default::default()
        });
        status.key.remote_jid = STATUS_BROADCAST_JID.into();
        assert_eq!(extract(&status), Err(Skip::StatusBroadcast));
    }

    #[test]
    fn unknown_shapes_are_unsupported() {
        assert_eq!(
            extract(&inbound(VendorMessageContent::default())),
            Err(Skip::Unsupported)
        );
        let mut no_body = inbound(VendorMessageContent::default());
        no_body.message = None;
        assert_eq!(extract(&no_body), Err(Skip::Unsupported));
    }

    #[test]
    fn media_content_falls_back_in_order() {
        let captioned = MediaMessage {
            caption: Some("look".into()),
            file_name: Some("a.jpg".into()),
            ..Default::default()
        };
        assert_eq!(media_content(MessageType::Image, &captioned), "look");

        let named = MediaMessage {
            file_name: Some("report.pdf".into()),
            ..Default::default()
        };
        assert_eq!(media_content(MessageType::Document, &named), "report.pdf");

        for (kind, expected) in [
            (MessageType::Image, "[image]"),
            (MessageType::Audio, "[audio]"),
            (MessageType::Video, "[video]"),
            (MessageType::Document, "[document]"),
        ] {
            assert_eq!(media_content(kind, &MediaMessage::default()), expected);
        }
    }

    #[test]
    fn media_kind_is_detected() {
        let msg = inbound(VendorMessageContent {
            audio_message: Some(MediaMessage {
                mimetype: Some("audio/ogg; codecs=opus".into()),
                ..Default::default()
            }),
            ..Default::default()
        });
        let extracted = extract(&msg).unwrap();
        assert_eq!(extracted.message_type(), MessageType::Audio);
        let normalized = normalize(&msg, &extracted, "me", None);
        assert_eq!(normalized.content, "[audio]");
    }

    #[test]
    fn zero_timestamp_uses_now() {
        let before = Utc::now();
        assert!(timestamp_from_secs(0) >= before);
    }
}
