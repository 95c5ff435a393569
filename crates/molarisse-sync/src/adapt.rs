// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire-to-canonical record adapters.
//!
//! Each upstream shape maps to exactly one canonical record here. Records
//! without an identity are dropped with a warning; every other gap is filled
//! with a neutral default.

use molarisse_core::{
    ConversationSummary, MediaKind, Message, MessageId, PartnerId, WireConversation, WireMessage,
};
use tracing::warn;

use crate::display_name::placeholder;
use crate::timestamp;

/// Who is looking at a thread, used when the server omits `isMine`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageContext {
    /// The signed-in user, if known.
    pub me: Option<PartnerId>,
    /// The partner of the thread being adapted, if any.
    pub partner: Option<PartnerId>,
}

impl MessageContext {
    pub fn thread(partner: PartnerId, me: Option<PartnerId>) -> Self {
        Self {
            me,
            partner: Some(partner),
        }
    }
}

pub fn message(wire: WireMessage, ctx: MessageContext) -> Option<Message> {
    let Some(id) = wire.id else {
        warn!("dropping message without id");
        return None;
    };

    let sender_id = PartnerId(wire.sender_id.unwrap_or_default());
    let recipient_id = PartnerId(wire.recipient_id.unwrap_or_default());
    let is_mine = match (wire.is_mine, ctx.me, ctx.partner) {
        (Some(mine), _, _) => mine,
        (None, Some(me), _) => sender_id == me,
        (None, None, Some(partner)) => sender_id != partner,
        (None, None, None) => false,
    };

    let sent_at = timestamp::normalize_or_now(wire.sent_at.as_ref());
    let mut read_at = timestamp::normalize_read_at(wire.read_at.as_ref());
    if read_at.is_none() && wire.is_read == Some(true) {
        // Read without a receipt time: the best lower bound is the send time.
        read_at = Some(sent_at);
    }
    let edited_at = wire
        .edited_at
        .as_ref()
        .and_then(timestamp::try_normalize);

    let media_path = wire.media_path.filter(|p| !p.trim().is_empty());
    let mut media_kind = MediaKind::from_label(wire.media_type.as_deref());
    if media_kind == MediaKind::None && media_path.is_some() {
        warn!(id, "media path without media type, assuming image");
        media_kind = MediaKind::Image;
    }

    Some(Message {
        id: MessageId(id),
        sender_id,
        recipient_id,
        content: wire.content.unwrap_or_default(),
        media_kind,
        media_path,
        sender_profile_picture: wire.sender_profile_picture.filter(|p| !p.trim().is_empty()),
        sent_at,
        read_at,
        is_mine,
        edited: wire.edited.unwrap_or(false) || edited_at.is_some(),
        edited_at,
    })
}

pub fn messages(wire: Vec<WireMessage>, ctx: MessageContext) -> Vec<Message> {
    wire.into_iter().filter_map(|m| message(m, ctx)).collect()
}

pub fn conversation(wire: WireConversation) -> Option<ConversationSummary> {
    let Some(partner) = wire.partner_id.map(PartnerId) else {
        warn!("dropping conversation without partner id");
        return None;
    };

    let unread = wire.unread_count.unwrap_or(0);
    if unread < 0 {
        warn!(%partner, unread, "negative unread count clamped to zero");
    }

    Some(ConversationSummary {
        partner_id: partner,
        partner_name: wire
            .partner_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| placeholder(partner)),
        partner_role: wire
            .partner_role
            .as_ref()
            .and_then(|r| r.label())
            .unwrap_or_default()
            .to_string(),
        profile_picture: wire.profile_picture.filter(|p| !p.trim().is_empty()),
        last_message_content: wire.last_message_content.unwrap_or_default(),
        last_message_media_kind: MediaKind::from_label(wire.last_message_media_type.as_deref()),
        last_message_media_path: wire.last_message_media_path,
        last_message_time: timestamp::normalize_or_now(wire.last_message_time.as_ref()),
        is_last_message_mine: wire.is_last_message_mine.unwrap_or(false),
        unread_count: u32::try_from(unread.max(0)).unwrap_or(u32::MAX),
    })
}

pub fn conversations(wire: Vec<WireConversation>) -> Vec<ConversationSummary> {
    wire.into_iter().filter_map(conversation).collect()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use molarisse_core::{RawTimestamp, WireRole};

    use super::*;

    fn wire(id: i64, sender: i64) -> WireMessage {
        WireMessage {
            id: Some(id),
            sender_id: Some(sender),
            recipient_id: Some(if sender == 1 { 2 } else { 1 }),
            content: Some(format!("message {id}")),
            sent_at: Some(RawTimestamp::from("2025-03-01T09:00:00")),
            ..Default::default()
        }
    }

    #[test]
    fn message_without_id_is_dropped() {
        let mut w = wire(1, 1);
        w.id = None;
        assert!(message(w, MessageContext::default()).is_none());
    }

    #[test]
    fn is_mine_prefers_server_flag_then_context() {
        let mut flagged = wire(1, 2);
        flagged.is_mine = Some(true);
        assert!(message(flagged, MessageContext::thread(PartnerId(2), None)).unwrap().is_mine);

        let by_me = message(wire(2, 1), MessageContext::thread(PartnerId(2), Some(PartnerId(1))));
        assert!(by_me.unwrap().is_mine);

        let by_partner = message(wire(3, 2), MessageContext::thread(PartnerId(2), None));
        assert!(!by_partner.unwrap().is_mine);
    }

    #[test]
    fn read_flag_without_receipt_uses_sent_at() {
        let mut w = wire(1, 2);
        w.is_read = Some(true);
        let m = message(w, MessageContext::default()).unwrap();
        assert_eq!(m.read_at, Some(m.sent_at));
        assert_eq!(m.sent_at, Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap());
    }

    #[test]
    fn edited_at_implies_edited() {
        let mut w = wire(1, 1);
        w.edited_at = Some(RawTimestamp::from("2025-03-01T10:00:00"));
        let m = message(w, MessageContext::default()).unwrap();
        assert!(m.edited);
        assert!(m.edited_at.is_some());
    }

    #[test]
    fn media_labels_are_mapped() {
        let mut w = wire(1, 1);
        w.media_type = Some("VOICE".into());
        w.media_path = Some("voice_1.webm".into());
        let m = message(w, MessageContext::default()).unwrap();
        assert_eq!(m.media_kind, MediaKind::Voice);
        assert!(m.has_media());

        let mut untyped = wire(2, 1);
        untyped.media_path = Some("photo.jpg".into());
        assert_eq!(
            message(untyped, MessageContext::default()).unwrap().media_kind,
            MediaKind::Image
        );
    }

    #[test]
    fn conversation_defaults_and_clamping() {
        let c = conversation(WireConversation {
            partner_id: Some(8),
            partner_role: Some(WireRole::Entity {
                nom: Some("DOCTOR".into()),
                name: None,
            }),
            unread_count: Some(-3),
            last_message_time: Some(RawTimestamp::Millis(1_700_000_000_000)),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(c.partner_name, "Utilisateur 8");
        assert_eq!(c.partner_role, "DOCTOR");
        assert_eq!(c.unread_count, 0);
        assert_eq!(c.last_message_time.timestamp(), 1_700_000_000);
        assert_eq!(c.last_message_media_kind, MediaKind::None);
    }

    #[test]
    fn conversation_without_partner_is_dropped() {
        assert!(conversation(WireConversation::default()).is_none());
        assert!(conversations(vec![WireConversation::default()]).is_empty());
    }
}
