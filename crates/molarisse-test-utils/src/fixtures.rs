// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builders for upstream records in the shapes the clinic server emits.

use molarisse_core::wire::{
    RawTimestamp, WireConversation, WireMessage, WirePartnerInfo, WireRole, WireUserInfo,
};

/// A text message with a `"YYYY-MM-DD HH:MM:SS"` send time.
pub fn wire_message(id: i64, sender: i64, recipient: i64, content: &str, sent_at: &str) -> WireMessage {
    WireMessage {
        id: Some(id),
        sender_id: Some(sender),
        recipient_id: Some(recipient),
        content: Some(content.to_string()),
        sent_at: Some(RawTimestamp::from(sent_at)),
        ..WireMessage::default()
    }
}

/// Like [`wire_message`] but already read.
pub fn read_message(id: i64, sender: i64, recipient: i64, content: &str, sent_at: &str) -> WireMessage {
    WireMessage {
        is_read: Some(true),
        read_at: Some(RawTimestamp::from(sent_at)),
        ..wire_message(id, sender, recipient, content, sent_at)
    }
}

/// An inbox row with a `[y, m, d, h, min, s]` tuple timestamp.
pub fn wire_conversation(partner: i64, name: &str, unread: i64, last: [i64; 6]) -> WireConversation {
    WireConversation {
        partner_id: Some(partner),
        partner_name: Some(name.to_string()),
        last_message_content: Some(format!("message from {name}")),
        last_message_time: Some(RawTimestamp::Parts(last.to_vec())),
        unread_count: Some(unread),
        ..WireConversation::default()
    }
}

/// Partner info in the `nom`/`prenom` shape with a string role.
pub fn partner_info(id: i64, prenom: &str, nom: &str, role: &str) -> WirePartnerInfo {
    WirePartnerInfo {
        id: Some(id),
        prenom: Some(prenom.to_string()),
        nom: Some(nom.to_string()),
        role: Some(WireRole::Name(role.to_string())),
        ..WirePartnerInfo::default()
    }
}

/// Partner info carrying only a placeholder name.
pub fn placeholder_partner_info(id: i64) -> WirePartnerInfo {
    WirePartnerInfo {
        id: Some(id),
        name: Some(format!("User {id}")),
        ..WirePartnerInfo::default()
    }
}

/// User info in the `firstName`/`lastName` shape.
pub fn user_info(id: i64, first: &str, last: &str) -> WireUserInfo {
    WireUserInfo {
        id: Some(id),
        first_name: Some(first.to_string()),
        last_name: Some(last.to_string()),
        ..WireUserInfo::default()
    }
}
