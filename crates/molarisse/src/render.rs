// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plain-text rendering of inbox rows, thread messages and engine events.

use chrono::{DateTime, Local, Utc};
use molarisse_core::{ConversationSummary, HealthStatus, MediaKind, Message, PartnerProfile};
use molarisse_sync::display_name::{classify_role, display_name, role_label};
use molarisse_sync::{NoticeLevel, ScrollDirective, SyncEvent};

/// Longest message preview shown in the inbox.
const PREVIEW_CHARS: usize = 60;

pub fn local_time(instant: DateTime<Utc>) -> String {
    instant.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn media_tag(kind: MediaKind) -> Option<&'static str> {
    match kind {
        MediaKind::None => None,
        MediaKind::Image => Some("[image]"),
        MediaKind::Voice => Some("[voice message]"),
    }
}

fn preview(content: &str, kind: MediaKind) -> String {
    let text = content.trim();
    let text = if text.chars().count() > PREVIEW_CHARS {
        let cut: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    };
    match (media_tag(kind), text.is_empty()) {
        (Some(tag), true) => tag.to_string(),
        (Some(tag), false) => format!("{tag} {text}"),
        (None, _) => text,
    }
}

/// One inbox line: unread marker, name, role, time, preview.
pub fn summary_line(summary: &ConversationSummary) -> String {
    let role = classify_role(Some(&summary.partner_role));
    let unread = if summary.unread_count > 0 {
        format!("({:>2})", summary.unread_count)
    } else {
        "    ".to_string()
    };
    let mine = if summary.is_last_message_mine { "You: " } else { "" };
    format!(
        "{unread} #{:<5} {} [{}]  {}  {mine}{}",
        summary.partner_id.0,
        display_name(&summary.partner_name, role),
        role_label(role, Some(&summary.partner_role)),
        local_time(summary.last_message_time),
        preview(&summary.last_message_content, summary.last_message_media_kind),
    )
}

pub fn profile_header(profile: &PartnerProfile) -> String {
    format!(
        "{} [{}]",
        display_name(&profile.name, profile.role),
        profile.role_label
    )
}

/// One thread line. `partner` is the name shown for incoming messages.
pub fn message_line(message: &Message, partner: &str) -> String {
    let who = if message.is_mine { "You" } else { partner };
    let mut line = format!(
        "[{}] {who}: {}",
        local_time(message.sent_at),
        preview_full(message)
    );
    if message.edited {
        line.push_str(" (edited)");
    }
    if message.is_mine && message.is_read() {
        line.push_str(" ✓✓");
    }
    line
}

fn preview_full(message: &Message) -> String {
    let text = message.content.trim();
    match media_tag(message.media_kind) {
        Some(tag) if text.is_empty() => tag.to_string(),
        Some(tag) => format!("{tag} {text}"),
        None => text.to_string(),
    }
}

/// Status line for an engine event, or `None` for events not worth printing.
pub fn event_line(event: &SyncEvent) -> Option<String> {
    match event {
        SyncEvent::ConversationsUpdated { len } => Some(format!("inbox: {len} conversations")),
        SyncEvent::ThreadUpdated { partner, len } => {
            Some(format!("thread #{partner}: {len} messages"))
        }
        SyncEvent::UnreadCount(count) => Some(format!("unread: {count}")),
        SyncEvent::PartnerResolved { partner, name } => Some(format!("#{partner} is {name}")),
        SyncEvent::Scroll(ScrollDirective::ShowUnreadAffordance) => {
            Some("new messages below".to_string())
        }
        SyncEvent::Scroll(ScrollDirective::ScrollToBottom) => None,
        SyncEvent::SendSettled { message: Some(id), .. } => Some(format!("sent message {id}")),
        SyncEvent::SendSettled { message: None, .. } => None,
        SyncEvent::Notice(notice) => Some(match notice.level {
            NoticeLevel::Error => format!("error: {}", notice.message),
            NoticeLevel::Info => notice.message.clone(),
        }),
    }
}

pub fn health_line(health: &HealthStatus) -> String {
    match health {
        HealthStatus::Healthy => "ok".to_string(),
        HealthStatus::Degraded(reason) => format!("degraded ({reason})"),
        HealthStatus::Unhealthy(reason) => format!("unreachable ({reason})"),
    }
}

/// MIME type for an image attachment, from its file extension.
pub fn image_mime_type(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        _ => "image/jpeg",
    }
}
