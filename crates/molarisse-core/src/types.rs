// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical records shared by the synchronizers and adapters.
//!
//! Every upstream shape is mapped to exactly one of these records at the
//! boundary (see `molarisse_sync::adapt`); nothing past that point inspects
//! optional wire fields.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Server-assigned message identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a user on the other side of a one-to-one conversation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PartnerId(pub i64);

impl fmt::Display for PartnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Attachment carried by a message.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum MediaKind {
    #[default]
    None,
    Image,
    Voice,
}

impl MediaKind {
    /// Parse the loosely typed upstream label. Unknown or empty labels mean
    /// "no attachment".
    pub fn from_label(label: Option<&str>) -> Self {
        label
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }
}

/// One message of a thread, after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: PartnerId,
    pub recipient_id: PartnerId,
    pub content: String,
    pub media_kind: MediaKind,
    pub media_path: Option<String>,
    pub sender_profile_picture: Option<String>,
    /// Assigned once by the server; truncated to whole seconds.
    pub sent_at: DateTime<Utc>,
    /// `None` until the recipient reads the message. Never reverts.
    pub read_at: Option<DateTime<Utc>>,
    pub is_mine: bool,
    pub edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }

    pub fn has_media(&self) -> bool {
        self.media_kind != MediaKind::None
    }
}

/// Inbox row for one partner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub partner_id: PartnerId,
    pub partner_name: String,
    /// Raw role label as reported by the server.
    pub partner_role: String,
    pub profile_picture: Option<String>,
    pub last_message_content: String,
    pub last_message_media_kind: MediaKind,
    pub last_message_media_path: Option<String>,
    pub last_message_time: DateTime<Utc>,
    pub is_last_message_mine: bool,
    pub unread_count: u32,
}

/// Display classification of a user's role. Never used for access control.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PartnerRole {
    Doctor,
    Patient,
    Secretary,
    Admin,
    #[default]
    Other,
}

/// Metadata about the partner of the open thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerProfile {
    pub id: PartnerId,
    /// Best known name; may be a placeholder until a lookup succeeds.
    pub name: String,
    pub role: PartnerRole,
    /// Localized badge text for the role.
    pub role_label: String,
    pub profile_picture: Option<String>,
}

/// A media-bearing send, submitted as a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUpload {
    pub recipient: PartnerId,
    pub content: String,
    pub kind: MediaKind,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}
