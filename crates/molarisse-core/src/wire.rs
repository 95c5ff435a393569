// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Upstream record shapes as the clinic server emits them.
//!
//! The server is inconsistent: timestamps arrive as strings, epoch numbers or
//! component arrays, names come under several keys, and roles are either a
//! string or an object. These structs accept all of that and nothing else
//! looks at them; `molarisse_sync::adapt` turns them into canonical records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A timestamp in any encoding the server has been seen to use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Epoch milliseconds.
    Millis(i64),
    /// `[year, month (1-based), day, hour?, minute?, second?, nanos?]`.
    Parts(Vec<i64>),
    /// ISO-8601 with or without zone, or `YYYY-MM-DD HH:MM:SS[.ffffff]`.
    Text(String),
    /// Already resolved in-process.
    Instant(DateTime<Utc>),
    /// Anything else (floats, objects); always falls back.
    Other(serde_json::Value),
}

impl From<DateTime<Utc>> for RawTimestamp {
    fn from(value: DateTime<Utc>) -> Self {
        RawTimestamp::Instant(value)
    }
}

impl From<&str> for RawTimestamp {
    fn from(value: &str) -> Self {
        RawTimestamp::Text(value.to_string())
    }
}

impl From<Vec<i64>> for RawTimestamp {
    fn from(value: Vec<i64>) -> Self {
        RawTimestamp::Parts(value)
    }
}

/// Role as a bare string (`"DOCTOR"`) or a role entity (`{"nom": "doctor"}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireRole {
    Name(String),
    Entity {
        #[serde(default)]
        nom: Option<String>,
        #[serde(default)]
        name: Option<String>,
    },
}

impl WireRole {
    pub fn label(&self) -> Option<&str> {
        match self {
            WireRole::Name(s) => Some(s.as_str()),
            WireRole::Entity { nom, name } => nom.as_deref().or(name.as_deref()),
        }
    }
}

/// A message as returned by the thread, send and edit endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireMessage {
    pub id: Option<i64>,
    pub sender_id: Option<i64>,
    pub sender_name: Option<String>,
    pub sender_profile_picture: Option<String>,
    pub recipient_id: Option<i64>,
    pub recipient_name: Option<String>,
    pub recipient_profile_picture: Option<String>,
    pub content: Option<String>,
    pub media_type: Option<String>,
    pub media_path: Option<String>,
    pub sent_at: Option<RawTimestamp>,
    pub read_at: Option<RawTimestamp>,
    #[serde(alias = "read")]
    pub is_read: Option<bool>,
    #[serde(alias = "mine")]
    pub is_mine: Option<bool>,
    pub edited: Option<bool>,
    pub edited_at: Option<RawTimestamp>,
}

/// An inbox row as returned by the conversation list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireConversation {
    pub partner_id: Option<i64>,
    pub partner_name: Option<String>,
    pub partner_role: Option<WireRole>,
    pub profile_picture: Option<String>,
    pub last_message_content: Option<String>,
    pub last_message_media_type: Option<String>,
    pub last_message_media_path: Option<String>,
    pub last_message_time: Option<RawTimestamp>,
    #[serde(alias = "lastMessageMine")]
    pub is_last_message_mine: Option<bool>,
    pub unread_count: Option<i64>,
}

/// Partner metadata from the profile endpoint. Any subset of the name keys
/// may be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WirePartnerInfo {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub nom: Option<String>,
    pub prenom: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub partner_name: Option<String>,
    pub username: Option<String>,
    pub role: Option<WireRole>,
    pub profile_picture: Option<String>,
    pub profile_picture_path: Option<String>,
    pub status: Option<String>,
}

/// Plain user record, used when the partner endpoint has nothing usable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireUserInfo {
    pub id: Option<i64>,
    pub nom: Option<String>,
    pub prenom: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<WireRole>,
    pub profile_picture_path: Option<String>,
}
