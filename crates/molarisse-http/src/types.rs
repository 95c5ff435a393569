// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request and response bodies that exist only on the wire.

use molarisse_core::RawTimestamp;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageBody<'a> {
    pub recipient_id: i64,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub struct EditMessageBody<'a> {
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReadBody {
    pub message_ids: Vec<i64>,
}

/// `GET /messages/{id}/date`. The server answers `{"sentAt": ""}` when it
/// has nothing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageDateResponse {
    pub sent_at: Option<RawTimestamp>,
}

impl MessageDateResponse {
    pub fn into_timestamp(self) -> Option<RawTimestamp> {
        match self.sent_at {
            Some(RawTimestamp::Text(text)) if text.trim().is_empty() => None,
            Some(RawTimestamp::Other(serde_json::Value::Null)) => None,
            other => other,
        }
    }
}

/// Error body shapes the server is known to produce.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiErrorBody {
    pub message: Option<String>,
    pub error: Option<String>,
}

impl ApiErrorBody {
    pub fn describe(&self) -> Option<&str> {
        self.message
            .as_deref()
            .or(self.error.as_deref())
            .filter(|m| !m.trim().is_empty())
    }
}
