// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Molarisse configuration.
///
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MolarisseConfig {
    /// Clinic REST API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Polling cadences and event fan-out.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Avatar and media URL settings.
    #[serde(default)]
    pub media: MediaConfig,

    /// Who the client is acting as and where session state lives.
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

/// Clinic REST API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Scheme and host of the clinic server.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path prefix shared by every endpoint.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Bearer token. `None` sends unauthenticated requests.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Per-request timeout applied by the HTTP transport.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_prefix: default_api_prefix(),
            auth_token: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_api_prefix() -> String {
    "/api/v1/api".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Polling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Interval between background refreshes of the open thread.
    #[serde(default = "default_refresh_secs")]
    pub thread_refresh_secs: u64,

    /// Interval between background refreshes of the inbox.
    #[serde(default = "default_refresh_secs")]
    pub conversation_refresh_secs: u64,

    /// Interval between unread badge refreshes.
    #[serde(default = "default_unread_refresh_secs")]
    pub unread_refresh_secs: u64,

    /// Capacity of the engine event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            thread_refresh_secs: default_refresh_secs(),
            conversation_refresh_secs: default_refresh_secs(),
            unread_refresh_secs: default_unread_refresh_secs(),
            event_buffer: default_event_buffer(),
        }
    }
}

fn default_refresh_secs() -> u64 {
    30
}

fn default_unread_refresh_secs() -> u64 {
    60
}

fn default_event_buffer() -> usize {
    64
}

/// Media URL configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MediaConfig {
    /// Returned for users without a profile picture.
    #[serde(default = "default_avatar")]
    pub default_avatar: String,

    /// Storage bucket prepended to bare profile picture filenames.
    #[serde(default = "default_profile_bucket")]
    pub profile_bucket: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            default_avatar: default_avatar(),
            profile_bucket: default_profile_bucket(),
        }
    }
}

fn default_avatar() -> String {
    "/assets/images/default-avatar.png".to_string()
}

fn default_profile_bucket() -> String {
    "profile-pictures".to_string()
}

/// Session configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Id of the signed-in user. Only needed when the server omits `isMine`.
    #[serde(default)]
    pub current_user_id: Option<i64>,

    /// File backing the partner name cache. `None` keeps names in memory.
    #[serde(default)]
    pub store_path: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
