// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-view cache of authenticated, cache-busted resource URLs.
//!
//! Profile pictures and message media are fetched by passive elements that
//! cannot carry headers, so the bearer token travels as a `token` query
//! parameter. Each cache instance stamps URLs with one fixed value chosen at
//! construction. A URL is computed once per `(kind, path)` key and then
//! returned unchanged until [`ResourceUrlCache::retry`] evicts it.

use std::sync::LazyLock;

use chrono::Utc;
use dashmap::DashMap;
use molarisse_core::Message;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use strum::{Display, EnumString};
use tracing::debug;

static NUMERIC_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("numeric id pattern is valid"));

/// Characters escaped in query values: everything but `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Which endpoint family a path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ResourceKind {
    Profile,
    Media,
}

/// URL memo for one view session. Cheap to share behind an `Arc`.
pub struct ResourceUrlCache {
    entries: DashMap<String, String>,
    /// `{base_url}{api_prefix}`, without a trailing slash.
    origin: String,
    stamp: i64,
    token: Option<SecretString>,
    default_avatar: String,
    profile_bucket: String,
}

impl std::fmt::Debug for ResourceUrlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceUrlCache")
            .field("origin", &self.origin)
            .field("stamp", &self.stamp)
            .field("entries", &self.entries.len())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ResourceUrlCache {
    /// `origin` is the API root, e.g. `http://clinic:8080/api/v1/api`.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            entries: DashMap::new(),
            origin: origin.into().trim_end_matches('/').to_string(),
            stamp: Utc::now().timestamp_millis(),
            token: None,
            default_avatar: "/assets/images/default-avatar.png".to_string(),
            profile_bucket: "profile-pictures".to_string(),
        }
    }

    /// Build from the loaded configuration.
    pub fn from_config(config: &molarisse_config::MolarisseConfig) -> Self {
        let origin = format!(
            "{}{}",
            config.api.base_url.trim_end_matches('/'),
            config.api.api_prefix
        );
        let mut cache = Self::new(origin)
            .with_default_avatar(config.media.default_avatar.clone())
            .with_profile_bucket(config.media.profile_bucket.clone());
        if let Some(token) = &config.api.auth_token {
            cache = cache.with_token(SecretString::from(token.clone()));
        }
        cache
    }

    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_default_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.default_avatar = avatar.into();
        self
    }

    pub fn with_profile_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.profile_bucket = bucket.into().trim_matches('/').to_string();
        self
    }

    /// Replace the cache-busting stamp. Only meaningful before first use.
    pub fn with_stamp(mut self, stamp: i64) -> Self {
        self.stamp = stamp;
        self
    }

    pub fn stamp(&self) -> i64 {
        self.stamp
    }

    /// The memoized URL for `(kind, path)`, computing it on first use.
    pub fn resolve(&self, kind: ResourceKind, path: &str) -> String {
        let path = path.trim();
        if kind == ResourceKind::Profile && path.is_empty() {
            return self.default_avatar.clone();
        }
        self.entries
            .entry(cache_key(kind, path))
            .or_insert_with(|| self.compute(kind, path))
            .value()
            .clone()
    }

    /// Profile picture URL, or the default avatar when the user has none.
    pub fn profile_url(&self, path: Option<&str>) -> String {
        self.resolve(ResourceKind::Profile, path.unwrap_or_default())
    }

    pub fn media_url(&self, path: &str) -> String {
        self.resolve(ResourceKind::Media, path)
    }

    /// Drop a memoized URL. Returns whether an entry existed.
    pub fn evict(&self, kind: ResourceKind, path: &str) -> bool {
        self.entries.remove(&cache_key(kind, path.trim())).is_some()
    }

    /// Evict and recompute, for a caller that knows the resource must be
    /// fetched again (e.g. audio playback failed).
    ///
    /// The recomputed URL is identical unless the token changed; eviction
    /// matters because consumers compare URLs to decide whether to reload.
    pub fn retry(&self, kind: ResourceKind, path: &str) -> String {
        if self.evict(kind, path) {
            debug!(%kind, path, "evicted resource url for retry");
        }
        self.resolve(kind, path)
    }

    /// Resolve every media and sender picture path referenced by `messages`.
    pub fn prewarm<'a>(&self, messages: impl IntoIterator<Item = &'a Message>) {
        for message in messages {
            if let Some(path) = message.media_path.as_deref().filter(|p| !p.is_empty()) {
                self.media_url(path);
            }
            if let Some(path) = message
                .sender_profile_picture
                .as_deref()
                .filter(|p| !p.is_empty())
            {
                self.profile_url(Some(path));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn compute(&self, kind: ResourceKind, path: &str) -> String {
        match kind {
            ResourceKind::Profile => self.compute_profile(path),
            ResourceKind::Media => self.compute_media(path),
        }
    }

    fn compute_profile(&self, path: &str) -> String {
        if path.starts_with("http") || path.starts_with("/assets") {
            return path.to_string();
        }
        let base = if NUMERIC_ID.is_match(path) {
            format!("{}/users/profile/picture-by-id/{path}", self.origin)
        } else if path.contains('/') {
            format!(
                "{}/users/profile/picture/{}",
                self.origin,
                path.trim_start_matches('/')
            )
        } else {
            format!(
                "{}/users/profile/picture/{}/{path}",
                self.origin, self.profile_bucket
            )
        };
        self.decorate(base)
    }

    fn compute_media(&self, path: &str) -> String {
        if path.starts_with("http") {
            return path.to_string();
        }
        // Slash paths hit the wildcard route; bare filenames hit the
        // single-segment route, which resolves inside the messages bucket.
        let base = format!(
            "{}/messages/media/{}",
            self.origin,
            path.trim_start_matches('/')
        );
        self.decorate(base)
    }

    fn decorate(&self, mut url: String) -> String {
        url.push_str(&format!("?t={}", self.stamp));
        if let Some(token) = &self.token {
            url.push_str("&token=");
            url.extend(utf8_percent_encode(token.expose_secret(), QUERY_VALUE));
        }
        url
    }
}

fn cache_key(kind: ResourceKind, path: &str) -> String {
    format!("{kind}:{path}")
}

/// MIME type for a voice attachment, from its file extension.
pub fn audio_mime_type(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.split('?').next().unwrap_or_default() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        _ => "audio/webm",
    }
}
