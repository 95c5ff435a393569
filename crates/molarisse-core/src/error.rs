// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Molarisse messaging engine.

use thiserror::Error;

/// The primary error type used across the transport traits and the synchronizers.
///
/// Malformed upstream data never surfaces here: timestamps and names recover
/// locally. Only transport failures and rejected preconditions do.
#[derive(Debug, Error)]
pub enum MolarisseError {
    /// Configuration errors (invalid TOML, bad URLs, unusable header values).
    #[error("configuration error: {0}")]
    Config(String),

    /// The request never produced a response (connection refused, DNS, TLS).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The server answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body could not be decoded into the expected shape.
    #[error("decode error: {message}")]
    Decode {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The action was rejected locally before any network call.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// A referenced entity is not known locally.
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MolarisseError {
    /// Whether this error came from talking to the remote store, as opposed to
    /// a local rejection.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            MolarisseError::Transport { .. }
                | MolarisseError::Status { .. }
                | MolarisseError::Decode { .. }
                | MolarisseError::Timeout { .. }
        )
    }

    /// Shorthand for a transport failure without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        MolarisseError::Transport {
            message: message.into(),
            source: None,
        }
    }
}
