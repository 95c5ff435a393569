// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Molarisse messaging engine.
//!
//! This crate provides the error type, the canonical message and conversation
//! records, the upstream wire shapes they are adapted from, and the adapter
//! traits the synchronizers are written against. It performs no I/O.

pub mod error;
pub mod traits;
pub mod types;
pub mod wire;

// Re-export key items at crate root for ergonomic imports.
pub use error::MolarisseError;
pub use types::{
    ConversationSummary, HealthStatus, MediaKind, MediaUpload, Message, MessageId,
    PartnerId, PartnerProfile, PartnerRole,
};
pub use wire::{
    RawTimestamp, WireConversation, WireMessage, WirePartnerInfo, WireRole, WireUserInfo,
};

pub use traits::{MessagingTransport, PluginAdapter, SessionStore};

/// Convenience result alias used across the workspace.
pub type Result<T, E = MolarisseError> = std::result::Result<T, E>;
