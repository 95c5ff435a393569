// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport adapter trait for the clinic messaging REST API.

use async_trait::async_trait;

use crate::error::MolarisseError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{MediaUpload, MessageId, PartnerId};
use crate::wire::{RawTimestamp, WireConversation, WireMessage, WirePartnerInfo, WireUserInfo};

/// The network calls the synchronizers depend on.
///
/// Implementations own authentication and timeouts; the engine applies none
/// of its own. Responses are returned in their upstream shape and adapted by
/// the caller.
#[async_trait]
pub trait MessagingTransport: PluginAdapter {
    /// All inbox summaries for the authenticated user.
    async fn list_conversations(&self) -> Result<Vec<WireConversation>, MolarisseError>;

    /// The full thread with one partner. Pages may overlap.
    async fn list_messages(&self, partner: PartnerId) -> Result<Vec<WireMessage>, MolarisseError>;

    /// The authoritative `sentAt` of one message, `None` if the server has
    /// nothing usable.
    async fn message_original_date(
        &self,
        id: MessageId,
    ) -> Result<Option<RawTimestamp>, MolarisseError>;

    /// Send a text message.
    async fn send_message(
        &self,
        recipient: PartnerId,
        content: &str,
    ) -> Result<WireMessage, MolarisseError>;

    /// Send an image or voice message as a multipart form.
    async fn send_media_message(&self, upload: MediaUpload) -> Result<WireMessage, MolarisseError>;

    /// Mark one or many messages read.
    async fn mark_read(&self, ids: &[MessageId]) -> Result<(), MolarisseError>;

    /// Mark every message from `partner` read.
    async fn mark_conversation_read(&self, partner: PartnerId) -> Result<(), MolarisseError>;

    /// Inbox-wide unread counter.
    async fn unread_count(&self) -> Result<u64, MolarisseError>;

    /// Replace the content of one of the caller's messages.
    async fn edit_message(
        &self,
        id: MessageId,
        content: &str,
    ) -> Result<WireMessage, MolarisseError>;

    /// Delete one of the caller's messages.
    async fn delete_message(&self, id: MessageId) -> Result<(), MolarisseError>;

    /// Primary partner lookup.
    async fn partner_info(&self, partner: PartnerId) -> Result<WirePartnerInfo, MolarisseError>;

    /// Secondary user lookup, used when the partner lookup yields no name.
    async fn user_info(&self, user: PartnerId) -> Result<WireUserInfo, MolarisseError>;
}
