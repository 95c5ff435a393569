// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock messaging transport for deterministic testing.
//!
//! `MockTransport` implements `MessagingTransport` over in-memory scripted
//! state. Sends, edits and deletes mutate that state the way the clinic
//! server would, so a re-fetch observes them. Any operation can be made to
//! fail, and thread fetches can be held open to stage stale responses.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use strum::Display;
use tokio::sync::{Mutex, Notify};

use molarisse_core::traits::adapter::PluginAdapter;
use molarisse_core::traits::transport::MessagingTransport;
use molarisse_core::types::{HealthStatus, MediaUpload, MessageId, PartnerId};
use molarisse_core::wire::{
    RawTimestamp, WireConversation, WireMessage, WirePartnerInfo, WireUserInfo,
};
use molarisse_core::MolarisseError;

/// Transport operations, for failure injection and call assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    ListConversations,
    ListMessages,
    MessageOriginalDate,
    SendMessage,
    SendMediaMessage,
    MarkRead,
    MarkConversationRead,
    UnreadCount,
    EditMessage,
    DeleteMessage,
    PartnerInfo,
    UserInfo,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    ListConversations,
    ListMessages(PartnerId),
    MessageOriginalDate(MessageId),
    SendMessage { recipient: PartnerId, content: String },
    SendMediaMessage { recipient: PartnerId, file_name: String },
    MarkRead(Vec<MessageId>),
    MarkConversationRead(PartnerId),
    UnreadCount,
    EditMessage { id: MessageId, content: String },
    DeleteMessage(MessageId),
    PartnerInfo(PartnerId),
    UserInfo(PartnerId),
}

impl TransportCall {
    pub fn operation(&self) -> Operation {
        match self {
            TransportCall::ListConversations => Operation::ListConversations,
            TransportCall::ListMessages(_) => Operation::ListMessages,
            TransportCall::MessageOriginalDate(_) => Operation::MessageOriginalDate,
            TransportCall::SendMessage { .. } => Operation::SendMessage,
            TransportCall::SendMediaMessage { .. } => Operation::SendMediaMessage,
            TransportCall::MarkRead(_) => Operation::MarkRead,
            TransportCall::MarkConversationRead(_) => Operation::MarkConversationRead,
            TransportCall::UnreadCount => Operation::UnreadCount,
            TransportCall::EditMessage { .. } => Operation::EditMessage,
            TransportCall::DeleteMessage(_) => Operation::DeleteMessage,
            TransportCall::PartnerInfo(_) => Operation::PartnerInfo,
            TransportCall::UserInfo(_) => Operation::UserInfo,
        }
    }
}

#[derive(Default)]
struct State {
    conversations: Vec<WireConversation>,
    threads: HashMap<PartnerId, Vec<WireMessage>>,
    partners: HashMap<PartnerId, WirePartnerInfo>,
    users: HashMap<PartnerId, WireUserInfo>,
    original_dates: HashMap<MessageId, RawTimestamp>,
    unread: u64,
    failing: HashSet<Operation>,
    calls: Vec<TransportCall>,
    next_id: i64,
}

/// A scripted clinic server.
///
/// `me` is the signed-in user: sent messages carry it as sender.
pub struct MockTransport {
    me: PartnerId,
    state: Arc<Mutex<State>>,
    gates: Arc<Mutex<HashMap<PartnerId, Arc<Notify>>>>,
}

impl MockTransport {
    /// Create an empty server acting as user `1`.
    pub fn new() -> Self {
        Self::as_user(PartnerId(1))
    }

    pub fn as_user(me: PartnerId) -> Self {
        Self {
            me,
            state: Arc::new(Mutex::new(State {
                next_id: 1000,
                ..State::default()
            })),
            gates: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn me(&self) -> PartnerId {
        self.me
    }

    /// Replace the inbox returned by `list_conversations()`.
    pub async fn set_conversations(&self, conversations: Vec<WireConversation>) {
        self.state.lock().await.conversations = conversations;
    }

    /// Replace the thread returned by `list_messages(partner)`.
    pub async fn set_messages(&self, partner: PartnerId, messages: Vec<WireMessage>) {
        self.state.lock().await.threads.insert(partner, messages);
    }

    pub async fn push_message(&self, partner: PartnerId, message: WireMessage) {
        self.state
            .lock()
            .await
            .threads
            .entry(partner)
            .or_default()
            .push(message);
    }

    pub async fn set_partner_info(&self, partner: PartnerId, info: WirePartnerInfo) {
        self.state.lock().await.partners.insert(partner, info);
    }

    pub async fn set_user_info(&self, user: PartnerId, info: WireUserInfo) {
        self.state.lock().await.users.insert(user, info);
    }

    pub async fn set_original_date(&self, id: MessageId, raw: RawTimestamp) {
        self.state.lock().await.original_dates.insert(id, raw);
    }

    pub async fn set_unread_count(&self, count: u64) {
        self.state.lock().await.unread = count;
    }

    /// Make every later call to `operation` fail with a transport error.
    pub async fn fail(&self, operation: Operation) {
        self.state.lock().await.failing.insert(operation);
    }

    pub async fn recover(&self, operation: Operation) {
        self.state.lock().await.failing.remove(&operation);
    }

    /// Hold `list_messages(partner)` until [`release_messages`](Self::release_messages).
    ///
    /// The response reflects the state at release time, not call time.
    pub async fn hold_messages(&self, partner: PartnerId) {
        self.gates
            .lock()
            .await
            .insert(partner, Arc::new(Notify::new()));
    }

    pub async fn release_messages(&self, partner: PartnerId) {
        if let Some(gate) = self.gates.lock().await.remove(&partner) {
            gate.notify_one();
        }
    }

    /// Every call made so far, in order.
    pub async fn calls(&self) -> Vec<TransportCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn call_count(&self, operation: Operation) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    /// Current server-side copy of a thread.
    pub async fn stored_messages(&self, partner: PartnerId) -> Vec<WireMessage> {
        self.state
            .lock()
            .await
            .threads
            .get(&partner)
            .cloned()
            .unwrap_or_default()
    }

    /// Record the call and fail if the operation is scripted to.
    async fn enter(&self, call: TransportCall) -> Result<(), MolarisseError> {
        let operation = call.operation();
        let mut state = self.state.lock().await;
        state.calls.push(call);
        if state.failing.contains(&operation) {
            return Err(MolarisseError::transport(format!("mock {operation} failure")));
        }
        Ok(())
    }

    async fn accept(&self, recipient: PartnerId, mut message: WireMessage) -> WireMessage {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        message.id = Some(state.next_id);
        message.sender_id = Some(self.me.0);
        message.recipient_id = Some(recipient.0);
        message.sent_at = Some(RawTimestamp::Instant(Utc::now().trunc_subsecs(0)));
        message.is_mine = Some(true);
        message.is_read = Some(false);
        state
            .threads
            .entry(recipient)
            .or_default()
            .push(message.clone());
        message
    }

    fn not_found(kind: &str, id: impl ToString) -> MolarisseError {
        MolarisseError::Status {
            status: 404,
            message: format!("{kind} {} not found", id.to_string()),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    /// Healthy unless `unread_count` has been told to fail.
    async fn health_check(&self) -> Result<HealthStatus, MolarisseError> {
        if self.state.lock().await.failing.contains(&Operation::UnreadCount) {
            return Ok(HealthStatus::Unhealthy("mock unread_count failure".to_string()));
        }
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl MessagingTransport for MockTransport {
    async fn list_conversations(&self) -> Result<Vec<WireConversation>, MolarisseError> {
        self.enter(TransportCall::ListConversations).await?;
        Ok(self.state.lock().await.conversations.clone())
    }

    async fn list_messages(&self, partner: PartnerId) -> Result<Vec<WireMessage>, MolarisseError> {
        self.enter(TransportCall::ListMessages(partner)).await?;
        let gate = self.gates.lock().await.get(&partner).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(self
            .state
            .lock()
            .await
            .threads
            .get(&partner)
            .cloned()
            .unwrap_or_default())
    }

    async fn message_original_date(
        &self,
        id: MessageId,
    ) -> Result<Option<RawTimestamp>, MolarisseError> {
        self.enter(TransportCall::MessageOriginalDate(id)).await?;
        Ok(self.state.lock().await.original_dates.get(&id).cloned())
    }

    async fn send_message(
        &self,
        recipient: PartnerId,
        content: &str,
    ) -> Result<WireMessage, MolarisseError> {
        self.enter(TransportCall::SendMessage {
            recipient,
            content: content.to_string(),
        })
        .await?;
        let message = WireMessage {
            content: Some(content.to_string()),
            ..WireMessage::default()
        };
        Ok(self.accept(recipient, message).await)
    }

    async fn send_media_message(&self, upload: MediaUpload) -> Result<WireMessage, MolarisseError> {
        self.enter(TransportCall::SendMediaMessage {
            recipient: upload.recipient,
            file_name: upload.file_name.clone(),
        })
        .await?;
        let message = WireMessage {
            content: Some(upload.content.clone()),
            media_type: Some(upload.kind.to_string()),
            media_path: Some(upload.file_name.clone()),
            ..WireMessage::default()
        };
        Ok(self.accept(upload.recipient, message).await)
    }

    async fn mark_read(&self, ids: &[MessageId]) -> Result<(), MolarisseError> {
        self.enter(TransportCall::MarkRead(ids.to_vec())).await?;
        let now = RawTimestamp::Instant(Utc::now().trunc_subsecs(0));
        let mut state = self.state.lock().await;
        for message in state.threads.values_mut().flatten() {
            if message.id.is_some_and(|id| ids.contains(&MessageId(id))) {
                message.is_read = Some(true);
                message.read_at.get_or_insert_with(|| now.clone());
            }
        }
        Ok(())
    }

    async fn mark_conversation_read(&self, partner: PartnerId) -> Result<(), MolarisseError> {
        self.enter(TransportCall::MarkConversationRead(partner)).await?;
        let mut state = self.state.lock().await;
        let mut cleared = 0;
        for row in state
            .conversations
            .iter_mut()
            .filter(|c| c.partner_id == Some(partner.0))
        {
            cleared += row.unread_count.unwrap_or(0).max(0) as u64;
            row.unread_count = Some(0);
        }
        state.unread = state.unread.saturating_sub(cleared);
        Ok(())
    }

    async fn unread_count(&self) -> Result<u64, MolarisseError> {
        self.enter(TransportCall::UnreadCount).await?;
        Ok(self.state.lock().await.unread)
    }

    async fn edit_message(
        &self,
        id: MessageId,
        content: &str,
    ) -> Result<WireMessage, MolarisseError> {
        self.enter(TransportCall::EditMessage {
            id,
            content: content.to_string(),
        })
        .await?;
        let mut state = self.state.lock().await;
        let message = state
            .threads
            .values_mut()
            .flatten()
            .find(|m| m.id == Some(id.0))
            .ok_or_else(|| Self::not_found("message", id))?;
        message.content = Some(content.to_string());
        message.edited = Some(true);
        message.edited_at = Some(RawTimestamp::Instant(Utc::now().trunc_subsecs(0)));
        Ok(message.clone())
    }

    async fn delete_message(&self, id: MessageId) -> Result<(), MolarisseError> {
        self.enter(TransportCall::DeleteMessage(id)).await?;
        let mut state = self.state.lock().await;
        let mut removed = false;
        for thread in state.threads.values_mut() {
            let before = thread.len();
            thread.retain(|m| m.id != Some(id.0));
            removed |= thread.len() != before;
        }
        if removed {
            Ok(())
        } else {
            Err(Self::not_found("message", id))
        }
    }

    async fn partner_info(&self, partner: PartnerId) -> Result<WirePartnerInfo, MolarisseError> {
        self.enter(TransportCall::PartnerInfo(partner)).await?;
        self.state
            .lock()
            .await
            .partners
            .get(&partner)
            .cloned()
            .ok_or_else(|| Self::not_found("partner", partner))
    }

    async fn user_info(&self, user: PartnerId) -> Result<WireUserInfo, MolarisseError> {
        self.enter(TransportCall::UserInfo(user)).await?;
        self.state
            .lock()
            .await
            .users
            .get(&user)
            .cloned()
            .ok_or_else(|| Self::not_found("user", user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sends_are_visible_to_the_next_fetch() {
        let transport = MockTransport::new();
        let sent = transport.send_message(PartnerId(7), "bonjour").await.unwrap();
        assert_eq!(sent.sender_id, Some(1));
        assert_eq!(sent.is_mine, Some(true));

        let thread = transport.list_messages(PartnerId(7)).await.unwrap();
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].content.as_deref(), Some("bonjour"));
    }

    #[tokio::test]
    async fn injected_failures_are_recorded_and_recoverable() {
        let transport = MockTransport::new();
        transport.fail(Operation::UnreadCount).await;
        let err = transport.unread_count().await.unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains("unread_count"));

        transport.recover(Operation::UnreadCount).await;
        transport.set_unread_count(4).await;
        assert_eq!(transport.unread_count().await.unwrap(), 4);
        assert_eq!(transport.call_count(Operation::UnreadCount).await, 2);
    }

    #[tokio::test]
    async fn held_fetches_wait_for_release() {
        let transport = Arc::new(MockTransport::new());
        transport.hold_messages(PartnerId(2)).await;

        let pending = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move { transport.list_messages(PartnerId(2)).await })
        };
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        transport.release_messages(PartnerId(2)).await;
        assert!(pending.await.unwrap().unwrap().is_empty());
    }

    #[tokio::test]
    async fn conversation_read_clears_row_and_badge() {
        let transport = MockTransport::new();
        transport
            .set_conversations(vec![WireConversation {
                partner_id: Some(3),
                unread_count: Some(2),
                ..WireConversation::default()
            }])
            .await;
        transport.set_unread_count(5).await;

        transport.mark_conversation_read(PartnerId(3)).await.unwrap();
        let rows = transport.list_conversations().await.unwrap();
        assert_eq!(rows[0].unread_count, Some(0));
        assert_eq!(transport.unread_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn adapter_identity() {
        let transport = MockTransport::default();
        assert_eq!(transport.name(), "mock-transport");
        assert_eq!(transport.health_check().await.unwrap(), HealthStatus::Healthy);

        transport.fail(Operation::UnreadCount).await;
        assert!(matches!(
            transport.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
    }
}
