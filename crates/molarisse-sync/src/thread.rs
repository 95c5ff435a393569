// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Synchronizer for the open conversation.
//!
//! Owns one partner's message list and keeps it consistent with the server
//! through polling. Every merge sorts by `sent_at` (stable, so equal
//! timestamps keep arrival order) and keeps the first occurrence of each id.
//!
//! Each partner switch bumps a generation counter. Responses are applied
//! only if the generation captured when the request started still matches,
//! so a slow answer for the previous partner can never land in the new
//! thread. The state lock is never held across a network call.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use molarisse_core::{
    Message, MessageId, MessagingTransport, MolarisseError, PartnerId, PartnerProfile,
};
use strum::Display;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::adapt::{self, MessageContext};
use crate::display_name::DisplayNameResolver;
use crate::events::{EventBus, ScrollDirective, SyncEvent};
use crate::outbox::{Draft, Outbox, OutboxEntry};
use crate::poller::{InFlight, Refreshable};
use crate::resource_cache::ResourceUrlCache;
use crate::timestamp;
use crate::unread::UnreadBadge;

/// Distance from the bottom, in pixels, still treated as "at the bottom".
pub const BOTTOM_THRESHOLD_PX: f64 = 20.0;

pub fn is_at_bottom(scroll_top: f64, scroll_height: f64, client_height: f64) -> bool {
    scroll_height - scroll_top - client_height < BOTTOM_THRESHOLD_PX
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ThreadState {
    /// No partner selected.
    Idle,
    /// First fetch for the current partner is outstanding.
    Loading,
    Ready,
    /// A background re-fetch is outstanding; the list stays readable.
    Refreshing,
}

/// Transient per-message operation, overlapping `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PendingOperation {
    Editing,
    Deleting,
}

/// What a refresh did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied { len: usize },
    /// The server returned nothing; the current list was kept.
    Empty,
    /// Another load or refresh was in flight, or no thread is open.
    Skipped,
    /// The partner changed while the request was out.
    Stale,
}

/// Sort ascending by `sent_at` and drop repeated ids, keeping the first.
pub fn merge_thread(mut messages: Vec<Message>) -> Vec<Message> {
    messages.sort_by_key(|m| m.sent_at);
    let mut seen = HashSet::with_capacity(messages.len());
    messages.retain(|m| seen.insert(m.id));
    messages
}

/// Fold a fresh fetch over the current list. The fetch is authoritative for
/// membership and content, but a message's send time never changes and read
/// and edit markers never revert.
fn reconcile(previous: &[Message], fetched: Vec<Message>) -> Vec<Message> {
    let known: HashMap<MessageId, &Message> = previous.iter().map(|m| (m.id, m)).collect();
    let folded = fetched
        .into_iter()
        .map(|mut m| {
            if let Some(old) = known.get(&m.id) {
                m.sent_at = old.sent_at;
                m.read_at = m.read_at.or(old.read_at);
                m.edited |= old.edited;
                m.edited_at = m.edited_at.or(old.edited_at);
            }
            m
        })
        .collect();
    merge_thread(folded)
}

/// How [`MessageThreadSynchronizer::apply`] combines new messages with the
/// current list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fold {
    /// The messages are a full server fetch and decide membership.
    Replace,
    /// The messages are additions; nothing already shown is dropped.
    Append,
}

#[derive(Debug)]
struct ThreadInner {
    partner: Option<PartnerId>,
    profile: Option<PartnerProfile>,
    messages: Vec<Message>,
    viewer_at_bottom: bool,
    unread_affordance: bool,
    outbox: Outbox,
    busy: HashMap<MessageId, PendingOperation>,
}

impl ThreadInner {
    fn new() -> Self {
        Self {
            partner: None,
            profile: None,
            messages: Vec::new(),
            viewer_at_bottom: true,
            unread_affordance: false,
            outbox: Outbox::default(),
            busy: HashMap::new(),
        }
    }

    fn find(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Scroll policy for data that just landed.
    fn scroll_directive(&mut self) -> Option<ScrollDirective> {
        if self.messages.is_empty() {
            return None;
        }
        if self.viewer_at_bottom {
            self.unread_affordance = false;
            Some(ScrollDirective::ScrollToBottom)
        } else {
            self.unread_affordance = true;
            Some(ScrollDirective::ShowUnreadAffordance)
        }
    }
}

pub struct MessageThreadSynchronizer {
    transport: Arc<dyn MessagingTransport>,
    names: Arc<DisplayNameResolver>,
    resources: Arc<ResourceUrlCache>,
    unread: Option<Arc<UnreadBadge>>,
    events: EventBus,
    me: Option<PartnerId>,
    generation: AtomicU64,
    loads: AtomicUsize,
    refreshing: AtomicBool,
    inner: Mutex<ThreadInner>,
}

impl MessageThreadSynchronizer {
    pub fn new(
        transport: Arc<dyn MessagingTransport>,
        names: Arc<DisplayNameResolver>,
        resources: Arc<ResourceUrlCache>,
        events: EventBus,
    ) -> Self {
        Self {
            transport,
            names,
            resources,
            unread: None,
            events,
            me: None,
            generation: AtomicU64::new(0),
            loads: AtomicUsize::new(0),
            refreshing: AtomicBool::new(false),
            inner: Mutex::new(ThreadInner::new()),
        }
    }

    /// The signed-in user, used when the server omits `isMine`.
    pub fn with_current_user(mut self, me: Option<PartnerId>) -> Self {
        self.me = me;
        self
    }

    /// Badge to refresh after read receipts are sent.
    pub fn with_unread_badge(mut self, badge: Arc<UnreadBadge>) -> Self {
        self.unread = Some(badge);
        self
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub async fn state(&self) -> ThreadState {
        let inner = self.inner.lock().await;
        if inner.partner.is_none() {
            ThreadState::Idle
        } else if self.loads.load(Ordering::Acquire) > 0 {
            ThreadState::Loading
        } else if self.refreshing.load(Ordering::Acquire) {
            ThreadState::Refreshing
        } else {
            ThreadState::Ready
        }
    }

    pub async fn partner(&self) -> Option<PartnerId> {
        self.inner.lock().await.partner
    }

    pub async fn profile(&self) -> Option<PartnerProfile> {
        self.inner.lock().await.profile.clone()
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.inner.lock().await.messages.clone()
    }

    pub async fn outbox(&self) -> Vec<OutboxEntry> {
        self.inner.lock().await.outbox.entries().to_vec()
    }

    pub async fn pending_operation(&self, id: MessageId) -> Option<PendingOperation> {
        self.inner.lock().await.busy.get(&id).copied()
    }

    pub async fn unread_affordance(&self) -> bool {
        self.inner.lock().await.unread_affordance
    }

    /// Record whether the reader is at the bottom of the list.
    pub async fn set_viewer_at_bottom(&self, at_bottom: bool) {
        let mut inner = self.inner.lock().await;
        inner.viewer_at_bottom = at_bottom;
        if at_bottom {
            inner.unread_affordance = false;
        }
    }

    /// Point the synchronizer at `partner` and load its thread.
    ///
    /// Transport failures leave an empty thread; they are logged, not
    /// returned. Any in-flight request for the previous partner is discarded
    /// when it resolves.
    pub async fn open(&self, partner: PartnerId) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        {
            let mut inner = self.inner.lock().await;
            let outbox = std::mem::take(&mut inner.outbox);
            *inner = ThreadInner::new();
            inner.outbox = outbox;
            inner.partner = Some(partner);
        }
        self.loads.fetch_add(1, Ordering::AcqRel);
        let _loading = LoadGuard(&self.loads);
        info!(%partner, generation, "opening thread");

        let (profile, fetched) = tokio::join!(
            self.names.lookup_profile(partner),
            self.transport.list_messages(partner)
        );

        {
            let mut inner = self.inner.lock().await;
            if !self.is_current(&inner, generation, partner) {
                warn!(%partner, generation, "discarding stale partner profile");
                return;
            }
            inner.profile = Some(profile);
        }

        let fetched = match fetched {
            Ok(wire) => adapt::messages(wire, self.context(partner)),
            Err(e) => {
                warn!(%partner, error = %e, "thread load failed, showing empty thread");
                Vec::new()
            }
        };
        self.apply(generation, partner, fetched, Fold::Replace).await;
    }

    /// Forget the open thread. In-flight responses will be discarded.
    pub async fn close(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        let mut inner = self.inner.lock().await;
        let outbox = std::mem::take(&mut inner.outbox);
        *inner = ThreadInner::new();
        inner.outbox = outbox;
    }

    /// Re-fetch the thread, reporting transport failures.
    ///
    /// Skipped while a load or another refresh is outstanding. An empty
    /// answer never replaces a populated list.
    pub async fn refresh_now(&self) -> Result<RefreshOutcome, MolarisseError> {
        if self.loads.load(Ordering::Acquire) > 0 {
            return Ok(RefreshOutcome::Skipped);
        }
        let Some(_in_flight) = InFlight::try_acquire(&self.refreshing) else {
            return Ok(RefreshOutcome::Skipped);
        };
        let (partner, generation) = {
            let inner = self.inner.lock().await;
            match inner.partner {
                Some(partner) => (partner, self.generation()),
                None => return Ok(RefreshOutcome::Skipped),
            }
        };

        let wire = self.transport.list_messages(partner).await?;
        let fetched = adapt::messages(wire, self.context(partner));
        if fetched.is_empty() {
            debug!(%partner, "refresh returned no messages, keeping current thread");
            return Ok(RefreshOutcome::Empty);
        }
        match self.apply(generation, partner, fetched, Fold::Replace).await {
            Some(len) => Ok(RefreshOutcome::Applied { len }),
            None => Ok(RefreshOutcome::Stale),
        }
    }

    pub async fn send_text(&self, content: &str) -> Result<Uuid, MolarisseError> {
        self.send(Draft::text(content)).await
    }

    pub async fn send_image(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> Result<Uuid, MolarisseError> {
        self.send(Draft::Image {
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            bytes,
            caption: caption.to_string(),
        })
        .await
    }

    pub async fn send_voice(&self, mime_type: &str, bytes: Vec<u8>) -> Result<Uuid, MolarisseError> {
        self.send(Draft::Voice {
            mime_type: mime_type.to_string(),
            bytes,
        })
        .await
    }

    /// Submit a draft to the open partner.
    ///
    /// Nothing is added to the thread until the server acknowledges; the
    /// acknowledged message is then folded in by a full re-fetch. On failure
    /// the thread is untouched, one error notice is published, and the draft
    /// stays in the outbox for [`take_failed`](Self::take_failed).
    pub async fn send(&self, draft: Draft) -> Result<Uuid, MolarisseError> {
        draft.validate()?;
        let (partner, generation, local_id) = {
            let mut inner = self.inner.lock().await;
            let partner = inner.partner.ok_or_else(no_open_thread)?;
            let local_id = inner.outbox.enqueue(partner, draft.clone());
            (partner, self.generation(), local_id)
        };
        debug!(%partner, %local_id, kind = %draft.kind(), "sending message");

        let result = match draft.to_upload(partner) {
            Some(upload) => self.transport.send_media_message(upload).await,
            None => self.transport.send_message(partner, draft.content().trim()).await,
        };

        match result {
            Ok(wire) => {
                let acknowledged = adapt::message(wire, self.context(partner));
                let server_id = acknowledged.as_ref().map(|m| m.id);
                {
                    let mut inner = self.inner.lock().await;
                    inner.outbox.confirm(local_id, server_id);
                    inner.outbox.prune_confirmed();
                }
                self.events.publish(SyncEvent::SendSettled {
                    local_id,
                    message: server_id,
                });
                self.fold_after_send(generation, partner, acknowledged).await;
                Ok(local_id)
            }
            Err(e) => {
                self.inner
                    .lock()
                    .await
                    .outbox
                    .fail(local_id, e.to_string());
                error!(%partner, %local_id, error = %e, "send failed");
                self.events
                    .notify_error(format!("Message could not be sent: {e}"));
                self.events.publish(SyncEvent::SendSettled {
                    local_id,
                    message: None,
                });
                Err(e)
            }
        }
    }

    /// Take back the draft of a failed send.
    pub async fn take_failed(&self, local_id: Uuid) -> Option<Draft> {
        self.inner.lock().await.outbox.take_failed(local_id)
    }

    /// Resubmit a failed send as a new outbox entry.
    pub async fn retry_failed(&self, local_id: Uuid) -> Result<Uuid, MolarisseError> {
        let draft = self
            .take_failed(local_id)
            .await
            .ok_or_else(|| MolarisseError::NotFound {
                kind: "failed send".to_string(),
                id: local_id.to_string(),
            })?;
        self.send(draft).await
    }

    /// Replace the content of one of the viewer's own text messages.
    ///
    /// Patched in place on success; the list is untouched on failure.
    pub async fn edit(&self, id: MessageId, content: &str) -> Result<(), MolarisseError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(MolarisseError::Precondition(
                "edited message has no content".to_string(),
            ));
        }
        let partner = self
            .begin_operation(id, PendingOperation::Editing, |m| {
                if m.has_media() {
                    Err(MolarisseError::Precondition(
                        "media messages cannot be edited".to_string(),
                    ))
                } else {
                    Ok(())
                }
            })
            .await?;

        let result = self.transport.edit_message(id, content).await;

        let mut inner = self.inner.lock().await;
        inner.busy.remove(&id);
        match result {
            Ok(wire) => {
                let edited_at = wire
                    .edited_at
                    .as_ref()
                    .and_then(timestamp::try_normalize)
                    .unwrap_or_else(|| Utc::now().trunc_subsecs(0));
                let new_content = wire
                    .content
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or_else(|| content.to_string());
                if inner.partner == Some(partner) {
                    if let Some(message) = inner.messages.iter_mut().find(|m| m.id == id) {
                        message.content = new_content;
                        message.edited = true;
                        message.edited_at = Some(edited_at);
                    }
                    let len = inner.messages.len();
                    drop(inner);
                    self.events.publish(SyncEvent::ThreadUpdated { partner, len });
                }
                debug!(%partner, %id, "message edited");
                Ok(())
            }
            Err(e) => {
                drop(inner);
                error!(%partner, %id, error = %e, "edit failed");
                self.events
                    .notify_error(format!("Message could not be edited: {e}"));
                Err(e)
            }
        }
    }

    /// Delete one of the viewer's own messages. No tombstone, no undo.
    pub async fn delete(&self, id: MessageId) -> Result<(), MolarisseError> {
        let partner = self
            .begin_operation(id, PendingOperation::Deleting, |_| Ok(()))
            .await?;

        let result = self.transport.delete_message(id).await;

        let mut inner = self.inner.lock().await;
        inner.busy.remove(&id);
        match result {
            Ok(()) => {
                if inner.partner == Some(partner) {
                    inner.messages.retain(|m| m.id != id);
                    let len = inner.messages.len();
                    drop(inner);
                    self.events.publish(SyncEvent::ThreadUpdated { partner, len });
                }
                debug!(%partner, %id, "message deleted");
                Ok(())
            }
            Err(e) => {
                drop(inner);
                error!(%partner, %id, error = %e, "delete failed");
                self.events
                    .notify_error(format!("Message could not be deleted: {e}"));
                Err(e)
            }
        }
    }

    /// Ask the server for a message's authoritative send time and re-sort if
    /// the local value was wrong. Returns whether anything changed.
    pub async fn repair_sent_at(&self, id: MessageId) -> Result<bool, MolarisseError> {
        let (partner, generation) = {
            let inner = self.inner.lock().await;
            let partner = inner.partner.ok_or_else(no_open_thread)?;
            if inner.find(id).is_none() {
                return Err(not_found(id));
            }
            (partner, self.generation())
        };

        let Some(authoritative) = self
            .transport
            .message_original_date(id)
            .await?
            .as_ref()
            .and_then(timestamp::try_normalize)
        else {
            debug!(%id, "server has no usable send time");
            return Ok(false);
        };

        let mut inner = self.inner.lock().await;
        if !self.is_current(&inner, generation, partner) {
            return Ok(false);
        }
        let Some(message) = inner.messages.iter_mut().find(|m| m.id == id) else {
            return Ok(false);
        };
        if message.sent_at == authoritative {
            return Ok(false);
        }
        info!(%id, from = %message.sent_at, to = %authoritative, "correcting send time");
        message.sent_at = authoritative;
        let messages = std::mem::take(&mut inner.messages);
        inner.messages = merge_thread(messages);
        let len = inner.messages.len();
        drop(inner);
        self.events.publish(SyncEvent::ThreadUpdated { partner, len });
        Ok(true)
    }

    fn context(&self, partner: PartnerId) -> MessageContext {
        MessageContext::thread(partner, self.me)
    }

    fn is_current(&self, inner: &ThreadInner, generation: u64, partner: PartnerId) -> bool {
        self.generation() == generation && inner.partner == Some(partner)
    }

    /// Validate and mark an edit/delete target. The closure adds per-operation
    /// checks on top of "exists, is mine, not already busy".
    async fn begin_operation(
        &self,
        id: MessageId,
        operation: PendingOperation,
        check: impl FnOnce(&Message) -> Result<(), MolarisseError>,
    ) -> Result<PartnerId, MolarisseError> {
        let mut inner = self.inner.lock().await;
        let partner = inner.partner.ok_or_else(no_open_thread)?;
        let message = inner.find(id).ok_or_else(|| not_found(id))?;
        if !message.is_mine {
            return Err(MolarisseError::Precondition(format!(
                "message {id} was not sent by you"
            )));
        }
        check(message)?;
        if let Some(existing) = inner.busy.get(&id) {
            return Err(MolarisseError::Precondition(format!(
                "message {id} is already {}",
                existing.to_string().to_lowercase()
            )));
        }
        inner.busy.insert(id, operation);
        Ok(partner)
    }

    /// Merge a fetch into the thread if it is still current. Returns the new
    /// length, or `None` if the response was stale.
    async fn apply(
        &self,
        generation: u64,
        partner: PartnerId,
        fetched: Vec<Message>,
        fold: Fold,
    ) -> Option<usize> {
        let (directive, unread, len) = {
            let mut inner = self.inner.lock().await;
            if !self.is_current(&inner, generation, partner) {
                warn!(%partner, generation, current = self.generation(), "discarding stale thread response");
                return None;
            }
            let before = (inner.messages.len(), inner.messages.last().map(|m| m.id));
            let merged = match fold {
                Fold::Replace => reconcile(&inner.messages, fetched),
                Fold::Append => {
                    let mut combined = inner.messages.clone();
                    combined.extend(fetched);
                    merge_thread(combined)
                }
            };
            inner.messages = merged;
            let after = (inner.messages.len(), inner.messages.last().map(|m| m.id));

            let directive = if before != after {
                inner.scroll_directive()
            } else {
                None
            };
            let unread: Vec<MessageId> = inner
                .messages
                .iter()
                .filter(|m| !m.is_mine && !m.is_read())
                .map(|m| m.id)
                .collect();
            self.resources.prewarm(inner.messages.iter());
            (directive, unread, inner.messages.len())
        };

        debug!(%partner, len, unread = unread.len(), "thread updated");
        self.events.publish(SyncEvent::ThreadUpdated { partner, len });
        if let Some(directive) = directive {
            self.events.publish(SyncEvent::Scroll(directive));
        }
        if !unread.is_empty() {
            self.mark_fetched_read(generation, partner, unread).await;
        }
        Some(len)
    }

    /// Read receipts for freshly fetched messages. A side effect of loading,
    /// so failures are only logged.
    async fn mark_fetched_read(&self, generation: u64, partner: PartnerId, ids: Vec<MessageId>) {
        if let Err(e) = self.transport.mark_read(&ids).await {
            warn!(%partner, count = ids.len(), error = %e, "failed to mark messages read");
            return;
        }
        {
            let now = Utc::now().trunc_subsecs(0);
            let mut inner = self.inner.lock().await;
            if self.is_current(&inner, generation, partner) {
                let ids: HashSet<MessageId> = ids.iter().copied().collect();
                for message in inner.messages.iter_mut() {
                    if ids.contains(&message.id) && message.read_at.is_none() {
                        message.read_at = Some(now);
                    }
                }
            }
        }
        debug!(%partner, count = ids.len(), "messages marked read");
        if let Some(badge) = &self.unread {
            if let Err(e) = badge.refresh_now().await {
                warn!(error = %e, "unread badge refresh after read receipt failed");
            }
        }
    }

    /// Bring an acknowledged send into the thread. A successful re-fetch
    /// replaces the list; otherwise the acknowledgement is appended to what
    /// is already shown.
    async fn fold_after_send(
        &self,
        generation: u64,
        partner: PartnerId,
        acknowledged: Option<Message>,
    ) {
        let refetched = match self.transport.list_messages(partner).await {
            Ok(wire) => adapt::messages(wire, self.context(partner)),
            Err(e) => {
                warn!(%partner, error = %e, "re-fetch after send failed");
                Vec::new()
            }
        };

        let (mut fetched, fold) = if refetched.is_empty() {
            (Vec::new(), Fold::Append)
        } else {
            (refetched, Fold::Replace)
        };
        if let Some(message) = acknowledged {
            // Pushed last so a fetched copy wins the dedup.
            fetched.push(message);
        }
        if fetched.is_empty() {
            return;
        }
        if self.apply(generation, partner, fetched, fold).await.is_none() {
            debug!(%partner, "sent message belongs to a thread no longer open");
        }
    }
}

fn no_open_thread() -> MolarisseError {
    MolarisseError::Precondition("no conversation is open".to_string())
}

fn not_found(id: MessageId) -> MolarisseError {
    MolarisseError::NotFound {
        kind: "message".to_string(),
        id: id.to_string(),
    }
}

struct LoadGuard<'a>(&'a AtomicUsize);

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

#[async_trait]
impl Refreshable for MessageThreadSynchronizer {
    fn label(&self) -> &'static str {
        "thread"
    }

    async fn refresh(&self) {
        match self.refresh_now().await {
            Ok(outcome) => debug!(?outcome, "thread poll finished"),
            Err(e) => warn!(error = %e, "background thread refresh failed, keeping current thread"),
        }
    }
}
