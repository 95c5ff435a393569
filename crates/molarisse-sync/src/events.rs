// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engine events for whatever renders the inbox and thread.

use molarisse_core::{MessageId, PartnerId};
use strum::Display;
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

/// What the view should do with its scroll position after new data lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ScrollDirective {
    /// The viewer was at the bottom: follow the newest message.
    ScrollToBottom,
    /// The viewer was reading history: keep position, offer a jump button.
    ShowUnreadAffordance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A transient, user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// The open thread's message list changed.
    ThreadUpdated { partner: PartnerId, len: usize },
    /// The inbox was reloaded or re-sorted.
    ConversationsUpdated { len: usize },
    /// A real name is now known for a partner.
    PartnerResolved { partner: PartnerId, name: String },
    /// The inbox-wide unread counter changed.
    UnreadCount(u64),
    Scroll(ScrollDirective),
    /// A submission left the outbox, one way or the other.
    SendSettled {
        local_id: Uuid,
        message: Option<MessageId>,
    },
    Notice(Notice),
}

/// Fan-out of [`SyncEvent`]s. Publishing never blocks and never fails; slow
/// subscribers lose the oldest events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: SyncEvent) {
        if self.tx.send(event).is_err() {
            trace!("no event subscribers");
        }
    }

    pub fn notify_error(&self, message: impl Into<String>) {
        self.publish(SyncEvent::Notice(Notice::error(message)));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
