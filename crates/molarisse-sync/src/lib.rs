// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Polling synchronization engine for Molarisse messaging.
//!
//! Keeps an inbox and one open thread consistent with the clinic server,
//! which offers no push channel. The pure helpers ([`timestamp`], [`adapt`],
//! [`resource_cache`]) turn loosely shaped server records into canonical
//! ones; the synchronizers own the in-memory lists and poll for changes.

pub mod adapt;
pub mod conversations;
pub mod display_name;
pub mod engine;
pub mod events;
pub mod outbox;
pub mod poller;
pub mod resource_cache;
pub mod session;
pub mod thread;
pub mod timestamp;
pub mod unread;

pub use conversations::{ConversationListSynchronizer, filter_summaries, sort_summaries};
pub use display_name::DisplayNameResolver;
pub use engine::SyncEngine;
pub use events::{EventBus, Notice, NoticeLevel, ScrollDirective, SyncEvent};
pub use outbox::{Draft, Outbox, OutboxEntry, OutboxState};
pub use poller::{Refreshable, spawn_poller};
pub use resource_cache::{ResourceKind, ResourceUrlCache};
pub use session::{JsonFileSessionStore, MemorySessionStore};
pub use thread::{
    MessageThreadSynchronizer, PendingOperation, RefreshOutcome, ThreadState, merge_thread,
};
pub use unread::UnreadBadge;
