// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiring for one view session: shared caches, both synchronizers, the
//! unread badge, and their pollers.

use std::sync::Arc;
use std::time::Duration;

use molarisse_config::MolarisseConfig;
use molarisse_core::{MessagingTransport, PartnerId, SessionStore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::conversations::ConversationListSynchronizer;
use crate::display_name::DisplayNameResolver;
use crate::events::EventBus;
use crate::poller::spawn_poller;
use crate::resource_cache::ResourceUrlCache;
use crate::thread::MessageThreadSynchronizer;
use crate::unread::UnreadBadge;

/// Everything one inbox view needs. Caches are fresh per engine.
pub struct SyncEngine {
    pub events: EventBus,
    pub resources: Arc<ResourceUrlCache>,
    pub names: Arc<DisplayNameResolver>,
    pub unread: Arc<UnreadBadge>,
    pub thread: Arc<MessageThreadSynchronizer>,
    pub conversations: Arc<ConversationListSynchronizer>,
    thread_period: Duration,
    conversation_period: Duration,
    unread_period: Duration,
}

impl SyncEngine {
    pub fn from_config(
        config: &MolarisseConfig,
        transport: Arc<dyn MessagingTransport>,
        session: Arc<dyn SessionStore>,
    ) -> Self {
        let events = EventBus::new(config.sync.event_buffer);
        let resources = Arc::new(ResourceUrlCache::from_config(config));
        let names = Arc::new(DisplayNameResolver::new(
            Arc::clone(&transport),
            session,
            events.clone(),
        ));
        let unread = Arc::new(UnreadBadge::new(Arc::clone(&transport), events.clone()));
        let thread = Arc::new(
            MessageThreadSynchronizer::new(
                Arc::clone(&transport),
                Arc::clone(&names),
                Arc::clone(&resources),
                events.clone(),
            )
            .with_current_user(config.session.current_user_id.map(PartnerId))
            .with_unread_badge(Arc::clone(&unread)),
        );
        let conversations = Arc::new(
            ConversationListSynchronizer::new(transport, events.clone())
                .with_names(Arc::clone(&names))
                .with_unread_badge(Arc::clone(&unread)),
        );

        Self {
            events,
            resources,
            names,
            unread,
            thread,
            conversations,
            thread_period: Duration::from_secs(config.sync.thread_refresh_secs),
            conversation_period: Duration::from_secs(config.sync.conversation_refresh_secs),
            unread_period: Duration::from_secs(config.sync.unread_refresh_secs),
        }
    }

    /// Start the three background loops. They stop when `cancel` fires.
    pub fn spawn_pollers(&self, cancel: &CancellationToken) -> Vec<JoinHandle<()>> {
        info!(
            thread_secs = self.thread_period.as_secs(),
            conversation_secs = self.conversation_period.as_secs(),
            unread_secs = self.unread_period.as_secs(),
            "starting pollers"
        );
        vec![
            spawn_poller(
                self.conversations.clone(),
                self.conversation_period,
                cancel.child_token(),
            ),
            spawn_poller(
                self.thread.clone(),
                self.thread_period,
                cancel.child_token(),
            ),
            spawn_poller(
                self.unread.clone(),
                self.unread_period,
                cancel.child_token(),
            ),
        ]
    }
}
