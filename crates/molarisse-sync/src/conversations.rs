// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbox synchronizer: one summary per partner, unread first, newest first.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use molarisse_core::{ConversationSummary, MessagingTransport, MolarisseError, PartnerId};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::adapt;
use crate::display_name::{DisplayNameResolver, is_placeholder};
use crate::events::{EventBus, SyncEvent};
use crate::poller::{InFlight, Refreshable};
use crate::unread::UnreadBadge;

/// Conversations with unread messages first, then by last activity, newest
/// first. Stable for equal keys.
pub fn sort_summaries(summaries: &mut [ConversationSummary]) {
    summaries.sort_by_key(|c| (c.unread_count == 0, Reverse(c.last_message_time)));
}

/// Case-insensitive substring match on partner name and last message. A
/// blank query matches everything.
pub fn filter_summaries(summaries: &[ConversationSummary], query: &str) -> Vec<ConversationSummary> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return summaries.to_vec();
    }
    summaries
        .iter()
        .filter(|c| {
            c.partner_name.to_lowercase().contains(&needle)
                || c.last_message_content.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

pub struct ConversationListSynchronizer {
    transport: Arc<dyn MessagingTransport>,
    names: Option<Arc<DisplayNameResolver>>,
    unread: Option<Arc<UnreadBadge>>,
    events: EventBus,
    refreshing: AtomicBool,
    summaries: Mutex<Vec<ConversationSummary>>,
}

impl ConversationListSynchronizer {
    pub fn new(transport: Arc<dyn MessagingTransport>, events: EventBus) -> Self {
        Self {
            transport,
            names: None,
            unread: None,
            events,
            refreshing: AtomicBool::new(false),
            summaries: Mutex::new(Vec::new()),
        }
    }

    /// Share real names with, and borrow cached names from, the resolver.
    pub fn with_names(mut self, names: Arc<DisplayNameResolver>) -> Self {
        self.names = Some(names);
        self
    }

    pub fn with_unread_badge(mut self, badge: Arc<UnreadBadge>) -> Self {
        self.unread = Some(badge);
        self
    }

    pub async fn summaries(&self) -> Vec<ConversationSummary> {
        self.summaries.lock().await.clone()
    }

    pub async fn filter(&self, query: &str) -> Vec<ConversationSummary> {
        filter_summaries(&self.summaries.lock().await, query)
    }

    pub async fn get(&self, partner: PartnerId) -> Option<ConversationSummary> {
        self.summaries
            .lock()
            .await
            .iter()
            .find(|c| c.partner_id == partner)
            .cloned()
    }

    pub async fn total_unread(&self) -> u64 {
        self.summaries
            .lock()
            .await
            .iter()
            .map(|c| u64::from(c.unread_count))
            .sum()
    }

    /// Initial load. Failures leave the list as it was.
    pub async fn load(&self) {
        match self.refresh_now().await {
            Ok(len) => info!(len, "conversations loaded"),
            Err(e) => warn!(error = %e, "conversation load failed"),
        }
    }

    /// Fetch and replace the list, reporting failures. Returns the new
    /// length, or the current one if a refresh was already in flight.
    pub async fn refresh_now(&self) -> Result<usize, MolarisseError> {
        let Some(_in_flight) = InFlight::try_acquire(&self.refreshing) else {
            return Ok(self.summaries.lock().await.len());
        };

        let wire = self.transport.list_conversations().await?;
        let mut fresh = adapt::conversations(wire);

        let mut seen = HashSet::with_capacity(fresh.len());
        fresh.retain(|c| {
            let first = seen.insert(c.partner_id);
            if !first {
                warn!(partner = %c.partner_id, "duplicate conversation dropped");
            }
            first
        });

        if let Some(names) = &self.names {
            for summary in fresh.iter_mut() {
                if is_placeholder(&summary.partner_name) {
                    if let Some(name) = names.cached(summary.partner_id) {
                        summary.partner_name = name;
                    }
                } else {
                    names.remember(summary.partner_id, &summary.partner_name);
                }
            }
        }

        sort_summaries(&mut fresh);
        let len = fresh.len();
        *self.summaries.lock().await = fresh;
        debug!(len, "conversation list replaced");
        self.events.publish(SyncEvent::ConversationsUpdated { len });
        Ok(len)
    }

    /// Mark every message from `partner` read.
    ///
    /// The row's counter drops to zero only once the server accepts; on
    /// failure it stays put and one error notice is published.
    pub async fn mark_read(&self, partner: PartnerId) -> Result<(), MolarisseError> {
        if let Err(e) = self.transport.mark_conversation_read(partner).await {
            error!(%partner, error = %e, "mark conversation read failed");
            self.events
                .notify_error(format!("Conversation could not be marked as read: {e}"));
            return Err(e);
        }

        let len = {
            let mut summaries = self.summaries.lock().await;
            if let Some(row) = summaries.iter_mut().find(|c| c.partner_id == partner) {
                row.unread_count = 0;
            }
            sort_summaries(&mut summaries);
            summaries.len()
        };
        debug!(%partner, "conversation marked read");
        self.events.publish(SyncEvent::ConversationsUpdated { len });

        if let Some(badge) = &self.unread {
            if let Err(e) = badge.refresh_now().await {
                warn!(error = %e, "unread badge refresh after mark read failed");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Refreshable for ConversationListSynchronizer {
    fn label(&self) -> &'static str {
        "conversations"
    }

    async fn refresh(&self) {
        if let Err(e) = self.refresh_now().await {
            warn!(error = %e, "background conversation refresh failed, keeping current list");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use molarisse_core::MediaKind;

    use super::*;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 12, hour, 0, 0).unwrap()
    }

    fn row(partner: i64, name: &str, unread: u32, hour: u32) -> ConversationSummary {
        ConversationSummary {
            partner_id: PartnerId(partner),
            partner_name: name.to_string(),
            partner_role: String::new(),
            profile_picture: None,
            last_message_content: format!("dernier message de {name}"),
            last_message_media_kind: MediaKind::None,
            last_message_media_path: None,
            last_message_time: at(hour),
            is_last_message_mine: false,
            unread_count: unread,
        }
    }

    #[test]
    fn unread_first_then_newest() {
        let mut rows = vec![
            row(1, "A", 0, 10),
            row(2, "B", 2, 9),
            row(3, "C", 0, 11),
            row(4, "D", 1, 8),
        ];
        sort_summaries(&mut rows);
        let order: Vec<&str> = rows.iter().map(|r| r.partner_name.as_str()).collect();
        assert_eq!(order, vec!["B", "D", "C", "A"]);
    }

    #[test]
    fn equal_keys_keep_order() {
        let mut rows = vec![row(1, "first", 0, 10), row(2, "second", 0, 10)];
        sort_summaries(&mut rows);
        assert_eq!(rows[0].partner_name, "first");
    }

    #[test]
    fn filter_matches_name_or_content() {
        let rows = vec![row(1, "Dr. Amrani", 0, 10), row(2, "Sara", 0, 9)];
        assert_eq!(filter_summaries(&rows, "  AMRANI ").len(), 1);
        assert_eq!(filter_summaries(&rows, "de sara").len(), 1);
        assert_eq!(filter_summaries(&rows, "").len(), 2);
        assert!(filter_summaries(&rows, "zzz").is_empty());
    }
}
