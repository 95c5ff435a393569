// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbox-wide unread counter, as shown on the navigation bell.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use molarisse_core::{MessagingTransport, MolarisseError};
use tracing::{debug, warn};

use crate::events::{EventBus, SyncEvent};
use crate::poller::{InFlight, Refreshable};

pub struct UnreadBadge {
    transport: Arc<dyn MessagingTransport>,
    events: EventBus,
    count: AtomicU64,
    refreshing: AtomicBool,
}

impl UnreadBadge {
    pub fn new(transport: Arc<dyn MessagingTransport>, events: EventBus) -> Self {
        Self {
            transport,
            events,
            count: AtomicU64::new(0),
            refreshing: AtomicBool::new(false),
        }
    }

    /// Last known count; zero until the first successful fetch.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// Fetch the count, reporting failures. A refresh already in flight makes
    /// this a no-op returning the current value.
    pub async fn refresh_now(&self) -> Result<u64, MolarisseError> {
        let Some(_in_flight) = InFlight::try_acquire(&self.refreshing) else {
            return Ok(self.count());
        };
        let fetched = self.transport.unread_count().await?;
        let previous = self.count.swap(fetched, Ordering::AcqRel);
        if previous != fetched {
            debug!(previous, fetched, "unread count changed");
            self.events.publish(SyncEvent::UnreadCount(fetched));
        }
        Ok(fetched)
    }
}

#[async_trait]
impl Refreshable for UnreadBadge {
    fn label(&self) -> &'static str {
        "unread"
    }

    async fn refresh(&self) {
        if let Err(e) = self.refresh_now().await {
            warn!(error = %e, "unread count refresh failed, keeping previous value");
        }
    }
}
