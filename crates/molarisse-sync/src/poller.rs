// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-interval polling.
//!
//! There is no push channel; every synchronizer is kept fresh by its own
//! loop. Overlap is prevented by the synchronizer's in-flight flag, not by
//! the loop, so a manual refresh and a tick can never run together either.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Something a poller can refresh. Implementations swallow and log their
/// own failures: a degraded poll must not interrupt the reader.
#[async_trait]
pub trait Refreshable: Send + Sync + 'static {
    /// Short label for logs.
    fn label(&self) -> &'static str;

    async fn refresh(&self);
}

/// Holds an in-flight flag for the duration of one refresh.
pub(crate) struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    /// `None` if another refresh already holds the flag.
    pub(crate) fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Run `target.refresh()` every `period` until `cancel` fires.
///
/// The first tick is skipped: callers load synchronously before polling.
/// Ticks missed while a refresh is slow are skipped, not bunched.
pub fn spawn_poller(
    target: Arc<dyn Refreshable>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let label = target.label();
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval.tick().await;
        info!(target_name = label, period_secs = period.as_secs(), "poller started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    debug!(target_name = label, "poll tick");
                    target.refresh().await;
                }
                _ = cancel.cancelled() => {
                    info!(target_name = label, "poller shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    struct Counter {
        hits: AtomicUsize,
    }

    #[async_trait]
    impl Refreshable for Counter {
        fn label(&self) -> &'static str {
            "counter"
        }

        async fn refresh(&self) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn in_flight_flag_is_exclusive_and_released() {
        let flag = AtomicBool::new(false);
        let held = InFlight::try_acquire(&flag).expect("first acquire");
        assert!(InFlight::try_acquire(&flag).is_none());
        drop(held);
        assert!(InFlight::try_acquire(&flag).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn polls_on_interval_until_cancelled() {
        let counter = Arc::new(Counter {
            hits: AtomicUsize::new(0),
        });
        let cancel = CancellationToken::new();
        let handle = spawn_poller(counter.clone(), Duration::from_secs(30), cancel.clone());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(counter.hits.load(Ordering::SeqCst), 0, "first tick is skipped");

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.hits.load(Ordering::SeqCst), 2);

        cancel.cancel();
        handle.await.expect("poller exits cleanly");

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(counter.hits.load(Ordering::SeqCst), 2);
    }
}
