//! Periodic expiry sweep for the PAR store, the parked authorize messages
//! and the in-memory replay cache.
//!
//! Lookups already ignore expired entries; the sweep only bounds memory and
//! table size.
use std::{sync::Arc, time::Duration};

use crate::services::auth::replay::InMemoryReplayCache;
use crate::services::message::AuthorizationMessageService;
use crate::services::par::PushedRequestService;

#[derive(Debug, Clone, Default)]
pub struct Sweeper {
    pushed: Option<PushedRequestService>,
    messages: Option<AuthorizationMessageService>,
    replay_cache: Option<Arc<InMemoryReplayCache>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub pushed_requests: u64,
    pub messages: u64,
    pub replay_entries: usize,
}

impl Sweeper {
    pub fn new(
        pushed: Option<PushedRequestService>,
        messages: Option<AuthorizationMessageService>,
        replay_cache: Option<Arc<InMemoryReplayCache>>,
    ) -> Self {
        Self {
            pushed,
            messages,
            replay_cache,
        }
    }

    /// One pass over every configured store. Failures are logged, not returned:
    /// the next tick tries again.
    pub async fn run_once(&self) -> SweepReport {
        let mut report = SweepReport::default();

        if let Some(pushed) = &self.pushed {
            match pushed.sweep().await {
                Ok(n) => report.pushed_requests = n,
                Err(e) => tracing::warn!(error = %e, "pushed request sweep failed"),
            }
        }
        if let Some(messages) = &self.messages {
            match messages.sweep().await {
                Ok(n) => report.messages = n,
                Err(e) => tracing::warn!(error = %e, "authorization message sweep failed"),
            }
        }
        if let Some(cache) = &self.replay_cache {
            report.replay_entries = cache.sweep();
        }

        if report != SweepReport::default() {
            tracing::debug!(
                pushed_requests = report.pushed_requests,
                messages = report.messages,
                replay_entries = report.replay_entries,
                "expired entries swept"
            );
        }
        report
    }

    /// Run `run_once` every `interval` until the returned handle is aborted.
    pub fn spawn(self, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.run_once().await;
            }
        })
    }
}
