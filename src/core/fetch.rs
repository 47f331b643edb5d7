//! Coalesced remote fetches with a rate floor and error backoff.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::FlagGateOptions;
use crate::core::store::FlagStore;
use crate::http::Transport;

/// Drives remote fetches and owns all writes to the [`FlagStore`].
///
/// Concurrent callers collapse into a single outbound request: the first
/// caller holds the in-flight guard while fetching, later callers wait on
/// the same guard and then observe the refreshed snapshot instead of
/// dispatching again.
pub struct FetchEngine {
    transport: Arc<dyn Transport>,
    store: Arc<FlagStore>,
    freshness_window: Duration,
    error_backoff: Duration,
    min_fetch_interval: Duration,
    /// In-flight guard. Staleness checks and the rate floor are evaluated
    /// only while holding it, so a check and its dispatch are atomic.
    flight: Mutex<FlightState>,
}

#[derive(Debug, Default)]
struct FlightState {
    /// Completion of the previous attempt, successful or not.
    last_attempt: Option<Instant>,
}

impl FetchEngine {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<FlagStore>, options: &FlagGateOptions) -> Self {
        Self {
            transport,
            store,
            freshness_window: options.freshness_window,
            error_backoff: options.error_backoff,
            min_fetch_interval: options.min_fetch_interval,
            flight: Mutex::new(FlightState::default()),
        }
    }

    /// Perform one logical fetch, skipping silently when an attempt
    /// completed less than the rate floor ago.
    pub async fn fetch(&self) {
        let mut flight = self.flight.lock().await;
        self.fetch_locked(&mut flight).await;
    }

    /// Fetch only if the snapshot is stale.
    ///
    /// The check runs again under the in-flight guard: a caller that
    /// waited behind another fetch sees the fresh snapshot and returns
    /// without a second request.
    pub async fn fetch_if_stale(&self) {
        if !self.store.is_stale() {
            return;
        }

        let mut flight = self.flight.lock().await;
        if !self.store.is_stale() {
            return;
        }
        self.fetch_locked(&mut flight).await;
    }

    async fn fetch_locked(&self, flight: &mut FlightState) {
        if let Some(last_attempt) = flight.last_attempt {
            let since = last_attempt.elapsed();
            if since < self.min_fetch_interval {
                tracing::debug!(?since, "skipping fetch, attempted too recently");
                return;
            }
        }

        tracing::debug!("fetching flags");
        match self.transport.fetch_flags().await {
            Ok(flags) => {
                tracing::debug!(count = flags.len(), "flag snapshot replaced");
                self.store.replace(flags, self.freshness_window);
            }
            Err(err) => {
                // Keep serving the previous flags; stale data beats no data.
                tracing::warn!(error = %err, "flag fetch failed");
                self.store.mark_failure(self.error_backoff);
            }
        }
        flight.last_attempt = Some(Instant::now());
    }
}
