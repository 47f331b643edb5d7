//! Background refresh loop with an access-rate-adaptive interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::core::fetch::FetchEngine;

/// Capacity of the access-notification queue. Senders wait when it is
/// full: accesses drive scheduling and must not be dropped.
pub const ACCESS_QUEUE_CAPACITY: usize = 100;

/// Recently queried clients refresh every 15 seconds.
const ACTIVE_INTERVAL: Duration = Duration::from_secs(15);
/// After five minutes without queries, relax to one minute.
const SETTLED_INTERVAL: Duration = Duration::from_secs(60);
/// After thirty minutes without queries, relax to five minutes.
const IDLE_INTERVAL: Duration = Duration::from_secs(300);

const ACTIVE_WINDOW: Duration = Duration::from_secs(5 * 60);
const SETTLED_WINDOW: Duration = Duration::from_secs(30 * 60);

/// Refresh interval for a given time since the last access.
/// `None` means the client has never been queried.
fn interval_for(since_access: Option<Duration>) -> Duration {
    match since_access {
        Some(since) if since < ACTIVE_WINDOW => ACTIVE_INTERVAL,
        Some(since) if since < SETTLED_WINDOW => SETTLED_INTERVAL,
        _ => IDLE_INTERVAL,
    }
}

/// Keeps the flag store warm by driving the [`FetchEngine`] on a timer
/// whose period adapts to observed query traffic.
///
/// Runs as a single background task. Every evaluation enqueues an access
/// notification; the loop records it and retunes the timer immediately,
/// so an idle client becomes responsive as soon as traffic resumes.
pub struct RefreshScheduler {
    engine: Arc<FetchEngine>,
    access_rx: mpsc::Receiver<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl RefreshScheduler {
    pub fn new(
        engine: Arc<FetchEngine>,
        access_rx: mpsc::Receiver<()>,
        shutdown_rx: mpsc::Receiver<()>,
    ) -> Self {
        Self {
            engine,
            access_rx,
            shutdown_rx,
        }
    }

    pub async fn run(mut self) {
        let mut last_access: Option<Instant> = None;
        let mut current = interval_for(None);
        let mut ticker = new_ticker(current);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tracing::debug!("background fetch");
                    self.engine.fetch().await;
                    retune(&mut ticker, &mut current, last_access);
                }
                received = self.access_rx.recv() => {
                    match received {
                        Some(()) => {
                            tracing::debug!("access registered");
                            last_access = Some(Instant::now());
                            retune(&mut ticker, &mut current, last_access);
                        }
                        // All evaluator handles are gone.
                        None => break,
                    }
                }
                _ = self.shutdown_rx.recv() => break,
            }
        }

        tracing::debug!("refresh scheduler stopped");
    }
}

fn new_ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Re-arm the timer only when the interval tier actually changed.
fn retune(ticker: &mut Interval, current: &mut Duration, last_access: Option<Instant>) {
    let next = interval_for(last_access.map(|at| at.elapsed()));
    if next != *current {
        tracing::debug!(old = ?*current, new = ?next, "adjusting refresh interval");
        *current = next;
        *ticker = new_ticker(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_tiers() {
        assert_eq!(interval_for(None), IDLE_INTERVAL);
        assert_eq!(interval_for(Some(Duration::ZERO)), ACTIVE_INTERVAL);
        assert_eq!(interval_for(Some(Duration::from_secs(299))), ACTIVE_INTERVAL);
        assert_eq!(interval_for(Some(Duration::from_secs(300))), SETTLED_INTERVAL);
        assert_eq!(interval_for(Some(Duration::from_secs(1799))), SETTLED_INTERVAL);
        assert_eq!(interval_for(Some(Duration::from_secs(1800))), IDLE_INTERVAL);
        assert_eq!(interval_for(Some(Duration::from_secs(86_400))), IDLE_INTERVAL);
    }
}
