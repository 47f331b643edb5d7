//! Usage-telemetry aggregation and upload.
//!
//! Evaluations feed lightweight access events through a bounded queue;
//! a single background task folds them into per-flag, per-minute hit
//! counters and uploads the accumulated buckets once a minute. Telemetry
//! is best effort: events may be dropped under overload and upload
//! failures only delay delivery.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::http::Transport;
use crate::types::{StatEntry, StatsRequest};

/// Capacity of the access-event queue. Full queue drops events.
pub const STATS_QUEUE_CAPACITY: usize = 500;

/// Buckets older than this are discarded when uploads keep failing,
/// bounding memory during a prolonged stats-endpoint outage.
pub const RETENTION_CEILING: Duration = Duration::from_secs(20 * 60 * 60);

/// One flag evaluation, as seen by the stats collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessEvent {
    pub flag: String,
    pub enabled: bool,
}

#[derive(Debug, Default)]
struct BucketStats {
    total_hits: i64,
    enabled_hits: i64,
}

#[derive(Debug, Default)]
struct FlagStats {
    /// Keyed by minute-truncated epoch milliseconds.
    buckets: HashMap<i64, BucketStats>,
}

/// Truncate a wall-clock instant to its minute bucket, in epoch millis.
fn minute_bucket(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis() / 60_000 * 60_000
}

/// Consumes [`AccessEvent`]s into minute buckets and uploads them.
///
/// The bucket maps are owned by the single consuming task; nothing else
/// mutates them, so they need no lock.
pub struct StatsAggregator {
    transport: Arc<dyn Transport>,
    project: String,
    flush_interval: Duration,
    events_rx: mpsc::Receiver<AccessEvent>,
    shutdown_rx: mpsc::Receiver<()>,
    stats: HashMap<String, FlagStats>,
}

impl StatsAggregator {
    pub fn new(
        transport: Arc<dyn Transport>,
        project: impl Into<String>,
        flush_interval: Duration,
        events_rx: mpsc::Receiver<AccessEvent>,
        shutdown_rx: mpsc::Receiver<()>,
    ) -> Self {
        Self {
            transport,
            project: project.into(),
            flush_interval,
            events_rx,
            shutdown_rx,
            stats: HashMap::new(),
        }
    }

    pub async fn run(mut self) {
        tracing::info!("stats collector enabled");

        let mut ticker = interval_at(Instant::now() + self.flush_interval, self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.flush().await;
                }
                event = self.events_rx.recv() => {
                    match event {
                        Some(event) => self.record(event),
                        None => {
                            self.drain_and_flush().await;
                            break;
                        }
                    }
                }
                _ = self.shutdown_rx.recv() => {
                    self.drain_and_flush().await;
                    break;
                }
            }
        }

        tracing::debug!("stats collector stopped");
    }

    fn record(&mut self, event: AccessEvent) {
        self.record_at(event, minute_bucket(Utc::now()));
    }

    fn record_at(&mut self, event: AccessEvent, bucket: i64) {
        let flag_stats = self.stats.entry(event.flag).or_default();
        let bucket_stats = flag_stats.buckets.entry(bucket).or_default();
        bucket_stats.total_hits += 1;
        if event.enabled {
            bucket_stats.enabled_hits += 1;
        }
    }

    /// Final flush: fold in whatever is still queued, then upload once.
    async fn drain_and_flush(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.record(event);
        }
        self.flush().await;
    }

    /// Upload all accumulated buckets in one request. Cleared on success,
    /// retained (and pruned past the retention ceiling) on failure.
    async fn flush(&mut self) {
        if self.stats.is_empty() {
            return;
        }

        tracing::debug!("sending stats");

        let request = StatsRequest {
            project: self.project.clone(),
            stats: self.entries(),
        };

        match self.transport.send_stats(&request).await {
            Ok(()) => {
                self.stats.clear();
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to send stats");
                let cutoff = minute_bucket(Utc::now()) - RETENTION_CEILING.as_millis() as i64;
                self.prune(cutoff);
            }
        }
    }

    fn entries(&self) -> Vec<StatEntry> {
        let mut entries = Vec::new();
        for (flag, flag_stats) in &self.stats {
            for (bucket, bucket_stats) in &flag_stats.buckets {
                entries.push(StatEntry {
                    bucket: *bucket,
                    flag: flag.clone(),
                    enabled_hits: bucket_stats.enabled_hits,
                    total_hits: bucket_stats.total_hits,
                });
            }
        }
        entries
    }

    fn prune(&mut self, cutoff: i64) {
        for flag_stats in self.stats.values_mut() {
            flag_stats.buckets.retain(|bucket, _| *bucket >= cutoff);
        }
        self.stats.retain(|_, flag_stats| !flag_stats.buckets.is_empty());
    }
}
