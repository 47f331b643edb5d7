use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::FlagGateOptions;
use crate::core::{
    AccessEvent, FetchEngine, FlagStore, RefreshScheduler, StatsAggregator, ACCESS_QUEUE_CAPACITY,
    STATS_QUEUE_CAPACITY,
};
use crate::error::{ErrorCode, FlagGateError, Result};
use crate::http::{HttpTransport, Transport};

/// Handle to a configured flag client.
///
/// Construct one with [`FlagGateClient::configure`], share it by
/// reference (or inside an `Arc`) with every caller, and shut it down
/// with [`FlagGateClient::close`]. Evaluations are answered from a cached
/// snapshot; two background tasks keep the snapshot warm and ship usage
/// stats.
pub struct FlagGateClient {
    local: bool,
    store: Arc<FlagStore>,
    engine: Arc<FetchEngine>,
    access_tx: Option<mpsc::Sender<()>>,
    stats_tx: Option<mpsc::Sender<AccessEvent>>,
    background: Mutex<BackgroundTasks>,
    closed: AtomicBool,
    missing_warned: Mutex<HashSet<String>>,
}

impl std::fmt::Debug for FlagGateClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlagGateClient")
            .field("local", &self.local)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct BackgroundTasks {
    scheduler: Option<(mpsc::Sender<()>, JoinHandle<()>)>,
    stats: Option<(mpsc::Sender<()>, JoinHandle<()>)>,
}

impl FlagGateClient {
    /// Configure a client against the flag service.
    ///
    /// Validates the options and the server URL, then spawns the
    /// background refresh and stats tasks. Must be called within a Tokio
    /// runtime. In local mode no tasks are spawned and no network
    /// activity ever happens.
    pub fn configure(
        server_url: &str,
        project: &str,
        options: FlagGateOptions,
    ) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(server_url, project, &options)?);
        Self::with_transport(transport, project, options)
    }

    /// Configure a client over a custom [`Transport`].
    ///
    /// This is the seam used by tests; production callers normally go
    /// through [`FlagGateClient::configure`].
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        project: &str,
        options: FlagGateOptions,
    ) -> Result<Self> {
        options.validate()?;
        if project.is_empty() {
            return Err(FlagGateError::config_error(
                ErrorCode::ConfigMissingProject,
                "project is required",
            ));
        }

        let local = options.is_local();
        let store = Arc::new(FlagStore::new());
        let engine = Arc::new(FetchEngine::new(
            Arc::clone(&transport),
            Arc::clone(&store),
            &options,
        ));

        let mut client = Self {
            local,
            store,
            engine,
            access_tx: None,
            stats_tx: None,
            background: Mutex::new(BackgroundTasks::default()),
            closed: AtomicBool::new(false),
            missing_warned: Mutex::new(HashSet::new()),
        };

        if local {
            tracing::debug!("local mode, background tasks disabled");
            return Ok(client);
        }

        let (access_tx, access_rx) = mpsc::channel(ACCESS_QUEUE_CAPACITY);
        let (scheduler_shutdown_tx, scheduler_shutdown_rx) = mpsc::channel(1);
        let scheduler =
            RefreshScheduler::new(Arc::clone(&client.engine), access_rx, scheduler_shutdown_rx);
        let scheduler_handle = tokio::spawn(scheduler.run());
        client.access_tx = Some(access_tx);
        client.background.get_mut().scheduler = Some((scheduler_shutdown_tx, scheduler_handle));

        if !options.disable_stats {
            let (stats_tx, stats_rx) = mpsc::channel(STATS_QUEUE_CAPACITY);
            let (stats_shutdown_tx, stats_shutdown_rx) = mpsc::channel(1);
            let aggregator = StatsAggregator::new(
                transport,
                project,
                options.stats_flush_interval,
                stats_rx,
                stats_shutdown_rx,
            );
            let stats_handle = tokio::spawn(aggregator.run());
            client.stats_tx = Some(stats_tx);
            client.background.get_mut().stats = Some((stats_shutdown_tx, stats_handle));
        }

        Ok(client)
    }

    /// Whether the flag is enabled, optionally for a specific tenant.
    ///
    /// Answers from the cached snapshot, refreshing it first when stale;
    /// a slow or failing service degrades latency up to the fetch
    /// deadline but never fails the call. Unknown flags are disabled.
    pub async fn is_enabled(&self, code: &str, tenant: Option<&str>) -> bool {
        if self.local {
            return true;
        }

        if self.closed.load(Ordering::SeqCst) {
            tracing::warn!(flag = code, "is_enabled called on a closed client");
            return self.resolve(code, tenant);
        }

        self.engine.fetch_if_stale().await;

        let enabled = self.resolve(code, tenant);

        if let Some(access_tx) = &self.access_tx {
            // Waits when the queue is full; accesses drive the refresh
            // schedule and must not be lost.
            let _ = access_tx.send(()).await;
        }

        if let Some(stats_tx) = &self.stats_tx {
            let event = AccessEvent {
                flag: code.to_string(),
                enabled,
            };
            if stats_tx.try_send(event).is_err() {
                tracing::debug!(flag = code, "stats queue full, dropping access event");
            }
        }

        enabled
    }

    fn resolve(&self, code: &str, tenant: Option<&str>) -> bool {
        match self.store.resolve(code, tenant) {
            Some(enabled) => enabled,
            None => {
                if self.missing_warned.lock().insert(code.to_string()) {
                    tracing::warn!(flag = code, "feature flag not found");
                }
                false
            }
        }
    }

    /// Graceful shutdown: stops the refresh loop, flushes pending stats
    /// and waits for both background tasks to finish. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let (scheduler, stats) = {
            let mut background = self.background.lock();
            (background.scheduler.take(), background.stats.take())
        };

        if let Some((shutdown_tx, handle)) = scheduler {
            let _ = shutdown_tx.send(()).await;
            let _ = handle.await;
        }

        if let Some((shutdown_tx, handle)) = stats {
            let _ = shutdown_tx.send(()).await;
            let _ = handle.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
