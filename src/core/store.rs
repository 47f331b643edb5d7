use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

use crate::types::FlagDefinition;

/// The last-known flag set plus its staleness bookkeeping.
#[derive(Debug, Default)]
struct Snapshot {
    flags: Vec<FlagDefinition>,
    /// Instant after which the snapshot must be refreshed before being
    /// trusted. `None` until the first fetch outcome.
    stale_at: Option<Instant>,
    last_refresh: Option<Instant>,
}

/// Shared holder for the current [`Snapshot`].
///
/// Many evaluators read concurrently; only the fetch engine writes. The
/// snapshot is replaced wholesale, so readers see either the previous or
/// the new flag set, never a mix.
pub struct FlagStore {
    inner: RwLock<Snapshot>,
}

impl FlagStore {
    /// Create an empty store. An empty store is stale by definition.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Snapshot::default()),
        }
    }

    pub fn is_stale(&self) -> bool {
        match self.inner.read().stale_at {
            None => true,
            Some(stale_at) => Instant::now() >= stale_at,
        }
    }

    /// Replace the flag set after a successful fetch.
    pub fn replace(&self, flags: Vec<FlagDefinition>, freshness: Duration) {
        let now = Instant::now();
        let mut snapshot = self.inner.write();
        snapshot.flags = flags;
        snapshot.stale_at = Some(now + freshness);
        snapshot.last_refresh = Some(now);
    }

    /// Push the staleness deadline out after a failed fetch, keeping the
    /// existing flags untouched.
    pub fn mark_failure(&self, backoff: Duration) {
        let mut snapshot = self.inner.write();
        snapshot.stale_at = Some(Instant::now() + backoff);
    }

    pub fn last_refresh(&self) -> Option<Instant> {
        self.inner.read().last_refresh
    }

    /// Resolve a flag for an optional tenant against the current snapshot.
    ///
    /// Returns `None` when the flag code is not present.
    pub fn resolve(&self, code: &str, tenant: Option<&str>) -> Option<bool> {
        let snapshot = self.inner.read();
        snapshot
            .flags
            .iter()
            .find(|flag| flag.code == code)
            .map(|flag| flag.is_enabled_for(tenant))
    }

    pub fn len(&self) -> usize {
        self.inner.read().flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().flags.is_empty()
    }
}

impl Default for FlagStore {
    fn default() -> Self {
        Self::new()
    }
}
