use std::time::Duration;

use crate::error::{ErrorCode, FlagGateError, Result};

/// How long a fetched snapshot is trusted before a refresh is required.
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(60);

/// How long to wait before retrying after a failed fetch.
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(300);

/// Minimum spacing between outbound fetch attempts.
pub const DEFAULT_MIN_FETCH_INTERVAL: Duration = Duration::from_secs(10);

pub const DEFAULT_FETCH_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_FETCH_OVERALL_TIMEOUT: Duration = Duration::from_secs(7);
pub const DEFAULT_FETCH_ATTEMPTS: u32 = 3;

pub const DEFAULT_STATS_FLUSH_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_STATS_UPLOAD_TIMEOUT: Duration = Duration::from_secs(15);

/// Environment variable checked for local-mode auto-detection.
pub const MODE_ENV_VAR: &str = "FLAGGATE_MODE";

/// Client configuration.
///
/// Every knob has a production default; overrides exist mainly for tests
/// and for tuning freshness against fetch volume.
#[derive(Debug, Clone)]
pub struct FlagGateOptions {
    /// Force local mode on or off. `None` detects it from the
    /// `FLAGGATE_MODE` environment variable.
    pub local: Option<bool>,

    /// Disable the stats collector entirely.
    pub disable_stats: bool,

    /// How long a successful snapshot stays fresh. Default: 1 minute.
    pub freshness_window: Duration,

    /// How long a failed fetch suppresses retries. Default: 5 minutes.
    pub error_backoff: Duration,

    /// Rate floor between fetch attempts. Default: 10 seconds.
    pub min_fetch_interval: Duration,

    /// Deadline for a single fetch request. Default: 3 seconds.
    pub fetch_attempt_timeout: Duration,

    /// Deadline for a whole fetch operation including retries. Default: 7 seconds.
    pub fetch_overall_timeout: Duration,

    /// Attempts inside the overall fetch deadline. Default: 3.
    pub fetch_attempts: u32,

    /// Interval between stats uploads. Default: 1 minute.
    pub stats_flush_interval: Duration,

    /// Deadline for a stats upload. Default: 15 seconds.
    pub stats_upload_timeout: Duration,
}

impl Default for FlagGateOptions {
    fn default() -> Self {
        Self {
            local: None,
            disable_stats: false,
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
            error_backoff: DEFAULT_ERROR_BACKOFF,
            min_fetch_interval: DEFAULT_MIN_FETCH_INTERVAL,
            fetch_attempt_timeout: DEFAULT_FETCH_ATTEMPT_TIMEOUT,
            fetch_overall_timeout: DEFAULT_FETCH_OVERALL_TIMEOUT,
            fetch_attempts: DEFAULT_FETCH_ATTEMPTS,
            stats_flush_interval: DEFAULT_STATS_FLUSH_INTERVAL,
            stats_upload_timeout: DEFAULT_STATS_UPLOAD_TIMEOUT,
        }
    }
}

impl FlagGateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> FlagGateOptionsBuilder {
        FlagGateOptionsBuilder::default()
    }

    /// Whether the client runs in local mode, either forced or detected
    /// from the environment.
    pub fn is_local(&self) -> bool {
        self.local.unwrap_or_else(detect_local)
    }

    pub fn validate(&self) -> Result<()> {
        if self.freshness_window.is_zero() {
            return Err(FlagGateError::config_error(
                ErrorCode::ConfigInvalidInterval,
                "freshness window must be positive",
            ));
        }

        if self.error_backoff.is_zero() {
            return Err(FlagGateError::config_error(
                ErrorCode::ConfigInvalidInterval,
                "error backoff must be positive",
            ));
        }

        if self.stats_flush_interval.is_zero() {
            return Err(FlagGateError::config_error(
                ErrorCode::ConfigInvalidInterval,
                "stats flush interval must be positive",
            ));
        }

        if self.fetch_attempts == 0 {
            return Err(FlagGateError::config_error(
                ErrorCode::ConfigInvalidInterval,
                "fetch attempts must be at least 1",
            ));
        }

        Ok(())
    }
}

fn detect_local() -> bool {
    std::env::var(MODE_ENV_VAR).is_ok_and(|mode| mode == "local")
}

/// Builder for [`FlagGateOptions`].
#[derive(Debug, Default)]
pub struct FlagGateOptionsBuilder {
    options: FlagGateOptions,
}

impl FlagGateOptionsBuilder {
    pub fn local(mut self, local: bool) -> Self {
        self.options.local = Some(local);
        self
    }

    pub fn disable_stats(mut self, disable: bool) -> Self {
        self.options.disable_stats = disable;
        self
    }

    pub fn freshness_window(mut self, window: Duration) -> Self {
        self.options.freshness_window = window;
        self
    }

    pub fn error_backoff(mut self, backoff: Duration) -> Self {
        self.options.error_backoff = backoff;
        self
    }

    pub fn min_fetch_interval(mut self, interval: Duration) -> Self {
        self.options.min_fetch_interval = interval;
        self
    }

    pub fn fetch_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.options.fetch_attempt_timeout = timeout;
        self
    }

    pub fn fetch_overall_timeout(mut self, timeout: Duration) -> Self {
        self.options.fetch_overall_timeout = timeout;
        self
    }

    pub fn fetch_attempts(mut self, attempts: u32) -> Self {
        self.options.fetch_attempts = attempts;
        self
    }

    pub fn stats_flush_interval(mut self, interval: Duration) -> Self {
        self.options.stats_flush_interval = interval;
        self
    }

    pub fn stats_upload_timeout(mut self, timeout: Duration) -> Self {
        self.options.stats_upload_timeout = timeout;
        self
    }

    pub fn build(self) -> FlagGateOptions {
        self.options
    }
}
