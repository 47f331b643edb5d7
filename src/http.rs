//! Transport layer for the evaluation and stats endpoints.
//!
//! The [`Transport`] trait is the seam between the cache engine and the
//! wire: production uses [`HttpTransport`], tests substitute fakes with
//! scripted responses and request counters.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::time::timeout;
use url::Url;

use crate::config::FlagGateOptions;
use crate::error::{ErrorCode, FlagGateError, Result};
use crate::types::{FlagDefinition, StatsRequest};

/// Pause before retrying a timed-out fetch attempt.
const RETRY_PAUSE: Duration = Duration::from_secs(1);

/// Remote operations needed by the cache engine and the stats collector.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Download the full flag set for the configured project.
    async fn fetch_flags(&self) -> Result<Vec<FlagDefinition>>;

    /// Upload accumulated usage counters.
    async fn send_stats(&self, request: &StatsRequest) -> Result<()>;
}

/// HTTP implementation of [`Transport`] against the flag service.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    eval_url: Url,
    stats_url: Url,
    attempt_timeout: Duration,
    overall_timeout: Duration,
    attempts: u32,
    stats_timeout: Duration,
}

impl HttpTransport {
    pub fn new(server_url: &str, project: &str, options: &FlagGateOptions) -> Result<Self> {
        let base = Url::parse(server_url).map_err(|e| {
            FlagGateError::with_source(
                ErrorCode::ConfigInvalidUrl,
                format!("cannot parse server url {server_url:?}"),
                e,
            )
        })?;

        if !base.has_host() {
            return Err(FlagGateError::config_error(
                ErrorCode::ConfigInvalidUrl,
                format!("server url {server_url:?} has no host"),
            ));
        }

        let mut eval_url = endpoint(&base, "eval");
        eval_url.query_pairs_mut().append_pair("project", project);
        let stats_url = endpoint(&base, "stats");

        let client = reqwest::Client::builder().build().map_err(|e| {
            FlagGateError::with_source(ErrorCode::NetworkError, "cannot build http client", e)
        })?;

        Ok(Self {
            client,
            eval_url,
            stats_url,
            attempt_timeout: options.fetch_attempt_timeout,
            overall_timeout: options.fetch_overall_timeout,
            attempts: options.fetch_attempts,
            stats_timeout: options.stats_upload_timeout,
        })
    }

    async fn fetch_attempt(&self) -> Result<Vec<FlagDefinition>> {
        let response = self
            .client
            .get(self.eval_url.clone())
            .timeout(self.attempt_timeout)
            .send()
            .await
            .map_err(convert_error)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FlagGateError::new(
                ErrorCode::HttpBadStatus,
                format!("unexpected fetch status code {}", status.as_u16()),
            ));
        }

        response.json::<Vec<FlagDefinition>>().await.map_err(|e| {
            FlagGateError::with_source(ErrorCode::HttpInvalidResponse, "cannot decode flag response", e)
        })
    }

    async fn fetch_with_retries(&self) -> Result<Vec<FlagDefinition>> {
        let mut last_error = None;

        for attempt in 0..self.attempts {
            if attempt > 0 {
                tokio::time::sleep(RETRY_PAUSE).await;
            }

            match self.fetch_attempt().await {
                Ok(flags) => return Ok(flags),
                Err(err) if err.is_recoverable() => {
                    tracing::debug!(error = %err, attempt, "fetch attempt failed");
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error
            .unwrap_or_else(|| FlagGateError::new(ErrorCode::NetworkError, "fetch retries exhausted")))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch_flags(&self) -> Result<Vec<FlagDefinition>> {
        match timeout(self.overall_timeout, self.fetch_with_retries()).await {
            Ok(result) => result,
            Err(_) => Err(FlagGateError::new(
                ErrorCode::NetworkTimeout,
                "fetch exceeded the overall deadline",
            )),
        }
    }

    async fn send_stats(&self, request: &StatsRequest) -> Result<()> {
        let response = self
            .client
            .post(self.stats_url.clone())
            .timeout(self.stats_timeout)
            .json(request)
            .send()
            .await
            .map_err(convert_error)?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            status => Err(FlagGateError::new(
                ErrorCode::HttpBadStatus,
                format!("unexpected stats status code {}", status.as_u16()),
            )),
        }
    }
}

fn endpoint(base: &Url, segment: &str) -> Url {
    let mut url = base.clone();
    let path = format!("{}/{}", base.path().trim_end_matches('/'), segment);
    url.set_path(&path);
    url
}

fn convert_error(error: reqwest::Error) -> FlagGateError {
    if error.is_timeout() {
        FlagGateError::with_source(ErrorCode::NetworkTimeout, "request timed out", error)
    } else if error.is_connect() {
        FlagGateError::with_source(ErrorCode::NetworkError, "connection failed", error)
    } else {
        FlagGateError::with_source(ErrorCode::NetworkError, error.to_string(), error)
    }
}
