//! flaggate client SDK
//!
//! Cached feature-flag evaluation against a remote flag service, with an
//! access-rate-adaptive background refresh and per-minute usage stats.
//!
//! Evaluations never fail and never hang: they are answered from the
//! last-known snapshot, refreshed on demand (with coalescing of
//! concurrent refreshes) under bounded deadlines. When the service is
//! unreachable, cached flags keep serving until the error backoff
//! expires; a client that has never fetched answers `false` for every
//! flag.
//!
//! # Quick Start
//!
//! ```no_run
//! use flaggate::{FlagGateClient, FlagGateOptions};
//!
//! #[tokio::main]
//! async fn main() -> flaggate::Result<()> {
//!     let client = FlagGateClient::configure(
//!         "https://flags.example.com",
//!         "my-project",
//!         FlagGateOptions::default(),
//!     )?;
//!
//!     if client.is_enabled("new-checkout", Some("acme")).await {
//!         // feature path
//!     }
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod http;
pub mod types;

mod client;

pub use client::FlagGateClient;
pub use config::{FlagGateOptions, FlagGateOptionsBuilder};
pub use core::{AccessEvent, FetchEngine, FlagStore, RefreshScheduler, StatsAggregator};
pub use error::{ErrorCode, FlagGateError, Result};
pub use http::{HttpTransport, Transport};
pub use types::{FlagDefinition, StatEntry, StatsRequest, TenantOverride};
