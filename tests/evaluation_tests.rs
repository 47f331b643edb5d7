use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use flaggate::{
    FlagDefinition, FlagGateClient, FlagGateOptions, Result, StatsRequest, TenantOverride, Transport,
};

struct FakeTransport {
    flags: Mutex<Vec<FlagDefinition>>,
    fetch_calls: AtomicUsize,
    fetch_delay: Duration,
}

impl FakeTransport {
    fn new(flags: Vec<FlagDefinition>) -> Self {
        Self {
            flags: Mutex::new(flags),
            fetch_calls: AtomicUsize::new(0),
            fetch_delay: Duration::ZERO,
        }
    }

    fn with_delay(flags: Vec<FlagDefinition>, delay: Duration) -> Self {
        Self {
            flags: Mutex::new(flags),
            fetch_calls: AtomicUsize::new(0),
            fetch_delay: delay,
        }
    }

    fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn fetch_flags(&self) -> Result<Vec<FlagDefinition>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        Ok(self.flags.lock().clone())
    }

    async fn send_stats(&self, _request: &StatsRequest) -> Result<()> {
        Ok(())
    }
}

fn flag(code: &str, enabled: bool, tenants: &[(&str, bool)]) -> FlagDefinition {
    FlagDefinition {
        code: code.to_string(),
        enabled,
        tenants: tenants
            .iter()
            .map(|(code, enabled)| TenantOverride {
                code: code.to_string(),
                enabled: *enabled,
            })
            .collect(),
    }
}

fn options() -> FlagGateOptions {
    FlagGateOptions::builder()
        .local(false)
        .disable_stats(true)
        .build()
}

fn client(transport: Arc<FakeTransport>) -> FlagGateClient {
    FlagGateClient::with_transport(transport, "test-project", options()).unwrap()
}

#[tokio::test(start_paused = true)]
async fn unknown_flag_is_disabled() {
    let transport = Arc::new(FakeTransport::new(vec![flag("present", true, &[])]));
    let client = client(Arc::clone(&transport));

    assert!(!client.is_enabled("missing", None).await);
    assert!(!client.is_enabled("missing", Some("acme")).await);

    client.close().await;
}

#[tokio::test(start_paused = true)]
async fn global_flag_applies_to_every_tenant() {
    let transport = Arc::new(FakeTransport::new(vec![
        flag("on", true, &[]),
        flag("off", false, &[]),
    ]));
    let client = client(Arc::clone(&transport));

    assert!(client.is_enabled("on", None).await);
    assert!(client.is_enabled("on", Some("acme")).await);
    assert!(!client.is_enabled("off", None).await);
    assert!(!client.is_enabled("off", Some("acme")).await);

    client.close().await;
}

#[tokio::test(start_paused = true)]
async fn disabled_flag_ignores_tenant_overrides() {
    let transport = Arc::new(FakeTransport::new(vec![flag(
        "killed",
        false,
        &[("acme", true)],
    )]));
    let client = client(Arc::clone(&transport));

    assert!(!client.is_enabled("killed", Some("acme")).await);
    assert!(!client.is_enabled("killed", None).await);

    client.close().await;
}

#[tokio::test(start_paused = true)]
async fn tenant_gated_flag_requires_matching_tenant() {
    let transport = Arc::new(FakeTransport::new(vec![flag(
        "gated",
        true,
        &[("acme", true), ("globex", false)],
    )]));
    let client = client(Arc::clone(&transport));

    assert!(client.is_enabled("gated", Some("acme")).await);
    assert!(!client.is_enabled("gated", Some("globex")).await);
    assert!(!client.is_enabled("gated", Some("initech")).await);
    assert!(!client.is_enabled("gated", None).await);

    client.close().await;
}

#[tokio::test(start_paused = true)]
async fn concurrent_evaluations_collapse_to_one_fetch() {
    let transport = Arc::new(FakeTransport::with_delay(
        vec![flag("beta", true, &[])],
        Duration::from_millis(100),
    ));
    let client = Arc::new(client(Arc::clone(&transport)));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let client = Arc::clone(&client);
        handles.push(tokio::spawn(async move {
            client.is_enabled("beta", None).await
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap());
    }
    assert_eq!(transport.fetch_calls(), 1);

    client.close().await;
}

#[tokio::test(start_paused = true)]
async fn fresh_snapshot_serves_without_refetching() {
    let transport = Arc::new(FakeTransport::new(vec![flag("beta", true, &[])]));
    let client = client(Arc::clone(&transport));

    assert!(client.is_enabled("beta", None).await);
    assert_eq!(transport.fetch_calls(), 1);

    for _ in 0..10 {
        assert!(client.is_enabled("beta", None).await);
    }
    assert_eq!(transport.fetch_calls(), 1);

    client.close().await;
}

#[tokio::test(start_paused = true)]
async fn updated_flags_are_visible_after_refresh() {
    let transport = Arc::new(FakeTransport::new(vec![flag("beta", true, &[])]));
    let options = FlagGateOptions::builder()
        .local(false)
        .disable_stats(true)
        .freshness_window(Duration::from_secs(30))
        .min_fetch_interval(Duration::from_secs(1))
        .build();
    let client = FlagGateClient::with_transport(transport.clone(), "p", options).unwrap();

    assert!(client.is_enabled("beta", None).await);

    *transport.flags.lock() = vec![flag("beta", false, &[])];
    tokio::time::advance(Duration::from_secs(31)).await;

    assert!(!client.is_enabled("beta", None).await);

    client.close().await;
}

#[tokio::test(start_paused = true)]
async fn closed_client_answers_from_last_snapshot() {
    let transport = Arc::new(FakeTransport::new(vec![flag("beta", true, &[])]));
    let client = client(Arc::clone(&transport));

    assert!(client.is_enabled("beta", None).await);
    assert_eq!(transport.fetch_calls(), 1);

    client.close().await;
    assert!(client.is_closed());

    // Long past staleness, but a closed client must not fetch.
    tokio::time::advance(Duration::from_secs(3600)).await;
    assert!(client.is_enabled("beta", None).await);
    assert!(!client.is_enabled("missing", None).await);
    assert_eq!(transport.fetch_calls(), 1);
}
