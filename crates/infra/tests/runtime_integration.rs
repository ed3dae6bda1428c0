//! End-to-end runs of the wired runtime against local webhook servers.

mod support;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use healthhook_core::{DeliveryLogStore, SettingsStore};
use healthhook_domain::{
    FirePrecision, MetricType, ScheduledTrigger, SyncMode, SyncResult, WebhookEndpoint,
};
use healthhook_infra::HealthHookRuntime;
use serde_json::Value;
use support::{engine_config, utc, StaticSource};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn enable(runtime: &HealthHookRuntime, types: &[MetricType]) {
    let set: BTreeSet<_> = types.iter().copied().collect();
    runtime.store().set_enabled_metric_types(&set).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_posts_new_records_then_reports_no_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("X-Api-Key", "secret"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let source = StaticSource::new();
    source.push(MetricType::Steps, utc(2026, 5, 1, 8, 0), 1200);
    source.push(MetricType::Steps, utc(2026, 5, 1, 9, 0), 800);

    let runtime =
        HealthHookRuntime::start(engine_config(&dir, FirePrecision::Precise), source.clone())
            .await
            .unwrap();
    runtime
        .store()
        .set_endpoints(&[WebhookEndpoint::from_url(format!("{}/hook", server.uri()))
            .with_header("X-Api-Key", "secret")])
        .await
        .unwrap();
    enable(&runtime, &[MetricType::Steps]).await;

    let first = runtime.sync_now().await.unwrap();
    let second = runtime.sync_now().await.unwrap();

    let SyncResult::Success(counts) = first else { panic!("expected success, got {first:?}") };
    assert_eq!(counts.get(&MetricType::Steps), Some(&2));
    assert_eq!(second, SyncResult::NoData);

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["data_type"], "STEPS");
    assert_eq!(body["record_count"], 2);
    assert_eq!(body["records"].as_array().unwrap().len(), 2);
    assert!(requests[0]
        .headers
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("application/json"));

    let logs = runtime.store().delivery_logs().await.unwrap();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].success);
    assert_eq!(logs[0].record_count, Some(2));
    assert!(runtime.store().last_sync().await.unwrap().is_some());

    runtime.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn first_healthy_endpoint_wins() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&primary)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&secondary)
        .await;

    let dir = TempDir::new().unwrap();
    let source = StaticSource::new();
    source.push(MetricType::HeartRate, utc(2026, 5, 1, 8, 0), 61);

    let runtime = HealthHookRuntime::start(engine_config(&dir, FirePrecision::Precise), source)
        .await
        .unwrap();
    runtime
        .store()
        .set_endpoints(&[
            WebhookEndpoint::from_url(primary.uri()),
            WebhookEndpoint::from_url(secondary.uri()),
        ])
        .await
        .unwrap();
    enable(&runtime, &[MetricType::HeartRate]).await;

    runtime.sync_now().await.unwrap();

    runtime.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn triggers_are_restored_after_restart() {
    let dir = TempDir::new().unwrap();
    let config = engine_config(&dir, FirePrecision::Precise);

    let trigger = ScheduledTrigger::new(6, 45, "Early").unwrap();
    let key = trigger.registration_key();
    {
        let runtime =
            HealthHookRuntime::start(config.clone(), StaticSource::new()).await.unwrap();
        runtime.scheduler().add_trigger(trigger).await.unwrap();
        runtime.scheduler().switch_mode(SyncMode::Scheduled).await.unwrap();

        let keys: Vec<_> =
            runtime.scheduler().pending().await.unwrap().into_iter().map(|p| p.key).collect();
        assert_eq!(keys, vec![key.clone()]);
        runtime.shutdown().await.unwrap();
    }

    let restarted = HealthHookRuntime::start(config, StaticSource::new()).await.unwrap();
    let pending = restarted.scheduler().pending().await.unwrap();

    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].key, key);
    assert!(!pending[0].is_recurring());
    restarted.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn best_effort_backend_registers_interval_trigger() {
    let dir = TempDir::new().unwrap();
    let config = engine_config(&dir, FirePrecision::BestEffort);
    let runtime = HealthHookRuntime::start(config, StaticSource::new()).await.unwrap();

    runtime.scheduler().set_sync_interval(30).await.unwrap();

    let pending = runtime.scheduler().pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].key, "interval-sync");
    assert_eq!(pending[0].period, Some(Duration::from_secs(30 * 60)));

    runtime.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn granted_permission_enables_types_and_syncs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let source = StaticSource::new();
    source.grant_only(&[MetricType::Weight]);
    source.push(MetricType::Weight, utc(2026, 5, 2, 7, 0), 72);

    let runtime = Arc::new(
        HealthHookRuntime::start(engine_config(&dir, FirePrecision::Precise), source)
            .await
            .unwrap(),
    );
    runtime.store().set_endpoints(&[WebhookEndpoint::from_url(server.uri())]).await.unwrap();

    let waiter = {
        let runtime = Arc::clone(&runtime);
        tokio::spawn(async move { runtime.sync_after_permission().await })
    };
    while !runtime.permissions().is_pending() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(runtime.permissions().resolve(true));

    let outcome = waiter.await.unwrap().unwrap();
    assert_eq!(outcome.map(|r| r.total_records()), Some(1));
    assert_eq!(
        runtime.store().enabled_metric_types().await.unwrap(),
        [MetricType::Weight].into_iter().collect()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn denied_permission_skips_sync() {
    let dir = TempDir::new().unwrap();
    let runtime = Arc::new(
        HealthHookRuntime::start(engine_config(&dir, FirePrecision::Precise), StaticSource::new())
            .await
            .unwrap(),
    );

    let waiter = {
        let runtime = Arc::clone(&runtime);
        tokio::spawn(async move { runtime.sync_after_permission().await })
    };
    while !runtime.permissions().is_pending() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    runtime.permissions().resolve(false);

    assert_eq!(waiter.await.unwrap().unwrap(), None);
}
