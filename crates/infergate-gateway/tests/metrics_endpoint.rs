//! `/metrics` scrape behaviour over HTTP.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{
    config_for, dead_backend_url, BackendScript, MockBackend, NoSampler, SlowSampler, TestGateway,
};

fn line_value(text: &str, series: &str) -> Option<f64> {
    text.lines()
        .find(|l| l.starts_with(series) && l[series.len()..].starts_with(' '))
        .and_then(|l| l[series.len()..].trim().parse().ok())
}

#[tokio::test]
async fn scrape_shows_outcome_counter_and_latency() {
    let backend = MockBackend::start(BackendScript::ok(r#"{"predictions": [0]}"#)).await;
    let gw = TestGateway::start(config_for(&backend.url())).await;
    gw.predict(r#"{"x": 1}"#).await;

    let (ct, text) = gw.scrape().await;
    assert!(ct.starts_with("text/plain; version=0.0.4"));

    assert!(text.contains("# TYPE inference_requests_total counter"));
    assert_eq!(
        line_value(
            &text,
            r#"inference_requests_total{endpoint="/predict",http_status="200",method="POST"}"#
        ),
        Some(1.0)
    );
    assert_eq!(line_value(&text, "inference_request_duration_seconds_count"), Some(1.0));
    assert_eq!(
        line_value(&text, r#"inference_request_duration_seconds_bucket{le="+Inf"}"#),
        Some(1.0)
    );
    assert_eq!(line_value(&text, "inference_response_size_bytes_sum"), Some(20.0));
}

#[tokio::test]
async fn scrape_sets_host_gauges() {
    let backend = MockBackend::start(BackendScript::ok("{}")).await;
    let gw = TestGateway::start(config_for(&backend.url())).await;

    let (_, text) = gw.scrape().await;
    assert!(text.contains("# TYPE system_cpu_usage_percent gauge"));
    assert_eq!(line_value(&text, "system_cpu_usage_percent"), Some(10.0));
    assert_eq!(line_value(&text, "system_ram_usage_percent"), Some(42.5));
}

#[tokio::test]
async fn repeated_scrapes_without_traffic_only_move_host_gauges() {
    let backend = MockBackend::start(BackendScript::ok(r#"{"predictions": [0]}"#)).await;
    let gw = TestGateway::start(config_for(&backend.url())).await;
    gw.predict(r#"{"x": 1}"#).await;

    let (_, first) = gw.scrape().await;
    let (_, second) = gw.scrape().await;

    let without_host = |t: &str| -> Vec<String> {
        t.lines()
            .filter(|l| !l.starts_with("system_"))
            .map(str::to_owned)
            .collect()
    };
    assert_eq!(without_host(&first), without_host(&second));
    assert_ne!(
        line_value(&first, "system_cpu_usage_percent"),
        line_value(&second, "system_cpu_usage_percent")
    );
}

#[tokio::test]
async fn counters_never_decrease_between_scrapes() {
    let gw = TestGateway::start(config_for(&dead_backend_url().await)).await;
    let series = r#"inference_requests_total{endpoint="/predict",http_status="500",method="POST"}"#;

    let mut last = 0.0;
    for _ in 0..3 {
        gw.predict(r#"{"x": 1}"#).await;
        let (_, text) = gw.scrape().await;
        let v = line_value(&text, series).unwrap();
        assert!(v >= 0.0 && v.fract() == 0.0);
        assert!(v > last);
        last = v;
    }
    assert_eq!(last, 3.0);
}

#[tokio::test]
async fn sampling_failure_still_returns_a_document() {
    let backend = MockBackend::start(BackendScript::ok("{}")).await;
    let gw = TestGateway::start_with_sampler(config_for(&backend.url()), Arc::new(NoSampler)).await;

    let (_, text) = gw.scrape().await;
    assert_eq!(line_value(&text, "system_cpu_usage_percent"), Some(0.0));
    assert_eq!(line_value(&text, "system_ram_usage_percent"), Some(0.0));
    assert!(text.contains("# TYPE inference_request_size_bytes histogram"));
}

#[tokio::test]
async fn healthz_is_not_counted() {
    let backend = MockBackend::start(BackendScript::ok("{}")).await;
    let gw = TestGateway::start(config_for(&backend.url())).await;

    let resp = gw
        .client
        .get(format!("{}/healthz", gw.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.text().await.unwrap(), "ok");
    assert_eq!(gw.state.metrics().requests_total.total(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cpu_sampling_window_does_not_stall_predict() {
    let backend = MockBackend::start(BackendScript::ok(r#"{"predictions": [0]}"#)).await;
    let sampler = Arc::new(SlowSampler {
        delay: Duration::from_secs(1),
    });
    let gw = TestGateway::start_with_sampler(config_for(&backend.url()), sampler).await;

    let client = gw.client.clone();
    let url = format!("{}/metrics", gw.base);
    let scrape_started = Instant::now();
    let scrape = tokio::spawn(async move {
        let resp = client.get(url).send().await.unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        resp.text().await.unwrap()
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    let predict_started = Instant::now();
    let resp = gw.predict(r#"{"x": 1}"#).await;
    let predict_elapsed = predict_started.elapsed();
    assert_eq!(resp.status().as_u16(), 200);
    assert!(
        predict_elapsed < Duration::from_millis(500),
        "predict took {predict_elapsed:?} while a scrape was sampling"
    );
    assert!(!scrape.is_finished(), "scrape ended before its sampling window");

    let text = scrape.await.unwrap();
    assert!(scrape_started.elapsed() >= Duration::from_secs(1));
    assert_eq!(line_value(&text, "system_cpu_usage_percent"), Some(5.0));
    assert_eq!(
        line_value(
            &text,
            r#"inference_requests_total{endpoint="/predict",http_status="200",method="POST"}"#
        ),
        Some(1.0)
    );
}
