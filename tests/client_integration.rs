use httpmock::{Method::GET, MockServer};
use power_monitor::api;
use power_monitor::config::Config;
use power_monitor::http::{self, build_client};
use std::time::Instant;

fn cfg_for(base_url: &str) -> Config {
    Config {
        token: "t0ken".into(),
        api_url: base_url.to_string(),
        user_agent: "power-monitor-tests".into(),
        timeout_secs: 5,
        poll_interval_secs: 60,
    }
}

#[tokio::test]
async fn devices_sent_with_bearer_token() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/1/devices")
                .header("authorization", "Bearer t0ken");
            then.status(200)
                .header("X-Rate-Limit-Limit", "30")
                .header("X-Rate-Limit-Remaining", "28")
                .header("X-Rate-Limit-Reset", "1700000000")
                .json_body(serde_json::json!([
                    {"id": "dev-1", "name": "Remo Lite", "firmware_version": "Remo-lite/1.0.0"}
                ]));
        })
        .await;
    let cfg = cfg_for(&server.base_url());
    let client = build_client(&cfg)?;
    let ok = api::get_devices(&client, &cfg).await?;
    m.assert_async().await;
    assert_eq!(ok.value.len(), 1);
    assert_eq!(ok.value[0].name, "Remo Lite");
    assert_eq!(ok.rate.remaining, Some(28));
    assert_eq!(ok.rate.reset_at, Some(1_700_000_000));
    Ok(())
}

#[tokio::test]
async fn echonet_value_surfaced_unmodified() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let _m = server
        .mock_async(|when, then| {
            when.method(GET).path("/1/echonetlite/appliances");
            then.status(200).json_body(serde_json::json!({
                "appliances": [{
                    "id": "meter-1",
                    "nickname": "Smart Meter",
                    "type": "EL_SMART_METER",
                    "properties": [
                        {"epc": "e7", "val": "000002a3", "updated_at": "2025-01-01T00:00:00Z"},
                        {"epc": "e0", "val": "0012d687", "updated_at": "2025-01-01T00:00:00Z"}
                    ]
                }]
            }));
        })
        .await;
    let cfg = cfg_for(&server.base_url());
    let client = build_client(&cfg)?;
    let ok = api::get_echonetlite_appliances(&client, &cfg).await?;
    let meter = &ok.value[0];
    assert_eq!(meter.properties[0].val, "000002a3");
    let snap = power_monitor::echonet::MeterSnapshot::from_appliance(meter);
    assert_eq!(snap.power_watts, Some(0x2a3));
    assert_eq!(snap.normal_raw, Some(0x0012_d687));
    Ok(())
}

#[tokio::test]
async fn unauthorized_is_not_retried() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET).path("/1/devices");
            then.status(401).body("{\"code\":401001,\"message\":\"Unauthorized\"}");
        })
        .await;
    let cfg = cfg_for(&server.base_url());
    let client = build_client(&cfg)?;
    let err = api::get_devices(&client, &cfg).await.unwrap_err();
    assert!(err.is_unauthorized());
    assert!(err.message.contains("Unauthorized"));
    m.assert_hits_async(1).await;
    Ok(())
}

#[tokio::test]
async fn rate_limited_waits_for_reset_then_retries_once() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let reset = http::now_epoch() + 2;
    let reset_header = reset.to_string();
    let m = server
        .mock_async(|when, then| {
            when.method(GET).path("/1/devices");
            then.status(429)
                .header("X-Rate-Limit-Limit", "30")
                .header("X-Rate-Limit-Remaining", "0")
                .header("X-Rate-Limit-Reset", reset_header.as_str());
        })
        .await;
    let cfg = cfg_for(&server.base_url());
    let client = build_client(&cfg)?;
    let started = Instant::now();
    let err = api::get_devices(&client, &cfg).await.unwrap_err();
    assert_eq!(err.code, "rate_limited");
    m.assert_hits_async(2).await;
    // The retry must not happen before the reported reset.
    assert!(http::now_epoch() >= reset);
    assert!(started.elapsed().as_millis() >= 1_000);
    Ok(())
}

#[tokio::test]
async fn server_errors_retry_then_surface() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET).path("/1/appliances");
            then.status(503).body("maintenance");
        })
        .await;
    let cfg = cfg_for(&server.base_url());
    let client = build_client(&cfg)?;
    let err = api::get_appliances(&client, &cfg).await.unwrap_err();
    assert_eq!(err.code, "upstream_error");
    assert!(err.retriable);
    m.assert_hits_async(1 + http::MAX_NETWORK_RETRIES as usize).await;
    Ok(())
}

#[tokio::test]
async fn malformed_json_is_decode_error() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let _m = server
        .mock_async(|when, then| {
            when.method(GET).path("/1/users/me");
            then.status(200).body("not json");
        })
        .await;
    let cfg = cfg_for(&server.base_url());
    let client = build_client(&cfg)?;
    let err = api::get_user(&client, &cfg).await.unwrap_err();
    assert_eq!(err.code, "decode_error");
    assert!(!err.retriable);
    Ok(())
}

#[tokio::test]
async fn unreachable_host_is_network_error() -> anyhow::Result<()> {
    // Port 9 (discard) is not expected to be listening locally.
    let cfg = cfg_for("http://127.0.0.1:9");
    let client = build_client(&cfg)?;
    let err = api::get_devices(&client, &cfg).await.unwrap_err();
    assert_eq!(err.code, "network_error");
    assert!(err.retriable);
    Ok(())
}
