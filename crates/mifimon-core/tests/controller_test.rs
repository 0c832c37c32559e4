#![allow(clippy::unwrap_used, clippy::float_cmp)]

use std::time::Duration;

use chrono::Utc;
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio_stream::StreamExt;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mifimon_api::endpoints::SYSTEM_STATUS_FIELDS;
use mifimon_core::{
    ConnectionState, Controller, ControllerConfig, CoreError, Credentials, DeviceKind, MacAddress,
    UsageWindow,
};

const DEVICE_LIST_CMD: &str =
    "sta_info1,sta_info2,sta_info3,sta_info4,sta_info5,sta_info6,station_list";

const PHONE: &str = "tm:2025-11-27 18:42:09,mac:86:52:47:47:4e:0a,ipaddr:192.168.1.101,\
                     link_time:2hr46min4sec,rx_bytes:72986240,tx_bytes:667381878";
const LAPTOP: &str = "tm:2025-11-27 18:42:09,mac:3C:22:FB:10:20:30,ipaddr:192.168.1.102,\
                      link_time:5min,rx_bytes:1000,tx_bytes:2000";

// ── Helpers ─────────────────────────────────────────────────────────

fn config_for(server: &MockServer, with_credentials: bool) -> ControllerConfig {
    let addr = server.address();
    ControllerConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        credentials: with_credentials.then(|| Credentials {
            username: "admin".into(),
            password: SecretString::from("admin".to_string()),
        }),
        timeout: Duration::from_secs(2),
        measure_latency: false,
        ..ControllerConfig::default()
    }
}

fn device_list(slots: &[&str]) -> Value {
    let mut body = json!({ "station_list": [] });
    for n in 1..=6 {
        let raw = slots.get(n - 1).copied().unwrap_or("none");
        body[format!("sta_info{n}")] = json!(raw);
    }
    body
}

fn blank_list() -> Value {
    device_list(&["", "none", "", "", "none", ""])
}

async fn mount_login(server: &MockServer, cookie: Option<&str>, expected: u64) {
    let mut reply = ResponseTemplate::new(200).set_body_json(json!({ "result": "0" }));
    if let Some(cookie) = cookie {
        reply = reply.insert_header("Set-Cookie", format!("stok={cookie}; path=/"));
    }
    Mock::given(method("POST"))
        .and(path("/reqproc/proc_post"))
        .and(body_string_contains("goformId=LOGIN"))
        .respond_with(reply)
        .expect(expected)
        .mount(server)
        .await;
}

/// Station list, hostname list and status endpoints.
async fn mount_side_endpoints(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/reqproc/proc_get"))
        .and(query_param("cmd", "station_list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "station_list": [{ "mac_addr": "86:52:47:47:4E:0A", "hostname": "Pixel-8" }]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/reqproc/proc_get"))
        .and(query_param("cmd", "hostNameList"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "devices": [{ "mac": "3c:22:fb:10:20:30", "hostName": "work-laptop" }]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/reqproc/proc_get"))
        .and(query_param("cmd", SYSTEM_STATUS_FIELDS.join(",")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "network_provider": "Orange",
            "battery_charging": "1",
            "battery_vol_percent": "82",
            "signalbar": "4",
            "network_type": "LTE",
            "realtime_time": "10:50:51"
        })))
        .mount(server)
        .await;
}

async fn mount_device_list(server: &MockServer, body: Value, times: Option<u64>, priority: u8) {
    let mock = Mock::given(method("GET"))
        .and(path("/reqproc/proc_get"))
        .and(query_param("cmd", DEVICE_LIST_CMD))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .with_priority(priority);
    let mock = match times {
        Some(n) => mock.up_to_n_times(n),
        None => mock,
    };
    mock.mount(server).await;
}

// ── Poll cycle ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_poll_merges_devices_and_hostnames() {
    let server = MockServer::start().await;
    mount_login(&server, Some("tok"), 1).await;
    mount_side_endpoints(&server).await;
    mount_device_list(&server, device_list(&[PHONE, LAPTOP]), None, 5).await;

    let controller = Controller::new(config_for(&server, true));
    let devices = controller.poll_devices().await.unwrap();

    assert_eq!(devices.len(), 2);
    let phone = devices.iter().find(|d| d.mac.as_str() == "86:52:47:47:4e:0a").unwrap();
    assert_eq!(phone.hostname, "Pixel-8");
    assert_eq!(phone.kind, DeviceKind::Android);
    assert_eq!(phone.rx_bytes, 667_381_878);
    assert_eq!(phone.tx_bytes, 72_986_240);
    assert_eq!(phone.connected_secs, Some(9964));
    assert!(phone.is_connected);

    let laptop = devices.iter().find(|d| d.mac.as_str() == "3c:22:fb:10:20:30").unwrap();
    assert_eq!(laptop.hostname, "work-laptop");

    let status = controller.system_status().unwrap();
    assert_eq!(status.provider.as_deref(), Some("Orange"));
    assert_eq!(status.uptime_secs, 39051);

    assert_eq!(controller.devices_snapshot().len(), 2);
    assert_eq!(*controller.connection_state().borrow(), ConnectionState::Healthy);
}

#[tokio::test]
async fn test_blank_device_list_retries_once_after_relogin() {
    let server = MockServer::start().await;
    // Initial login plus the forced re-login.
    mount_login(&server, Some("tok"), 2).await;
    mount_side_endpoints(&server).await;
    mount_device_list(&server, blank_list(), Some(1), 1).await;
    mount_device_list(&server, device_list(&[PHONE]), None, 5).await;

    let controller = Controller::new(config_for(&server, true));
    let devices = controller.poll_devices().await.unwrap();
    assert_eq!(devices.len(), 1);
}

#[tokio::test]
async fn test_blank_list_under_fresh_session_means_no_devices() {
    let server = MockServer::start().await;
    mount_login(&server, Some("tok"), 2).await;
    mount_side_endpoints(&server).await;
    Mock::given(method("GET"))
        .and(query_param("cmd", DEVICE_LIST_CMD))
        .respond_with(ResponseTemplate::new(200).set_body_json(blank_list()))
        .expect(2)
        .mount(&server)
        .await;

    let controller = Controller::new(config_for(&server, true));
    let devices = controller.poll_devices().await.unwrap();
    assert!(devices.is_empty());
}

#[tokio::test]
async fn test_blank_list_without_session_is_session_expired() {
    let server = MockServer::start().await;
    mount_login(&server, None, 2).await;
    mount_side_endpoints(&server).await;
    Mock::given(method("GET"))
        .and(query_param("cmd", DEVICE_LIST_CMD))
        .respond_with(ResponseTemplate::new(200).set_body_json(blank_list()))
        .expect(2)
        .mount(&server)
        .await;

    let controller = Controller::new(config_for(&server, true));
    let err = controller.poll_devices().await.unwrap_err();
    assert!(matches!(err, CoreError::SessionExpired), "got {err:?}");
    assert_eq!(
        *controller.connection_state().borrow(),
        ConnectionState::Degraded { failures: 1 }
    );
}

#[tokio::test]
async fn test_blank_list_without_credentials_is_not_retried() {
    let server = MockServer::start().await;
    mount_side_endpoints(&server).await;
    Mock::given(method("GET"))
        .and(query_param("cmd", DEVICE_LIST_CMD))
        .respond_with(ResponseTemplate::new(200).set_body_json(blank_list()))
        .expect(1)
        .mount(&server)
        .await;

    let controller = Controller::new(config_for(&server, false));
    assert!(controller.poll_devices().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_cycle_keeps_last_good_data_and_drops_session() {
    let server = MockServer::start().await;
    mount_login(&server, Some("tok"), 1).await;
    mount_side_endpoints(&server).await;
    mount_device_list(&server, device_list(&[PHONE]), Some(1), 5).await;
    Mock::given(method("GET"))
        .and(query_param("cmd", DEVICE_LIST_CMD))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .with_priority(10)
        .mount(&server)
        .await;

    let controller = Controller::new(config_for(&server, true));
    controller.poll_devices().await.unwrap();
    assert!(controller.client().session().token().await.is_some());

    let err = controller.poll_devices().await.unwrap_err();
    assert!(matches!(err, CoreError::MalformedResponse { .. }), "got {err:?}");

    let store = controller.store();
    assert_eq!(store.device_count(), 1);
    assert!(store.last_error().is_some());
    assert!(store.data_age(Utc::now()).is_some());
    assert!(controller.client().session().token().await.is_none());
    assert_eq!(
        *controller.connection_state().borrow(),
        ConnectionState::Degraded { failures: 1 }
    );
}

#[tokio::test]
async fn test_vanished_device_is_reported_once() {
    let server = MockServer::start().await;
    mount_login(&server, Some("tok"), 1).await;
    mount_side_endpoints(&server).await;
    mount_device_list(&server, device_list(&[PHONE, LAPTOP]), Some(1), 1).await;
    mount_device_list(&server, device_list(&[PHONE]), None, 5).await;

    let controller = Controller::new(config_for(&server, true));
    controller.poll_devices().await.unwrap();

    let second = controller.poll_devices().await.unwrap();
    assert_eq!(second.len(), 2);
    let gone = second.iter().find(|d| !d.is_connected).unwrap();
    assert_eq!(gone.mac.as_str(), "3c:22:fb:10:20:30");
    assert_eq!((gone.download_speed, gone.upload_speed), (0.0, 0.0));
    assert_eq!(gone.latency_ms, 0);

    // The store carries the disconnect record for exactly one cycle.
    let listed: Vec<(String, bool)> = controller
        .devices_snapshot()
        .iter()
        .map(|d| (d.mac.to_string(), d.is_connected))
        .collect();
    assert_eq!(
        listed,
        vec![
            ("3c:22:fb:10:20:30".to_owned(), false),
            ("86:52:47:47:4e:0a".to_owned(), true),
        ]
    );

    let third = controller.poll_devices().await.unwrap();
    assert_eq!(third.len(), 1);
    assert!(third[0].is_connected);
    assert_eq!(controller.devices_snapshot().len(), 1);
}

#[tokio::test]
async fn test_cycle_is_stamped_when_it_starts() {
    let server = MockServer::start().await;
    mount_login(&server, Some("tok"), 1).await;
    mount_side_endpoints(&server).await;
    Mock::given(method("GET"))
        .and(query_param("cmd", DEVICE_LIST_CMD))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(device_list(&[PHONE]))
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&server)
        .await;

    let controller = Controller::new(config_for(&server, true));
    let before = Utc::now();
    let devices = controller.poll_devices().await.unwrap();
    let after = Utc::now();

    let stamped = devices[0].last_update;
    assert!(
        stamped - before < chrono::Duration::milliseconds(300),
        "stamped {stamped}, cycle started {before}"
    );
    assert!(after - stamped >= chrono::Duration::milliseconds(400));
    assert_eq!(controller.store().last_success(), Some(stamped));
}

#[tokio::test]
async fn test_unreachable_router_is_connection_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let controller = Controller::new(ControllerConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        timeout: Duration::from_millis(500),
        measure_latency: false,
        ..ControllerConfig::default()
    });
    let err = controller.poll_devices().await.unwrap_err();
    assert!(matches!(err, CoreError::ConnectionFailed { .. }), "got {err:?}");
    assert!(controller.store().data_age(Utc::now()).is_none());
}

// ── Usage ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_polls_feed_history_and_period() {
    let server = MockServer::start().await;
    mount_login(&server, Some("tok"), 1).await;
    mount_side_endpoints(&server).await;
    mount_device_list(&server, device_list(&[PHONE]), None, 5).await;

    let controller = Controller::new(config_for(&server, true));
    controller.poll_devices().await.unwrap();
    controller.poll_devices().await.unwrap();

    let mac = MacAddress::new("86:52:47:47:4E:0A");
    let summary = controller
        .usage_summary(&mac, UsageWindow::Day, Utc::now())
        .unwrap();
    assert_eq!(summary.samples, 2);
    assert_eq!(summary.downloaded, 0);
    assert_eq!(summary.avg_latency_ms, None);

    assert_eq!(controller.usage_period().await.day.peak_devices, 1);
    assert!(controller.history().load_period().is_none());

    controller.flush_usage(Utc::now()).await;
    let period = controller.usage_period().await;
    assert_eq!(controller.history().load_period(), Some(period));
    assert_eq!(controller.usage_summaries(UsageWindow::Month, Utc::now()).len(), 1);
}

#[tokio::test]
async fn test_polls_feed_device_activity() {
    let server = MockServer::start().await;
    mount_login(&server, Some("tok"), 1).await;
    mount_side_endpoints(&server).await;
    mount_device_list(&server, device_list(&[PHONE, LAPTOP]), None, 5).await;

    let controller = Controller::new(config_for(&server, true));
    controller.poll_devices().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    controller.poll_devices().await.unwrap();

    let activity = controller.device_activity(UsageWindow::Week).await;
    assert_eq!(activity.len(), 2);
    let (mac, phone) = activity
        .iter()
        .find(|(_, a)| a.hostname == "Pixel-8")
        .unwrap();
    assert_eq!(mac.as_str(), "86:52:47:47:4e:0a");
    assert!(phone.week.connected_ms >= 50, "{phone:?}");
    assert_eq!(phone.week.downloaded, 0);
}

#[tokio::test]
async fn test_flush_expires_history_of_departed_devices() {
    let server = MockServer::start().await;
    mount_login(&server, Some("tok"), 1).await;
    mount_side_endpoints(&server).await;
    mount_device_list(&server, device_list(&[PHONE]), None, 5).await;

    let mut config = config_for(&server, true);
    config.history_retention = Duration::from_secs(60);
    let controller = Controller::new(config);
    controller.poll_devices().await.unwrap();
    assert_eq!(controller.history().macs().len(), 1);

    controller.flush_usage(Utc::now()).await;
    assert_eq!(controller.history().macs().len(), 1);

    controller
        .flush_usage(Utc::now() + chrono::Duration::minutes(5))
        .await;
    assert!(controller.history().macs().is_empty());
}

// ── Status, latency, reboot ─────────────────────────────────────────

#[tokio::test]
async fn test_status_poll_updates_store() {
    let server = MockServer::start().await;
    mount_login(&server, Some("tok"), 1).await;
    mount_side_endpoints(&server).await;

    let controller = Controller::new(config_for(&server, true));
    let status = controller.poll_system_status().await.unwrap();
    assert!(status.charging);
    assert_eq!(status.battery_percent, Some(82));
    assert_eq!(status.signal_bars, Some(4));
    assert_eq!(controller.system_status().as_deref(), Some(&status));
    assert!(controller.usage_period().await.battery.is_none());
}

#[tokio::test]
async fn test_status_polls_track_battery_session() {
    let server = MockServer::start().await;
    mount_login(&server, Some("tok"), 1).await;
    Mock::given(method("GET"))
        .and(query_param("cmd", SYSTEM_STATUS_FIELDS.join(",")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "battery_charging": "0",
            "battery_vol_percent": "64",
            "realtime_time": "1:00:00"
        })))
        .mount(&server)
        .await;

    let controller = Controller::new(config_for(&server, true));
    let first = controller.poll_system_status().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = controller.poll_system_status().await.unwrap();

    let period = controller.usage_period().await;
    let session = period.battery.unwrap();
    assert_eq!(session.started, first.fetched_at);
    assert_eq!(session.last_seen, second.fetched_at);
    assert_eq!(session.start_percent, Some(64));
    let span = u64::try_from((second.fetched_at - first.fetched_at).num_milliseconds()).unwrap();
    assert_eq!(period.day.on_battery_ms, span);
}

#[tokio::test]
async fn test_latency_is_measured_alongside_device_poll() {
    let server = MockServer::start().await;
    mount_login(&server, Some("tok"), 1).await;
    mount_side_endpoints(&server).await;
    mount_device_list(&server, device_list(&[PHONE]), None, 5).await;
    Mock::given(method("GET"))
        .and(query_param("cmd", "wa_inner_version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "wa_inner_version": "x" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(&server, true);
    config.measure_latency = true;
    let controller = Controller::new(config);
    let devices = controller.poll_devices().await.unwrap();
    assert!(devices[0].latency_ms >= 0);
}

#[tokio::test]
async fn test_reboot_drops_session() {
    let server = MockServer::start().await;
    mount_login(&server, Some("tok"), 1).await;
    Mock::given(method("POST"))
        .and(path("/reqproc/proc_post"))
        .and(body_string_contains("goformId=REBOOT_DEVICE"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"result\":\"success\"}"))
        .expect(1)
        .mount(&server)
        .await;

    let controller = Controller::new(config_for(&server, true));
    controller.reboot().await.unwrap();
    assert!(controller.client().session().token().await.is_none());
}

// ── Background tasks ────────────────────────────────────────────────

#[tokio::test]
async fn test_background_poller_reaches_healthy_and_stops() {
    let server = MockServer::start().await;
    mount_login(&server, Some("tok"), 1).await;
    mount_side_endpoints(&server).await;
    mount_device_list(&server, device_list(&[PHONE]), None, 5).await;

    let mut config = config_for(&server, true);
    config.device_poll_interval = Duration::from_millis(100);
    config.status_poll_interval = Duration::from_millis(100);
    let controller = Controller::new(config);
    let mut state = controller.connection_state();
    let mut devices = controller.devices();

    controller.start().await;
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == ConnectionState::Healthy),
    )
    .await
    .unwrap()
    .unwrap();
    let snapshot = tokio::time::timeout(Duration::from_secs(5), devices.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.len(), 1);

    controller.shutdown().await;
    assert!(controller.usage_period().await.day.peak_devices >= 1);
    assert!(controller.history().load_period().is_some());
}
