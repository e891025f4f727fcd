//! Integration tests for the bridge runtime: routing, dispatch,
//! discovery broadcast, and telemetry end to end.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use dab_bridge_framework::{Capability, DabBridge, Device, DeviceFactory};
use dab_common::{parse, Result, Value};

/// Test device overriding a small operation subset.
struct EchoTv {
    telemetry_ticks: Arc<AtomicUsize>,
}

impl EchoTv {
    fn new() -> Self {
        Self {
            telemetry_ticks: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Device for EchoTv {
    fn capabilities(&self) -> &[Capability] {
        &[
            Capability::AppList,
            Capability::AppLaunch,
            Capability::AppLaunchWithContent,
            Capability::DeviceInfo,
            Capability::DeviceTelemetry,
        ]
    }

    fn app_list(&mut self) -> Result<Value> {
        let mut reply = Value::default();
        reply.entry("applications").make_array()?;
        Ok(reply)
    }

    fn app_launch(&mut self, app_id: String, _parameters: Value) -> Result<Value> {
        Ok(Value::pair("appId", app_id))
    }

    fn app_launch_with_content(
        &mut self,
        app_id: String,
        content_id: String,
        _parameters: Value,
    ) -> Result<Value> {
        Ok(Value::from_literal(vec![
            Value::pair("appId", app_id),
            Value::pair("contentId", content_id),
        ]))
    }

    fn device_info(&mut self) -> Result<Value> {
        Ok(Value::pair("model", "echo"))
    }

    fn device_telemetry(&mut self) -> Result<Value> {
        self.telemetry_ticks.fetch_add(1, Ordering::SeqCst);
        Ok(Value::pair("tick", 1))
    }
}

fn echo_factory() -> DeviceFactory {
    DeviceFactory::new(|_ip| true, |_id, _ip| Box::new(EchoTv::new()))
}

fn bridge_with(device_ids: &[&str]) -> DabBridge {
    let mut bridge = DabBridge::new();
    bridge.register_factory(echo_factory());
    for (i, id) in device_ids.iter().enumerate() {
        let ip = format!("10.0.0.{}", i + 1);
        bridge.make_device_instance(id, Some(&ip)).unwrap();
    }
    bridge
}

fn request(text: &str) -> Value {
    parse(text).unwrap()
}

#[test]
fn test_op_list_reflects_overrides() {
    let bridge = bridge_with(&["tv1"]);
    let reply = bridge.dispatch(&request(r#"{"topic":"dab/tv1/operations/list"}"#));

    let ops: Vec<&str> = reply
        .get("operations")
        .unwrap()
        .elements()
        .unwrap()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(
        ops,
        vec![
            "applications/launch",
            "applications/launch-with-content",
            "applications/list",
            "device-telemetry/start",
            "device-telemetry/stop",
            "device/info",
            "operations/list",
            "version",
        ]
    );
    assert_eq!(reply.get("status").unwrap().as_i64().unwrap(), 200);
}

#[test]
fn test_op_list_with_two_overrides() {
    struct TwoOps;
    impl Device for TwoOps {
        fn capabilities(&self) -> &[Capability] {
            &[Capability::AppList, Capability::DeviceInfo]
        }
        fn app_list(&mut self) -> Result<Value> {
            Ok(Value::Null)
        }
        fn device_info(&mut self) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    let mut bridge = DabBridge::new();
    bridge.register_factory(DeviceFactory::new(|_ip| true, |_id, _ip| Box::new(TwoOps)));
    bridge.make_device_instance("tv1", None).unwrap();

    let reply = bridge.dispatch(&request(r#"{"topic":"dab/tv1/operations/list"}"#));
    assert_eq!(
        reply.serialize(true),
        r#"{"operations":["applications/list","device/info","operations/list","version"],"status":200}"#
    );
}

#[test]
fn test_app_launch_from_payload() {
    let bridge = bridge_with(&["tv1"]);
    let reply = bridge.dispatch(&request(
        r#"{"topic":"dab/tv1/applications/launch","payload":{"appId":"netflix"}}"#,
    ));
    assert_eq!(reply.serialize(true), r#"{"appId":"netflix","status":200}"#);
}

#[test]
fn test_payload_wins_over_top_level() {
    let bridge = bridge_with(&["tv1"]);
    let reply = bridge.dispatch(&request(
        r#"{"topic":"dab/tv1/applications/launch","appId":"outer","payload":{"appId":"inner"}}"#,
    ));
    assert_eq!(reply.get("appId").unwrap().as_str().unwrap(), "inner");
}

#[test]
fn test_missing_content_id() {
    let bridge = bridge_with(&["tv1"]);
    let reply = bridge.dispatch(&request(
        r#"{"topic":"dab/tv1/applications/launch-with-content","payload":{"appId":"netflix"}}"#,
    ));
    assert_eq!(reply.get("status").unwrap().as_i64().unwrap(), 400);
    assert_eq!(
        reply.get("error").unwrap().as_str().unwrap(),
        "missing parameter \"contentId\""
    );
}

#[test]
fn test_unimplemented_operation_is_501() {
    let bridge = bridge_with(&["tv1"]);
    let reply = bridge.dispatch(&request(
        r#"{"topic":"dab/tv1/input/key-press","payload":{"keyCode":"KEY_HOME"}}"#,
    ));
    assert_eq!(reply.get("status").unwrap().as_i64().unwrap(), 501);
    assert_eq!(reply.get("error").unwrap().as_str().unwrap(), "unsupported");
}

#[test]
fn test_version() {
    let bridge = bridge_with(&["X"]);
    let reply = bridge.dispatch(&request(r#"{"topic":"dab/X/version"}"#));
    assert_eq!(reply.serialize(true), r#"{"status":200,"versions":["2.0"]}"#);
}

#[test]
fn test_unknown_device_id() {
    let bridge = bridge_with(&["tv1"]);
    let reply = bridge.dispatch(&request(r#"{"topic":"dab/tv9/version"}"#));
    assert_eq!(reply.get("status").unwrap().as_i64().unwrap(), 400);
    assert_eq!(
        reply.get("error").unwrap().as_str().unwrap(),
        "deviceId does not exist"
    );
}

#[test]
fn test_malformed_topics() {
    let bridge = bridge_with(&["tv1"]);

    let reply = bridge.dispatch(&request(r#"{"topic":"dab/tv1"}"#));
    assert_eq!(
        reply.get("error").unwrap().as_str().unwrap(),
        "topic is malformed"
    );

    let reply = bridge.dispatch(&request(r#"{"topic":"nope/tv1/version"}"#));
    assert_eq!(
        reply.get("error").unwrap().as_str().unwrap(),
        "topic is malformed"
    );

    let reply = bridge.dispatch(&request(r#"{"payload":{}}"#));
    assert_eq!(
        reply.get("error").unwrap().as_str().unwrap(),
        "no topic found"
    );
}

#[test]
fn test_discovery_broadcast() {
    let bridge = bridge_with(&["a", "b", "c"]);

    let broadcast: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&broadcast);
    bridge.set_publish_callback(Arc::new(move |message: &Value| {
        sink.lock().unwrap().push(message.clone());
    }));

    let reply = bridge.dispatch(&request(r#"{"topic":"dab/discovery"}"#));

    // direct reply comes from the first device in id order
    assert_eq!(reply.get("deviceId").unwrap().as_str().unwrap(), "a");
    assert_eq!(reply.get("ip").unwrap().as_str().unwrap(), "10.0.0.1");
    assert_eq!(reply.get("status").unwrap().as_i64().unwrap(), 200);

    // the remaining devices surface through the publish callback
    let published = broadcast.lock().unwrap();
    let mut ids: Vec<String> = published
        .iter()
        .map(|m| m.get("deviceId").unwrap().as_str().unwrap().to_owned())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["b", "c"]);
}

#[test]
fn test_get_topics_appends_discovery() {
    let bridge = bridge_with(&["a", "b"]);
    let topics = bridge.get_topics();

    assert_eq!(topics.last().unwrap(), "dab/discovery");
    assert!(topics.contains(&"dab/a/version".to_owned()));
    assert!(topics.contains(&"dab/b/operations/list".to_owned()));
    // unimplemented operations are not subscribed
    assert!(!topics.contains(&"dab/a/voice/list".to_owned()));
}

#[test]
fn test_no_compatible_factory() {
    let mut bridge = DabBridge::new();
    bridge.register_factory(DeviceFactory::new(
        |ip| ip.starts_with("192.168."),
        |_id, _ip| Box::new(EchoTv::new()),
    ));
    let err = bridge.make_device_instance("tv1", Some("10.0.0.1")).unwrap_err();
    assert_eq!(err.status(), 400);
    assert_eq!(err.wire_message(), "no compatible devices found");
}

#[test]
fn test_on_device_mode_uses_first_factory() {
    let mut bridge = DabBridge::new();
    bridge.register_factory(DeviceFactory::new(
        |_ip| false,
        |_id, _ip| Box::new(EchoTv::new()),
    ));
    assert!(bridge.make_device_instance("tv1", None).is_ok());
    let reply = bridge.dispatch(&request(r#"{"topic":"dab/tv1/version"}"#));
    assert_eq!(reply.get("status").unwrap().as_i64().unwrap(), 200);
}

#[test]
fn test_device_telemetry_lifecycle() {
    let bridge = bridge_with(&["tv1"]);

    let published = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&published);
    bridge.set_publish_callback(Arc::new(move |message: &Value| {
        let topic = message.get("topic").unwrap().as_str().unwrap().to_owned();
        assert_eq!(topic, "dab/tv1/device-telemetry/metrics");
        assert!(message.get("payload").unwrap().has("tick"));
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    let reply = bridge.dispatch(&request(
        r#"{"topic":"dab/tv1/device-telemetry/start","payload":{"duration":50}}"#,
    ));
    assert_eq!(reply.serialize(true), r#"{"duration":50,"status":200}"#);

    thread::sleep(Duration::from_millis(200));
    assert!(published.load(Ordering::SeqCst) >= 2);

    let reply = bridge.dispatch(&request(r#"{"topic":"dab/tv1/device-telemetry/stop"}"#));
    assert_eq!(reply.serialize(true), r#"{"status":200}"#);

    // let an in-flight sampler drain before taking the baseline
    thread::sleep(Duration::from_millis(50));
    let settled = published.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(200));
    assert_eq!(published.load(Ordering::SeqCst), settled);
}

#[test]
fn test_second_start_updates_interval_without_overlap() {
    let bridge = bridge_with(&["tv1"]);

    let published = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&published);
    bridge.set_publish_callback(Arc::new(move |_: &Value| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    bridge.dispatch(&request(
        r#"{"topic":"dab/tv1/device-telemetry/start","payload":{"duration":40}}"#,
    ));
    thread::sleep(Duration::from_millis(100));
    bridge.dispatch(&request(
        r#"{"topic":"dab/tv1/device-telemetry/start","payload":{"duration":10000}}"#,
    ));
    thread::sleep(Duration::from_millis(60));
    let settled = published.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(300));

    // a single schedule remains and it now runs on the long interval
    assert!(published.load(Ordering::SeqCst) <= settled + 1);
}

#[test]
fn test_app_telemetry_unsupported_without_sampler() {
    let bridge = bridge_with(&["tv1"]);
    let reply = bridge.dispatch(&request(
        r#"{"topic":"dab/tv1/app-telemetry/start","payload":{"appId":"youtube","duration":30}}"#,
    ));
    assert_eq!(reply.get("status").unwrap().as_i64().unwrap(), 400);
    assert_eq!(
        reply.get("error").unwrap().as_str().unwrap(),
        "app telemetry not supported"
    );
}

#[test]
fn test_app_telemetry_topic_carries_app_id() {
    struct AppSampled;
    impl Device for AppSampled {
        fn capabilities(&self) -> &[Capability] {
            &[Capability::AppTelemetry]
        }
        fn app_telemetry(&mut self, app_id: String) -> Result<Value> {
            Ok(Value::pair("appId", app_id))
        }
    }

    let mut bridge = DabBridge::new();
    bridge.register_factory(DeviceFactory::new(|_ip| true, |_id, _ip| Box::new(AppSampled)));
    bridge.make_device_instance("tv2", None).unwrap();

    let topics: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&topics);
    bridge.set_publish_callback(Arc::new(move |message: &Value| {
        let topic = message.get("topic").unwrap().as_str().unwrap().to_owned();
        sink.lock().unwrap().push(topic);
    }));

    bridge.dispatch(&request(
        r#"{"topic":"dab/tv2/app-telemetry/start","payload":{"appId":"youtube","duration":30}}"#,
    ));
    thread::sleep(Duration::from_millis(120));
    bridge.dispatch(&request(
        r#"{"topic":"dab/tv2/app-telemetry/stop","payload":{"appId":"youtube"}}"#,
    ));

    let seen = topics.lock().unwrap();
    assert!(!seen.is_empty());
    assert!(seen
        .iter()
        .all(|t| t == "dab/tv2/app-telemetry/metrics/youtube"));
}
