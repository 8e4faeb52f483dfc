//! Command surface tests

use notification_relay::{
    CommandHandler, CommandRequest, LineWriter, MemoryPlatform, MemorySmsInbox, RawNotification,
    RelayConfig, RelayServer, RelayService, SmsMessage,
};
use serde_json::{json, Value};
use std::io::Write;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SharedBuf {
    fn lines(&self) -> Vec<Value> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }
}

struct Harness {
    relay: RelayService,
    platform: Arc<MemoryPlatform>,
    inbox: Arc<MemorySmsInbox>,
    out: SharedBuf,
    writer: Arc<LineWriter>,
    handler: CommandHandler,
}

fn harness() -> Harness {
    let (platform, rx) = MemoryPlatform::new("com.example.notification_relay");
    let relay = RelayService::spawn(RelayConfig::default(), platform.clone());
    relay.spawn_event_pump(rx);
    let inbox = Arc::new(MemorySmsInbox::default());
    let out = SharedBuf::default();
    let writer = Arc::new(LineWriter::new(Box::new(out.clone())));
    let handler = CommandHandler::new(relay.clone(), platform.clone(), inbox.clone(), writer.clone());
    Harness { relay, platform, inbox, out, writer, handler }
}

fn request(method: &str, params: Option<Value>) -> CommandRequest {
    CommandRequest {
        id: Some(json!(1)),
        method: method.to_string(),
        params,
    }
}

#[tokio::test]
async fn test_start_and_stop_service() {
    let h = harness();

    let response = h.handler.handle(request("startBackgroundService", None));
    assert_eq!(response.result, Some(json!(true)));
    assert!(h.relay.supervisor().is_running());

    let response = h.handler.handle(request("stopBackgroundService", None));
    assert_eq!(response.result, Some(json!(true)));
    assert!(!h.relay.supervisor().is_running());
}

#[tokio::test]
async fn test_start_failure_maps_to_error_code() {
    let h = harness();
    h.platform.fail_register(true);

    let response = h.handler.handle(request("startBackgroundService", None));
    assert!(response.result.is_none());
    let error = response.error.unwrap();
    assert_eq!(error.code, "SERVICE_START_ERROR");
    assert!(error.message.contains("refused"));
}

#[tokio::test]
async fn test_check_notification_access() {
    let h = harness();
    assert_eq!(
        h.handler.handle(request("checkNotificationAccess", None)).result,
        Some(json!(true))
    );

    h.platform.set_access(false);
    assert_eq!(
        h.handler.handle(request("checkNotificationAccess", None)).result,
        Some(json!(false))
    );

    h.platform.fail_access(true);
    let error = h.handler.handle(request("checkNotificationAccess", None)).error.unwrap();
    assert_eq!(error.code, "NOTIFICATION_ACCESS_ERROR");
}

#[tokio::test]
async fn test_get_sms_messages_newest_first() {
    let h = harness();
    h.inbox.push(SmsMessage::inbox("1", "+100", "first", 100));
    h.inbox.push(SmsMessage::inbox("2", "+100", "second", 200));
    h.inbox.push(SmsMessage::inbox("3", "+100", "third", 300));

    let result = h
        .handler
        .handle(request("getSmsMessages", Some(json!({"limit": 2}))))
        .result
        .unwrap();
    let bodies: Vec<&str> = result
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["body"].as_str().unwrap())
        .collect();
    assert_eq!(bodies, vec!["third", "second"]);
    assert_eq!(result[0]["type"], "inbox");
}

#[tokio::test]
async fn test_get_sms_failure() {
    let h = harness();
    h.inbox.set_failing(true);
    let error = h.handler.handle(request("getSmsMessages", None)).error.unwrap();
    assert_eq!(error.code, "SMS_READ_ERROR");
}

#[tokio::test]
async fn test_clear_requires_running_relay() {
    let h = harness();
    assert_eq!(
        h.handler.handle(request("clearSystemNotifications", None)).result,
        Some(json!(false))
    );

    h.handler.handle(request("startBackgroundService", None));
    assert_eq!(
        h.handler.handle(request("clearSystemNotifications", None)).result,
        Some(json!(true))
    );
}

#[tokio::test]
async fn test_clear_failure_maps_to_error_code() {
    let h = harness();
    h.handler.handle(request("startBackgroundService", None));
    h.platform.fail_active(true);

    let error = h.handler.handle(request("clearSystemNotifications", None)).error.unwrap();
    assert_eq!(error.code, "CLEAR_ERROR");
}

#[tokio::test]
async fn test_unknown_method_not_implemented() {
    let h = harness();
    let response = h.handler.handle(request("reboot", None));
    assert_eq!(response.id, Some(json!(1)));
    assert_eq!(response.error.unwrap().code, "NOT_IMPLEMENTED");
}

#[tokio::test]
async fn test_listen_streams_events_until_cancel() {
    let h = harness();
    h.handler.handle(request("startBackgroundService", None));
    h.handler.handle(request("listen", None));

    h.relay.handle_event(notification_relay::PlatformEvent::Posted(RawNotification::new(5, "com.a", 1)));
    h.relay.settle().await;

    h.handler.handle(request("cancel", None));
    h.relay.handle_event(notification_relay::PlatformEvent::Posted(RawNotification::new(6, "com.a", 1)));
    h.relay.settle().await;

    let events: Vec<Value> = h
        .out
        .lines()
        .into_iter()
        .filter_map(|line| line.get("event").cloned())
        .collect();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["id"], 5);
}

#[tokio::test]
async fn test_server_loop_answers_every_line() {
    let h = harness();
    let server = RelayServer::new(h.handler, h.writer.clone());

    let input = concat!(
        r#"{"id": 1, "method": "checkNotificationAccess"}"#,
        "\n",
        "\n",
        "not json\n",
        r#"{"id": "b", "method": "startBackgroundService"}"#,
        "\n",
    );
    server
        .run(tokio::io::BufReader::new(input.as_bytes()))
        .await
        .unwrap();

    let lines = h.out.lines();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], json!({"id": 1, "result": true}));
    assert_eq!(lines[1]["id"], Value::Null);
    assert_eq!(lines[1]["error"]["code"], "GENERAL_ERROR");
    assert_eq!(lines[2], json!({"id": "b", "result": true}));
    assert!(h.relay.supervisor().is_running());
}

#[tokio::test]
async fn test_invalid_utf8_line_does_not_stop_server() {
    let h = harness();
    let server = RelayServer::new(h.handler, h.writer.clone());

    let mut input: Vec<u8> = b"\xff\xfe\n".to_vec();
    input.extend_from_slice(br#"{"id": 1, "method": "startBackgroundService"}"#);
    input.push(b'\n');
    server
        .run(tokio::io::BufReader::new(input.as_slice()))
        .await
        .unwrap();

    let lines = h.out.lines();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["error"]["code"], "GENERAL_ERROR");
    assert_eq!(lines[1], json!({"id": 1, "result": true}));
    assert!(h.relay.supervisor().is_running());
}
