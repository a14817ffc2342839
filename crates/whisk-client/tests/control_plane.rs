//! Callback client against a fake control plane.
//!
//! The fake accepts one connection, captures the raw request, and answers
//! with a canned status and body.

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use whisk_client::CallbackClient;
use whisk_core::config::{API_HOST, API_KEY};
use whisk_core::{ActionError, ErrorKind, RuntimeConfig, SharedConfig};

const API_KEY_VALUE: &str = "user:secret";

struct Captured {
    head: String,
    body: String,
}

/// Start a one-shot fake server; returns its base URL and the captured request.
async fn fake_control_plane(
    status: u16,
    body: &'static str,
) -> (String, oneshot::Receiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        let header_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = find(&buf, b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
        let content_length = head
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .map(|v| v.trim().parse::<usize>().unwrap())
            .unwrap_or(0);

        while buf.len() < header_end + content_length {
            let n = socket.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
        }
        let req_body =
            String::from_utf8_lossy(&buf[header_end..header_end + content_length]).into_owned();

        let response = format!(
            "HTTP/1.1 {status} X\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();

        let _ = tx.send(Captured { head, body: req_body });
    });

    (format!("http://{addr}"), rx)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn client_for(host: &str, timeout_secs: u64) -> CallbackClient {
    let mut config = RuntimeConfig::default().with_vars([
        (API_HOST.to_string(), host.to_string()),
        (API_KEY.to_string(), API_KEY_VALUE.to_string()),
    ]);
    config.client.timeout_secs = timeout_secs;
    CallbackClient::new(SharedConfig::new(config)).unwrap()
}

#[tokio::test]
async fn blocking_invoke_posts_to_qualified_action() {
    let activation = r#"{"activationId":"a1","response":{"result":{"date":"today"}}}"#;
    let (host, captured) = fake_control_plane(200, activation).await;
    let client = client_for(&host, 5);

    let activation = client
        .invoke_action_async("/whisk.system/utils/date", &json!({"tz": "UTC"}), true)
        .await
        .unwrap();

    // returned verbatim, not unwrapped
    assert_eq!(activation["response"]["result"]["date"], json!("today"));

    let req = captured.await.unwrap();
    let expected = "post /api/v1/namespaces/whisk.system/actions/utils/date?blocking=true http/1.1";
    assert!(req.head.starts_with(expected), "{}", req.head);
    assert!(req.head.contains("content-type: application/json"));
    assert!(req.head.contains("authorization: basic dxnlcjpzzwnyzxq="), "{}", req.head);
    let sent: serde_json::Value = serde_json::from_str(&req.body).unwrap();
    assert_eq!(sent, json!({"tz": "UTC"}));
}

#[tokio::test]
async fn non_blocking_invoke_sets_query_flag() {
    let (host, captured) = fake_control_plane(202, r#"{"activationId":"a2"}"#).await;
    let client = client_for(&host, 5);

    let accepted = client.invoke_action_async("pkg/action", &json!({}), false).await.unwrap();
    assert_eq!(accepted["activationId"], json!("a2"));

    let req = captured.await.unwrap();
    let expected = "post /api/v1/namespaces/_/actions/pkg/action?blocking=false";
    assert!(req.head.starts_with(expected), "{}", req.head);
}

#[tokio::test]
async fn fire_trigger_posts_blocking() {
    let (host, captured) = fake_control_plane(200, r#"{"activationId":"t1"}"#).await;
    let client = client_for(&host, 5);

    client.fire_trigger_async("/guest/alarm", &json!({"n": 1})).await.unwrap();

    let req = captured.await.unwrap();
    let expected = "post /api/v1/namespaces/_/triggers/alarm?blocking=true";
    assert!(req.head.starts_with(expected), "{}", req.head);
}

#[tokio::test]
async fn create_trigger_puts_without_query() {
    let (host, captured) = fake_control_plane(200, r#"{"name":"alarm"}"#).await;
    let client = client_for(&host, 5);

    client.create_trigger_async("alarm", &json!({})).await.unwrap();

    let req = captured.await.unwrap();
    let expected = "put /api/v1/namespaces/_/triggers/alarm http/1.1";
    assert!(req.head.starts_with(expected), "{}", req.head);
}

#[tokio::test]
async fn create_rule_sends_trigger_and_action() {
    let (host, captured) = fake_control_plane(200, r#"{"name":"r1","status":"active"}"#).await;
    let client = client_for(&host, 5);

    let rule = client.create_rule_async("r1", "alarm", "hello").await.unwrap();
    assert_eq!(rule["status"], json!("active"));

    let req = captured.await.unwrap();
    assert!(req.head.starts_with("put /api/v1/namespaces/_/rules/r1 http/1.1"), "{}", req.head);
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(&req.body).unwrap(),
        json!({"trigger": "alarm", "action": "hello"})
    );
}

#[tokio::test]
async fn error_status_is_a_network_failure() {
    let (host, _captured) = fake_control_plane(502, r#"{"error":"action failed"}"#).await;
    let client = client_for(&host, 5);

    let err = client.invoke_action_async("hello", &json!({}), true).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NetworkFailure);
    assert!(matches!(err, ActionError::Status { status: 502, .. }));
}

#[tokio::test]
async fn non_object_response_is_reported() {
    let (host, _captured) = fake_control_plane(200, "[1,2,3]").await;
    let client = client_for(&host, 5);

    let err = client.invoke_action_async("hello", &json!({}), true).await.unwrap_err();
    assert_eq!(err.to_string(), "response from server is not a dictionary");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocking_surface_works_from_handler_threads() {
    let (host, _captured) = fake_control_plane(200, r#"{"activationId":"sync"}"#).await;
    let client = client_for(&host, 5);

    let result =
        tokio::task::spawn_blocking(move || client.invoke_action("hello", &json!({}), true))
            .await
            .unwrap();
    assert_eq!(result, json!({"activationId": "sync"}));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_host_yields_error_object() {
    // grab a free port, then close it
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(&format!("http://{addr}"), 5);
    let result =
        tokio::task::spawn_blocking(move || client.invoke_action("hello", &json!({}), true))
            .await
            .unwrap();

    let obj = result.as_object().unwrap();
    assert_eq!(obj.len(), 1);
    assert!(!obj["error"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
    });

    let client = client_for(&format!("http://{addr}"), 1);
    let err = client.invoke_action_async("hello", &json!({}), true).await.unwrap_err();
    assert!(matches!(err, ActionError::Timeout(1)));
    assert_eq!(err.kind(), ErrorKind::NetworkFailure);
}

#[tokio::test]
async fn projected_host_is_used_for_later_calls() {
    let (host, captured) = fake_control_plane(200, r#"{"ok":true}"#).await;
    let config = SharedConfig::new(RuntimeConfig::default().with_vars([
        (API_HOST.to_string(), "http://127.0.0.1:1".to_string()),
        (API_KEY.to_string(), API_KEY_VALUE.to_string()),
    ]));
    let client = CallbackClient::new(config.clone()).unwrap();

    let line = format!(r#"{{"value":{{}},"api_host":"{host}"}}"#);
    let record = whisk_core::InvocationRecord::parse(&line).unwrap();
    config.apply_invocation(&record);

    let ok = client.invoke_action_async("hello", &json!({}), true).await.unwrap();
    assert_eq!(ok["ok"], json!(true));
    captured.await.unwrap();
}
