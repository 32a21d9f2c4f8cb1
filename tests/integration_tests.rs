//! Integration tests for the netdiag engine
//!
//! Everything here runs against localhost: scanner tests bind their own
//! listeners, HTTP tests serve canned responses from local sockets, and
//! DNS tests exercise the cache contract rather than external zones.

use netdiag::{EngineConfig, NetworkEngine, PortScanner, RequestOptions};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve one canned HTTP response on an ephemeral local port
async fn serve_once(response: String) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    addr
}

#[tokio::test]
async fn test_scan_port_open_on_local_listener() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let scanner = PortScanner::default();
    let result = scanner.scan_port("127.0.0.1", port, 1.0).await;

    assert!(result.success);
    assert_eq!(result.data["reachable"], json!(true));
    assert_eq!(result.data["port"], json!(port));
    assert!(result.data["error"].is_null());
}

#[tokio::test]
async fn test_scan_port_closed_is_success_but_unreachable() {
    // Bind then drop to find a port that is almost certainly closed
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let scanner = PortScanner::default();
    let result = scanner.scan_port("127.0.0.1", port, 1.0).await;

    // Probe completion and reachability are orthogonal
    assert!(result.success);
    assert_eq!(result.data["reachable"], json!(false));
    assert!(result.data["error"].as_str().unwrap().len() > 0);
}

#[tokio::test]
async fn test_range_scan_caps_at_200_ports() {
    let scanner = PortScanner::default();
    let result = scanner
        .scan_ports_range("127.0.0.1", 1, 10_000, 0.2)
        .await;

    assert!(result.success);
    assert_eq!(result.data["start_port"], json!(1));
    assert_eq!(result.data["end_port"], json!(200));
    assert_eq!(result.metadata["requested_end_port"], json!(10_000));

    let total = result.data["total_scanned"].as_u64().unwrap();
    assert!(total <= 200);
}

#[tokio::test]
async fn test_range_scan_tallies_add_up() {
    let scanner = PortScanner::default();
    let result = scanner.scan_ports_range("127.0.0.1", 1, 100, 0.5).await;

    assert!(result.success);
    let open = result.data["open_count"].as_u64().unwrap();
    let closed = result.data["closed_count"].as_u64().unwrap();
    let total = result.data["total_scanned"].as_u64().unwrap();
    assert_eq!(open + closed, total);
    assert!(result.data["probe_errors"].as_array().unwrap().is_empty());
    assert!(result.data["scan_rate"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn test_range_scan_finds_local_listener() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let start = port.saturating_sub(2);
    let end = port.saturating_add(2);

    let scanner = PortScanner::default();
    let result = scanner.scan_ports_range("127.0.0.1", start, end, 1.0).await;

    assert!(result.success);
    let open_ports = result.data["open_ports"].as_array().unwrap();
    assert!(
        open_ports.iter().any(|p| p["port"] == json!(port)),
        "expected port {port} in {open_ports:?}"
    );
}

#[tokio::test]
async fn test_http_get_returns_raw_body() {
    let addr = serve_once(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         Content-Length: 5\r\n\
         Connection: close\r\n\
         \r\n\
         hello"
            .to_string(),
    )
    .await;

    let engine = NetworkEngine::default();
    let url = format!("http://{addr}/");
    let result = engine.execute("get_request", &json!({ "url": url })).await;

    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.data["status"], json!(200));
    assert_eq!(result.data["body"], json!("hello"));
    assert_eq!(result.data["size_bytes"], json!(5));
    assert_eq!(result.data["encoding"], json!("utf-8"));
    assert!(result.data["redirected_from"].is_null());
    assert!(result.data["response_time"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_http_url_normalization_is_not_a_redirect() {
    let addr = serve_once(
        "HTTP/1.1 200 OK\r\n\
         Content-Length: 2\r\n\
         Connection: close\r\n\
         \r\n\
         ok"
        .to_string(),
    )
    .await;

    let engine = NetworkEngine::default();
    // No trailing slash: the client normalizes this to "http://addr/"
    let url = format!("http://{addr}");
    let result = engine.execute("get_request", &json!({ "url": url })).await;

    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.data["status"], json!(200));
    assert!(result.data["redirected_from"].is_null());
    assert_eq!(result.data["url"], json!(format!("http://{addr}/")));
}

#[tokio::test]
async fn test_http_redirect_reports_origin_url() {
    let final_addr = serve_once(
        "HTTP/1.1 200 OK\r\n\
         Content-Length: 2\r\n\
         Connection: close\r\n\
         \r\n\
         ok"
        .to_string(),
    )
    .await;
    let redirect_addr = serve_once(format!(
        "HTTP/1.1 301 Moved Permanently\r\n\
         Location: http://{final_addr}/landed\r\n\
         Content-Length: 0\r\n\
         Connection: close\r\n\
         \r\n"
    ))
    .await;

    let engine = NetworkEngine::default();
    let url = format!("http://{redirect_addr}/");
    let result = engine.execute("get_request", &json!({ "url": url })).await;

    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.data["status"], json!(200));
    assert_eq!(result.data["redirected_from"], json!(url));
    assert_eq!(
        result.data["url"],
        json!(format!("http://{final_addr}/landed"))
    );
}

#[tokio::test]
async fn test_http_connection_refused_is_failed_envelope() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let engine = NetworkEngine::default();
    let result = engine
        .execute(
            "get_request",
            &json!({ "url": format!("http://127.0.0.1:{port}/"), "timeout": 2.0 }),
        )
        .await;

    assert!(!result.success);
    assert!(result.error.is_some());
    assert_eq!(result.data, Value::Null);
}

#[tokio::test]
async fn test_dns_failure_is_cached_and_replayed() {
    // Short resolver timeouts keep this test quick whether or not an
    // upstream DNS server is reachable; either way the lookup fails.
    let config = EngineConfig {
        dns_lookup_timeout_ms: 400,
        dns_overall_timeout_ms: 800,
        ..Default::default()
    };
    let engine = NetworkEngine::new(config).unwrap();

    let params = json!({"hostname": "no-such-host.invalid", "record_type": "A"});
    let first = engine.execute("resolve_dns", &params).await;
    assert!(!first.success);

    let second = engine.execute("resolve_dns", &params).await;
    assert_eq!(second, first);
    assert_eq!(second.timestamp, first.timestamp);
    assert_eq!(engine.dns().cache().len().await, 1);
}

#[tokio::test]
async fn test_dispatcher_forwards_oversized_timeout_as_failure() {
    // A finite timeout beyond Duration's range must come back as a failed
    // envelope from every action that accepts one, never a panic.
    let engine = NetworkEngine::default();

    let result = engine
        .execute(
            "scan_port",
            &json!({"host": "127.0.0.1", "port": 80, "timeout": 1.0e20}),
        )
        .await;
    assert!(!result.success);

    let result = engine
        .execute(
            "scan_ports_range",
            &json!({"host": "127.0.0.1", "start_port": 1, "end_port": 10, "timeout": 1.0e20}),
        )
        .await;
    assert!(!result.success);

    let result = engine
        .execute("ping_host", &json!({"host": "127.0.0.1", "timeout": 1.0e20}))
        .await;
    assert!(!result.success);

    let result = engine
        .execute(
            "get_request",
            &json!({"url": "http://127.0.0.1:1/", "timeout": 1.0e20}),
        )
        .await;
    assert!(!result.success);
}

#[tokio::test]
async fn test_dispatcher_unknown_action() {
    let engine = NetworkEngine::default();
    let result = engine.execute("nonexistent_action", &json!({})).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("nonexistent_action"));
}

#[tokio::test]
async fn test_dispatcher_scan_port_defaults() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let engine = NetworkEngine::default();
    let result = engine
        .execute("scan_port", &json!({"host": "127.0.0.1", "port": port}))
        .await;

    assert!(result.success);
    assert_eq!(result.data["reachable"], json!(true));
}

#[tokio::test]
async fn test_ping_host_envelope_shape() {
    let engine = NetworkEngine::default();
    let result = engine
        .execute("ping_host", &json!({"host": "127.0.0.1", "count": 1, "timeout": 2.0}))
        .await;

    // The ping binary may be absent in minimal environments; either way
    // the envelope contract holds.
    if result.success {
        assert_eq!(result.data["packets_sent"], json!(1));
        assert_eq!(result.data["host"], json!("127.0.0.1"));
    } else {
        assert!(result.error.is_some());
    }
}

#[tokio::test]
async fn test_http_executor_direct_options() {
    let addr = serve_once(
        "HTTP/1.1 204 No Content\r\n\
         Connection: close\r\n\
         \r\n"
        .to_string(),
    )
    .await;

    let executor = netdiag::HttpExecutor::new(&EngineConfig::default());
    let opts = RequestOptions {
        method: "delete".to_string(),
        ..Default::default()
    };
    let result = executor.execute(&format!("http://{addr}/item/1"), opts).await;

    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.data["status"], json!(204));
    assert_eq!(result.metadata["method"], json!("DELETE"));
}
