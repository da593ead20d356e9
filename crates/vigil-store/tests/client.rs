//! StoreClient behavior against a local fake store endpoint.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};

use vigil_store::{CaptureRecord, StoreClient, StoreConfig, StoreError};

fn record() -> CaptureRecord {
    CaptureRecord {
        timestamp: "2026-08-23 09:00:00".into(),
        image_name: "frame_0.jpg".into(),
        device_id: "ESP32-CAM-01".into(),
        has_detections: false,
        detected_count: 0,
        classes: Vec::new(),
        image_base64: String::new(),
    }
}

/// Read one HTTP request (headers + content-length body) off the socket.
fn read_http_request(stream: &mut TcpStream) -> (String, Vec<u8>) {
    let mut raw = Vec::new();
    let mut byte = [0u8; 1];
    while stream.read(&mut byte).map(|n| n == 1).unwrap_or(false) {
        raw.push(byte[0]);
        if raw.ends_with(b"\r\n\r\n") {
            break;
        }
    }
    let head = String::from_utf8_lossy(&raw).to_string();
    let content_length = head
        .lines()
        .find_map(|l| {
            let lower = l.to_ascii_lowercase();
            lower
                .strip_prefix("content-length:")
                .map(|v| v.trim().to_string())
        })
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        stream.read_exact(&mut body).expect("body");
    }
    (head, body)
}

fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let reply = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(reply.as_bytes()).expect("write reply");
}

fn local_client(base_url: String, api_key: Option<String>) -> StoreClient {
    let mut config = StoreConfig::new("test-project", "IOT");
    config.base_url = base_url;
    config.api_key = api_key;
    StoreClient::new(config).expect("client")
}

#[test]
fn publish_posts_a_typed_document_to_the_collection() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");

    let server = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let (head, body) = read_http_request(&mut stream);
        respond(&mut stream, "200 OK", "{}");
        (head, body)
    });

    let client = local_client(format!("http://{addr}"), None);
    client.publish(&record()).expect("publish");

    let (head, body) = server.join().expect("server");
    assert!(head.starts_with("POST /v1/projects/test-project/databases/(default)/documents/IOT"));
    let sent: serde_json::Value = serde_json::from_slice(&body).expect("json body");
    assert_eq!(sent["fields"]["device_id"]["stringValue"], "ESP32-CAM-01");
}

#[test]
fn publish_surfaces_non_success_status() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");

    let server = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let _ = read_http_request(&mut stream);
        respond(&mut stream, "503 Service Unavailable", "{}");
    });

    let client = local_client(format!("http://{addr}"), None);
    let err = client.publish(&record()).expect_err("must fail");
    assert!(matches!(err, StoreError::Status(s) if s.as_u16() == 503));
    server.join().expect("server");
}

#[test]
fn fetch_latest_returns_the_newest_document() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");

    let listing = serde_json::json!({
        "documents": [
            { "fields": { "timestamp": { "stringValue": "2026-08-23 08:00:00" },
                          "device_id": { "stringValue": "stale" } } },
            { "fields": { "timestamp": { "stringValue": "2026-08-23 09:30:00" },
                          "device_id": { "stringValue": "fresh" },
                          "detected_count": { "integerValue": "8" },
                          "has_detections": { "booleanValue": true } } }
        ]
    })
    .to_string();

    let server = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let (head, _) = read_http_request(&mut stream);
        respond(&mut stream, "200 OK", &listing);
        head
    });

    let client = local_client(format!("http://{addr}"), Some("secret".into()));
    let latest = client.fetch_latest().expect("fetch").expect("record");
    assert_eq!(latest.device_id, "fresh");
    assert_eq!(latest.detected_count, 8);
    assert!(latest.has_detections);

    let head = server.join().expect("server");
    assert!(head.contains("key=secret"), "api key not forwarded: {head}");
}

#[test]
fn fetch_latest_of_an_empty_collection_is_none() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");

    let server = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let _ = read_http_request(&mut stream);
        respond(&mut stream, "200 OK", "{}");
    });

    let client = local_client(format!("http://{addr}"), None);
    assert!(client.fetch_latest().expect("fetch").is_none());
    server.join().expect("server");
}
