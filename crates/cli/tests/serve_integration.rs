//! Integration tests for the `elvtrace serve` HTTP API.
//!
//! Each test starts the server as a child process on a unique port with a
//! data file in its own temporary directory, makes HTTP requests, and
//! verifies the responses.

use std::io::Read;
use std::net::TcpStream;
use std::path::Path;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use tempfile::TempDir;

/// Atomic port counter to avoid port conflicts between parallel tests.
/// Base port is derived from process ID so separate test binaries don't
/// collide on the same port range.
static NEXT_PORT: AtomicU16 = AtomicU16::new(0);
static PORT_INIT: std::sync::Once = std::sync::Once::new();

fn next_port() -> u16 {
    PORT_INIT.call_once(|| {
        let base = 20000 + (std::process::id() as u16 % 20000);
        NEXT_PORT.store(base, Ordering::SeqCst);
    });
    NEXT_PORT.fetch_add(1, Ordering::SeqCst)
}

/// A running server plus the directory holding its data file. Killed on drop.
struct Server {
    child: Child,
    port: u16,
    _dir: TempDir,
}

impl Drop for Server {
    fn drop(&mut self) {
        self.child.kill().ok();
        self.child.wait().ok();
    }
}

/// Helper: start `elvtrace serve` on a fresh port with an empty table.
fn start_server() -> Server {
    start_server_with(&[])
}

fn start_server_with(envs: &[(&str, &str)]) -> Server {
    let dir = TempDir::new().expect("tempdir");
    let port = next_port();
    let child = spawn(dir.path(), port, envs);
    Server {
        child,
        port,
        _dir: dir,
    }
}

fn spawn(dir: &Path, port: u16, envs: &[(&str, &str)]) -> Child {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_elvtrace"));
    cmd.current_dir(dir);
    cmd.env_remove("ELVTRACE_CONFIG")
        .env_remove("ELVTRACE_REMOTE_CREDENTIALS")
        .env("ELVTRACE_DATA_FILE", dir.join("trace.csv"))
        .env("ELVTRACE_PUBLIC_BASE_URL", "http://labels.test");
    cmd.envs(envs.iter().copied());
    cmd.arg("serve").arg("--port").arg(port.to_string());
    // Redirect stdout/stderr to avoid blocking
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());

    let child = cmd.spawn().expect("failed to start elvtrace serve");
    // Wait for server to be ready by polling the port
    for _ in 0..50 {
        if TcpStream::connect(format!("127.0.0.1:{}", port)).is_ok() {
            return child;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    child
}

/// Helper: make an HTTP request and return (status, response_headers, body).
fn http_request(
    port: u16,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<&str>,
) -> (u16, String, String) {
    let mut stream = TcpStream::connect(format!("127.0.0.1:{}", port)).expect("failed to connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();

    let mut header_lines = String::new();
    if let Some(token) = token {
        header_lines.push_str(&format!("Authorization: Bearer {}\r\n", token));
    }
    let body = body.unwrap_or("");
    if !body.is_empty() || method == "POST" {
        header_lines.push_str(&format!(
            "Content-Type: application/json\r\nContent-Length: {}\r\n",
            body.len()
        ));
    }

    let request = format!(
        "{} {} HTTP/1.1\r\nHost: localhost:{}\r\n{}Connection: close\r\n\r\n{}",
        method, path, port, header_lines, body
    );
    std::io::Write::write_all(&mut stream, request.as_bytes()).expect("failed to write");

    let mut raw = Vec::new();
    let _ = stream.read_to_end(&mut raw);
    parse_http_response_full(&String::from_utf8_lossy(&raw))
}

/// Helper: make a simple HTTP GET request and return (status, body).
fn http_get(port: u16, path: &str, token: Option<&str>) -> (u16, String) {
    let (status, _, body) = http_request(port, "GET", path, token, None);
    (status, body)
}

/// Helper: make a simple HTTP POST request and return (status, body).
fn http_post(port: u16, path: &str, token: Option<&str>, body: &str) -> (u16, String) {
    let (status, _, body) = http_request(port, "POST", path, token, Some(body));
    (status, body)
}

/// Extract a header value from raw headers string.
fn extract_header<'a>(headers: &'a str, name: &str) -> Option<&'a str> {
    let name_lower = name.to_lowercase();
    for line in headers.lines() {
        if let Some((key, value)) = line.split_once(':') {
            if key.trim().to_lowercase() == name_lower {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Parse an HTTP response into (status_code, headers_string, body).
fn parse_http_response_full(response: &str) -> (u16, String, String) {
    let parts: Vec<&str> = response.splitn(2, "\r\n\r\n").collect();
    let headers = parts.first().unwrap_or(&"").to_string();
    let body = parts.get(1).unwrap_or(&"").to_string();

    let status_line = headers.lines().next().unwrap_or("");
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(0);

    // Handle chunked transfer encoding
    let body = if headers.to_lowercase().contains("transfer-encoding: chunked") {
        decode_chunked(&body)
    } else {
        body
    };

    (status, headers, body)
}

/// Decode chunked transfer encoding.
fn decode_chunked(data: &str) -> String {
    let mut result = String::new();
    let mut remaining = data;

    while let Some(line_end) = remaining.find("\r\n") {
        let size_str = &remaining[..line_end];
        let size = match usize::from_str_radix(size_str.trim(), 16) {
            Ok(s) => s,
            Err(_) => break,
        };
        if size == 0 {
            break;
        }
        let chunk_start = line_end + 2;
        let chunk_end = chunk_start + size;
        if chunk_end > remaining.len() {
            // Partial chunk, take what we have
            result.push_str(&remaining[chunk_start..]);
            break;
        }
        result.push_str(&remaining[chunk_start..chunk_end]);
        // Skip past chunk data + \r\n
        remaining = if chunk_end + 2 <= remaining.len() {
            &remaining[chunk_end + 2..]
        } else {
            ""
        };
    }

    result
}

fn json(body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("invalid JSON ({}): {}", e, body))
}

fn login(port: u16, username: &str, password: &str) -> String {
    let body = format!(
        r#"{{"username": "{}", "password": "{}"}}"#,
        username, password
    );
    let (status, body) = http_post(port, "/session", None, &body);
    assert_eq!(status, 200, "login failed: {}", body);
    json(&body)["token"].as_str().expect("token").to_string()
}

fn create_batch(port: u16, token: &str, name: &str) -> serde_json::Value {
    let body = format!(r#"{{"batch_name": "{}"}}"#, name);
    let (status, body) = http_post(port, "/batches", Some(token), &body);
    assert_eq!(status, 201, "create failed: {}", body);
    json(&body)
}

// ──────────────────────────────────────────────
// Health and routing
// ──────────────────────────────────────────────

#[test]
fn health_returns_200_with_version() {
    let server = start_server();
    let (status, body) = http_get(server.port, "/health", None);
    assert_eq!(status, 200);
    let json = json(&body);
    assert_eq!(json["status"], "ok");
    assert!(json.get("version").is_some(), "version field must be present");
}

#[test]
fn unknown_route_is_json_404() {
    let server = start_server();
    let (status, body) = http_get(server.port, "/nope", None);
    assert_eq!(status, 404);
    assert_eq!(json(&body)["error"], "not found");
}

// ──────────────────────────────────────────────
// Sessions
// ──────────────────────────────────────────────

#[test]
fn bad_credentials_401() {
    let server = start_server();
    let (status, body) = http_post(
        server.port,
        "/session",
        None,
        r#"{"username": "admin", "password": "wrong"}"#,
    );
    assert_eq!(status, 401);
    assert!(json(&body)["error"].as_str().unwrap().contains("invalid"));
}

#[test]
fn login_reports_role_and_logout_revokes() {
    let server = start_server();
    let token = login(server.port, "viewer", "view2024");

    let (status, body) = http_get(server.port, "/", Some(&token));
    assert_eq!(status, 200);
    let session = &json(&body)["session"];
    assert_eq!(session["role"], "viewer");
    assert!(session["capabilities"]
        .as_array()
        .unwrap()
        .contains(&serde_json::json!("query")));

    let (status, _, _) = http_request(server.port, "DELETE", "/session", Some(&token), None);
    assert_eq!(status, 200);
    let (status, _) = http_get(server.port, "/records", Some(&token));
    assert_eq!(status, 401);
}

#[test]
fn unknown_token_is_rejected() {
    let server = start_server();
    let (status, body) = http_get(server.port, "/records", Some("deadbeef"));
    assert_eq!(status, 401);
    assert!(json(&body)["error"].as_str().unwrap().contains("session token"));
}

#[test]
fn stale_token_scans_as_guest() {
    let server = start_server();
    let operator = login(server.port, "operator", "op2024");
    let code = create_batch(server.port, &operator, "PP")["record"]["batch_code"]
        .as_str()
        .unwrap()
        .to_string();
    let (status, _, _) = http_request(server.port, "DELETE", "/session", Some(&operator), None);
    assert_eq!(status, 200);

    for stale in [operator.as_str(), "deadbeef"] {
        let (status, body) = http_get(
            server.port,
            &format!("/?code={}&action=scan", code),
            Some(stale),
        );
        assert_eq!(status, 200, "scan landing failed: {}", body);
        assert_eq!(json(&body)["scan"]["batch_code"], code.as_str());
    }

    let (status, body) = http_get(server.port, "/", Some(&operator));
    assert_eq!(status, 200);
    assert!(json(&body)["session"].is_null());

    let entry = format!(
        r#"{{"batch_code": "{}", "stage": "Shipped", "operator": "Alice"}}"#,
        code
    );
    let (status, body) = http_post(server.port, "/scan", Some(&operator), &entry);
    assert_eq!(status, 201, "submit failed: {}", body);
    assert_eq!(json(&body)["record"]["stage"], "Shipped");
}

// ──────────────────────────────────────────────
// Access control
// ──────────────────────────────────────────────

#[test]
fn guest_cannot_query_and_viewer_cannot_create() {
    let server = start_server();
    let (status, _) = http_get(server.port, "/records", None);
    assert_eq!(status, 401);

    let viewer = login(server.port, "viewer", "view2024");
    let (status, body) = http_post(server.port, "/batches", Some(&viewer), r#"{"batch_name": "x"}"#);
    assert_eq!(status, 403);
    assert!(json(&body)["error"].as_str().unwrap().contains("not permitted"));

    let (status, _) = http_post(server.port, "/admin/clear", Some(&viewer), "");
    assert_eq!(status, 403);
}

// ──────────────────────────────────────────────
// Label, scan, submit
// ──────────────────────────────────────────────

#[test]
fn create_scan_submit_flow() {
    let server = start_server();
    let operator = login(server.port, "operator", "op2024");
    let created = create_batch(server.port, &operator, "PP plastic batch 001");
    let code = created["record"]["batch_code"].as_str().unwrap().to_string();
    assert_eq!(
        created["scan_url"],
        format!("http://labels.test/?code={}&action=scan", code)
    );
    assert!(!created["label_png_base64"].as_str().unwrap().is_empty());

    // Scan landing works without a session.
    let (status, body) = http_get(
        server.port,
        &format!("/?code={}&action=scan", code.to_lowercase()),
        None,
    );
    assert_eq!(status, 200);
    let scan = &json(&body)["scan"];
    assert_eq!(scan["batch_code"], code.as_str());
    assert_eq!(scan["history"].as_array().unwrap().len(), 1);

    let entry = format!(
        r#"{{"batch_code": "{}", "stage": "Shipped", "operator": "Alice", "weight_kg": "500", "destination": "Plant B"}}"#,
        code
    );
    let (status, body) = http_post(server.port, "/scan", None, &entry);
    assert_eq!(status, 201, "submit failed: {}", body);
    let record = &json(&body)["record"];
    assert_eq!(record["batch_name"], "PP plastic batch 001");
    assert_eq!(record["weight_kg"], "500");

    let (status, body) = http_get(
        server.port,
        &format!("/batches/{}/history", code),
        Some(&operator),
    );
    assert_eq!(status, 200);
    let history = json(&body)["history"].as_array().unwrap().clone();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["stage"], "Created");
    assert_eq!(history[1]["stage"], "Shipped");
}

#[test]
fn submit_errors_map_to_statuses() {
    let server = start_server();
    let (status, _) = http_post(
        server.port,
        "/scan",
        None,
        r#"{"batch_code": "NOPE0000", "stage": "Shipped", "operator": "Alice"}"#,
    );
    assert_eq!(status, 404);

    let operator = login(server.port, "operator", "op2024");
    let code = create_batch(server.port, &operator, "PE")["record"]["batch_code"]
        .as_str()
        .unwrap()
        .to_string();

    let missing_operator = format!(r#"{{"batch_code": "{}", "stage": "Shipped"}}"#, code);
    let (status, body) = http_post(server.port, "/scan", None, &missing_operator);
    assert_eq!(status, 400);
    assert!(json(&body)["error"].as_str().unwrap().contains("operator"));

    let (status, _) = http_post(server.port, "/scan", None, "{not json");
    assert_eq!(status, 400);

    let bad_stage = format!(
        r#"{{"batch_code": "{}", "stage": "Melted", "operator": "A"}}"#,
        code
    );
    let (status, _) = http_post(server.port, "/scan", None, &bad_stage);
    assert_eq!(status, 400);
}

#[test]
fn label_png_and_bundle_zip() {
    let server = start_server();
    let admin = login(server.port, "admin", "admin123");
    let code = create_batch(server.port, &admin, "ABS")["record"]["batch_code"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, headers, _) = http_request(
        server.port,
        "GET",
        &format!("/batches/{}/label", code),
        Some(&admin),
        None,
    );
    assert_eq!(status, 200);
    assert_eq!(extract_header(&headers, "content-type"), Some("image/png"));

    let (status, headers, _) = http_request(server.port, "GET", "/labels", Some(&admin), None);
    assert_eq!(status, 200);
    assert_eq!(extract_header(&headers, "content-type"), Some("application/zip"));

    let (status, _) = http_get(server.port, "/batches/NOPE0000/label", Some(&admin));
    assert_eq!(status, 404);
}

// ──────────────────────────────────────────────
// Query, stats, export, admin
// ──────────────────────────────────────────────

#[test]
fn seeded_records_query_and_stats() {
    let server = start_server();
    let admin = login(server.port, "admin", "admin123");
    let (status, body) = http_post(server.port, "/admin/seed-demo", Some(&admin), "");
    assert_eq!(status, 200);
    assert_eq!(json(&body)["seeded_rows"], 14);

    let (status, body) = http_get(server.port, "/records", Some(&admin));
    assert_eq!(status, 200);
    assert_eq!(json(&body)["count"], 14);

    let (status, body) = http_get(
        server.port,
        "/records?batch_code=demo0002&stages=Shipped,Received",
        Some(&admin),
    );
    assert_eq!(status, 200);
    let body = json(&body);
    assert_eq!(body["count"], 2);
    assert_eq!(body["records"][0]["stage"], "Received");

    let (status, _) = http_get(server.port, "/records?from=yesterday", Some(&admin));
    assert_eq!(status, 400);

    let (status, body) = http_get(server.port, "/stats", Some(&admin));
    assert_eq!(status, 200);
    let stats = json(&body);
    assert_eq!(stats["summary"]["distinct_batches"], 3);
    assert_eq!(stats["completeness"]["DEMO0003"]["record_count"], 5);
}

#[test]
fn export_sets_download_headers() {
    let server = start_server();
    let admin = login(server.port, "admin", "admin123");
    http_post(server.port, "/admin/seed-demo", Some(&admin), "");

    let (status, headers, body) = http_request(
        server.port,
        "GET",
        "/export?format=csv&codes=DEMO0001",
        Some(&admin),
        None,
    );
    assert_eq!(status, 200);
    let disposition = extract_header(&headers, "content-disposition").unwrap();
    assert!(disposition.starts_with("attachment; filename=\"plastic_trace_data_"));
    assert!(disposition.ends_with(".csv\""));
    assert!(body.contains("DEMO0001"));
    assert!(!body.contains("DEMO0002"));

    let (status, _) = http_get(server.port, "/export?format=pdf", Some(&admin));
    assert_eq!(status, 400);
}

#[test]
fn storage_advisories_reach_the_caller() {
    let server = start_server_with(&[("ELVTRACE_REMOTE_CREDENTIALS", "/nonexistent/remote.json")]);
    let admin = login(server.port, "admin", "admin123");

    // Startup advisories go to the server log, not the first caller.
    let (status, body) = http_get(server.port, "/records", Some(&admin));
    assert_eq!(status, 200);
    assert_eq!(json(&body)["warnings"], serde_json::json!([]));

    let (status, body) = http_post(server.port, "/admin/reinitialize", Some(&admin), "");
    assert_eq!(status, 200);
    let body = json(&body);
    let warnings = body["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].as_str().unwrap().contains("remote table disabled"));

    let (status, body) = http_get(server.port, "/admin/storage", Some(&admin));
    assert_eq!(status, 200);
    let body = json(&body);
    assert_eq!(body["backend"], "local");
    assert!(body["warnings"].as_array().unwrap().is_empty());

    let (status, body) = http_get(server.port, "/stats", Some(&admin));
    assert_eq!(status, 200);
    let body = json(&body);
    assert_eq!(body["summary"]["total_records"], 0);
    assert!(body["warnings"].as_array().unwrap().is_empty());
}

#[test]
fn admin_storage_and_clear() {
    let server = start_server();
    let admin = login(server.port, "admin", "admin123");
    let (status, body) = http_get(server.port, "/admin/storage", Some(&admin));
    assert_eq!(status, 200);
    assert_eq!(json(&body)["backend"], "local");

    let (status, body) = http_post(server.port, "/admin/sync", Some(&admin), "");
    assert_eq!(status, 500);
    assert!(json(&body)["error"].as_str().unwrap().contains("remote"));

    http_post(server.port, "/admin/seed-demo", Some(&admin), "");
    let (status, _) = http_post(server.port, "/admin/clear", Some(&admin), "");
    assert_eq!(status, 200);
    let (_, body) = http_get(server.port, "/records", Some(&admin));
    assert_eq!(json(&body)["count"], 0);
}
