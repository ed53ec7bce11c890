// Tests for writing staging workflows to the backend

use predicates::prelude::*;
use stager::backend::{BackendError, HttpBackend, StagingBackend};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use test_env::{new_cmd, run_ok, setup_test_env};

/// Request seen by the stub backend
struct Captured {
    request_line: String,
    body: String,
}

/// Serve a single request with `status` and hand back what was received
fn stub_backend(status: &'static str, body: &'static str) -> (String, mpsc::Receiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());

        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();

        let mut content_length = 0;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if line == "\r\n" || line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap();
                }
            }
        }
        let mut request_body = vec![0; content_length];
        reader.read_exact(&mut request_body).unwrap();

        let mut stream = stream;
        write!(
            stream,
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        )
        .unwrap();
        stream.flush().unwrap();

        tx.send(Captured {
            request_line: request_line.trim().to_string(),
            body: String::from_utf8(request_body).unwrap(),
        })
        .unwrap();
    });

    (url, rx)
}

/// Address nothing listens on
fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    url
}

#[test]
fn test_write_sends_put_with_user() {
    let (url, rx) = stub_backend("200 OK", "");
    let backend = HttpBackend::new(&url, Duration::from_secs(5)).unwrap();

    backend
        .write_staging_workflow("home:alice", "alice", "{\"project\":\"home:alice\"}", None)
        .unwrap();

    let captured = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(captured.request_line.starts_with("PUT /source/home:alice/_staging_workflow?user=alice "));
    assert_eq!(captured.body, "{\"project\":\"home:alice\"}");
}

#[test]
fn test_non_success_status_is_rejected() {
    let (url, _rx) = stub_backend("409 Conflict", "staging project locked");
    let backend = HttpBackend::new(&url, Duration::from_secs(5)).unwrap();

    let err = backend
        .write_staging_workflow("home:alice", "_nobody_", "{}", None)
        .unwrap_err();
    match err {
        BackendError::Rejected { project, status, message } => {
            assert_eq!(project, "home:alice");
            assert_eq!(status, 409);
            assert_eq!(message, "staging project locked");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_empty_rejection_body_uses_reason() {
    let (url, _rx) = stub_backend("503 Service Unavailable", "");
    let backend = HttpBackend::new(&url, Duration::from_secs(5)).unwrap();

    let err = backend
        .write_staging_workflow("home:alice", "_nobody_", "{}", None)
        .unwrap_err();
    assert!(matches!(err, BackendError::Rejected { status: 503, ref message, .. } if message == "Service Unavailable"));
}

#[test]
fn test_refused_connection_is_unavailable() {
    let backend = HttpBackend::new(&refused_url(), Duration::from_secs(5)).unwrap();

    let err = backend
        .write_staging_workflow("home:alice", "_nobody_", "{}", Some(Duration::from_secs(2)))
        .unwrap_err();
    assert!(matches!(err, BackendError::Unavailable(_)));
}

#[test]
fn test_silent_backend_times_out_as_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let holder = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        thread::sleep(Duration::from_secs(2));
        drop(stream);
    });

    let backend = HttpBackend::new(&url, Duration::from_secs(30)).unwrap();
    let err = backend
        .write_staging_workflow("home:alice", "_nobody_", "{}", Some(Duration::from_millis(300)))
        .unwrap_err();
    assert!(matches!(err, BackendError::Unavailable(ref message) if message.contains("Timed out")));
    holder.join().unwrap();
}

fn setup_workflow(temp_dir: &tempfile::TempDir) {
    run_ok(temp_dir, &["projects", "add", "home:alice"]);
    run_ok(temp_dir, &["groups", "add", "staging-managers"]);
    run_ok(temp_dir, &["workflow", "create", "home:alice", "--managers", "staging-managers"]);
}

#[test]
fn test_sync_without_write_through_does_nothing() {
    let (temp_dir, _guard) = setup_test_env(&format!("backend.url={}\n", refused_url()));
    setup_workflow(&temp_dir);

    new_cmd(&temp_dir)
        .args(["workflow", "sync", "home:alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing written"));
}

#[test]
fn test_sync_with_write_through_writes_document() {
    let (url, rx) = stub_backend("200 OK", "");
    let (temp_dir, _guard) = setup_test_env(&format!(
        "global_write_through=true\nbackend.url={}\nuser.login=alice\n",
        url
    ));
    setup_workflow(&temp_dir);

    new_cmd(&temp_dir)
        .args(["workflow", "sync", "home:alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote staging workflow of 'home:alice'"));

    let captured = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(captured.request_line.contains("user=alice"));
    let document: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
    assert_eq!(document["managers"], "staging-managers");
    assert_eq!(document["staging_projects"][1]["name"], "home:alice:Staging:B");
}

#[test]
fn test_sync_rejection_is_internal_error() {
    let (url, _rx) = stub_backend("400 Bad Request", "invalid staging workflow");
    let (temp_dir, _guard) = setup_test_env(&format!("global_write_through=yes\nbackend.url={}\n", url));
    setup_workflow(&temp_dir);

    new_cmd(&temp_dir)
        .args(["workflow", "sync", "home:alice"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("HTTP 400 invalid staging workflow"));
}

#[test]
fn test_sync_unreachable_backend_is_internal_error() {
    let (temp_dir, _guard) = setup_test_env(&format!("global_write_through=1\nbackend.url={}\n", refused_url()));
    setup_workflow(&temp_dir);

    new_cmd(&temp_dir)
        .args(["workflow", "sync", "home:alice", "--timeout", "2"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Backend unavailable"));
}
