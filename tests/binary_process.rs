//! End-to-end checks against the `harness-server` binary.

use std::process::Stdio;
use std::time::Duration;

use harness_server::correlation::TEST_ENV_ID_HEADER;
use harness_server::handler::scenario::{ECHO_PATH, FAULT_PATH};
use harness_server::http::STATUS_CHECK_PATH;
use tokio::process::Command;

mod common;

fn harness_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_harness-server"));
    cmd.stdout(Stdio::null()).stderr(Stdio::null()).kill_on_drop(true);
    cmd
}

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

async fn wait_ready(client: &reqwest::Client, port: u16) {
    let url = format!("http://127.0.0.1:{}{}", port, STATUS_CHECK_PATH);
    for _ in 0..100 {
        if let Ok(res) = client.get(&url).send().await {
            if res.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("harness-server did not become ready on port {}", port);
}

#[tokio::test]
async fn test_missing_port_exits_with_status_1() {
    let status = harness_bin()
        .args(["--test-env-id", "abc123"])
        .status()
        .await
        .unwrap();
    assert_eq!(status.code(), Some(1));
}

#[tokio::test]
async fn test_unknown_argument_exits_with_status_1() {
    let status = harness_bin()
        .args(["--port", "0", "--no-such-flag"])
        .status()
        .await
        .unwrap();
    assert_eq!(status.code(), Some(1));
}

#[tokio::test]
async fn test_binary_serves_then_exits_on_fault() {
    let port = free_port();
    let mut child = harness_bin()
        .args(["--port", &port.to_string(), "--test-env-id", "abc123"])
        .spawn()
        .unwrap();

    let client = common::client();
    wait_ready(&client, port).await;

    let res = client
        .post(format!("http://127.0.0.1:{}{}", port, ECHO_PATH))
        .header(TEST_ENV_ID_HEADER, "abc123")
        .body("ping")
        .send()
        .await
        .unwrap();
    assert!(res.status().is_success());

    let res = client
        .get(format!("http://127.0.0.1:{}{}", port, ECHO_PATH))
        .header(TEST_ENV_ID_HEADER, "wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 400);

    let result = client
        .get(format!("http://127.0.0.1:{}{}", port, FAULT_PATH))
        .header(TEST_ENV_ID_HEADER, "abc123")
        .send()
        .await;
    assert!(result.is_err(), "faulted request must not be answered");

    let status = tokio::time::timeout(Duration::from_secs(5), child.wait())
        .await
        .expect("harness-server did not exit after a fault")
        .unwrap();
    assert_eq!(status.code(), Some(1));
}
