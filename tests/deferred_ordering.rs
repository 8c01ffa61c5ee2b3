//! Deferred responses complete in settlement order, not arrival order.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::StatusCode;
use harness_server::correlation::TEST_ENV_ID_HEADER;
use harness_server::http::{LoopPhase, STATUS_CHECK_PATH};

mod common;

#[tokio::test]
async fn test_later_request_settling_first_is_answered_first() {
    let harness = common::start_harness("abc123").await;
    let client = common::client();
    let completed = Arc::new(Mutex::new(Vec::new()));

    let slow = {
        let client = client.clone();
        let url = harness.url("/slow");
        let completed = completed.clone();
        tokio::spawn(async move {
            let res = client.get(url).header(TEST_ENV_ID_HEADER, "abc123").send().await.unwrap();
            let body = res.text().await.unwrap();
            completed.lock().unwrap().push(body);
        })
    };

    // Make sure /slow is in flight before /fast is sent.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let fast = {
        let client = client.clone();
        let url = harness.url("/fast");
        let completed = completed.clone();
        tokio::spawn(async move {
            let res = client.get(url).header(TEST_ENV_ID_HEADER, "abc123").send().await.unwrap();
            let body = res.text().await.unwrap();
            completed.lock().unwrap().push(body);
        })
    };

    slow.await.unwrap();
    fast.await.unwrap();

    assert_eq!(*completed.lock().unwrap(), vec!["B".to_string(), "A".to_string()]);
    assert_eq!(harness.spy.calls(), 2);
}

#[tokio::test]
async fn test_status_check_served_while_deferred_pending() {
    let harness = common::start_harness("abc123").await;
    let client = common::client();

    let pending = {
        let client = client.clone();
        let url = harness.url("/slow");
        tokio::spawn(async move {
            client.get(url).header(TEST_ENV_ID_HEADER, "abc123").send().await.unwrap().status()
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    let res = client.get(harness.url(STATUS_CHECK_PATH)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(!pending.is_finished(), "deferred response should still be pending");

    assert_eq!(pending.await.unwrap(), StatusCode::OK);
    assert_eq!(harness.phase.get(), LoopPhase::Listening);
}
