//! Transport-level tests against the mock wrapped server: correlation,
//! error mapping, timeouts, garbage tolerance, notifications, and the
//! drain-on-exit behavior.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde_json::json;

use spillway_mcp::error::TransportError;
use spillway_mcp::transport::RpcClient;

async fn spawn_mock(request_timeout: Duration) -> Result<RpcClient> {
    let bin = support::locate_mock_bin()?;
    let client = RpcClient::spawn_with_timeout(
        bin.to_string_lossy().as_ref(),
        &[],
        false,
        request_timeout,
    )
    .await?;
    Ok(client)
}

#[tokio::test]
async fn pipelined_requests_resolve_by_id_not_arrival_order() -> Result<()> {
    let client = spawn_mock(Duration::from_secs(10)).await?;

    let first = client.request(
        "tools/call",
        json!({"name": "generate", "arguments": {"size": 5, "fill": "a"}}),
    );
    let second = client.request(
        "tools/call",
        json!({"name": "generate", "arguments": {"size": 9, "fill": "b"}}),
    );
    let (first, second) = tokio::join!(first, second);

    let first_text = first?["content"][0]["text"].as_str().unwrap_or_default().to_string();
    let second_text = second?["content"][0]["text"].as_str().unwrap_or_default().to_string();
    assert_eq!(first_text, "aaaaa");
    assert_eq!(second_text, "bbbbbbbbb");
    Ok(())
}

#[tokio::test]
async fn remote_errors_surface_with_their_message() -> Result<()> {
    let client = spawn_mock(Duration::from_secs(10)).await?;

    let err = client
        .request("tools/call", json!({"name": "fail", "arguments": {"message": "boom"}}))
        .await
        .expect_err("fail tool must error");
    match err {
        TransportError::Remote(message) => assert_eq!(message, "boom"),
        other => panic!("expected a remote error, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn unanswered_requests_time_out_and_the_stream_survives() -> Result<()> {
    let client = spawn_mock(Duration::from_millis(200)).await?;

    let err = client
        .request("debug/black_hole", json!({}))
        .await
        .expect_err("black hole must time out");
    assert!(matches!(err, TransportError::Timeout { .. }), "got {err:?}");

    // The connection is still usable after the timeout.
    let tools = client.request("tools/list", json!({})).await?;
    assert!(tools["tools"].as_array().is_some_and(|tools| !tools.is_empty()));
    Ok(())
}

#[tokio::test]
async fn garbage_lines_are_discarded_without_breaking_correlation() -> Result<()> {
    let client = spawn_mock(Duration::from_secs(10)).await?;

    let value = client.request("debug/garbage", json!({})).await?;
    assert_eq!(value["ok"], true);
    Ok(())
}

#[tokio::test]
async fn notifications_reach_registered_listeners() -> Result<()> {
    let client = spawn_mock(Duration::from_secs(10)).await?;

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    client.on_notification(move |notification| {
        if notification.method == "notifications/message" {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    // The mock writes the notification line before the response line, so
    // the listener has run by the time the request resolves.
    client.request("debug/emit_notification", json!({})).await?;
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn subprocess_exit_fails_pending_requests_immediately() -> Result<()> {
    // The generous timeout is the point: a drained request must fail with
    // ConnectionClosed long before any timeout could fire.
    let client = spawn_mock(Duration::from_secs(30)).await?;

    let err = client
        .request("debug/exit", json!({}))
        .await
        .expect_err("exit drops the request");
    assert!(matches!(err, TransportError::ConnectionClosed), "got {err:?}");

    let err = client
        .request("tools/list", json!({}))
        .await
        .expect_err("closed transport rejects new requests");
    assert!(matches!(err, TransportError::ConnectionClosed), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn unlaunchable_commands_fail_with_a_spawn_error() {
    let err = RpcClient::spawn("/nonexistent/spillway-no-such-binary", &[], false)
        .await
        .expect_err("spawn must fail");
    assert!(matches!(err, TransportError::Spawn { .. }), "got {err:?}");
}
