use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use livesync::{Config, ConnectionStatus, Error, LiveState};

/// Minimal channel server: accepts one socket, acks the join, pushes an
/// initial state, echoes event pushes back under `echoed`, and records the
/// leave.
async fn serve_one(listener: TcpListener, reject: bool) {
    let (stream, _) = listener.accept().await.expect("accept");
    let mut socket = tokio_tungstenite::accept_async(stream).await.expect("ws");

    // Join handshake.
    let join: Value = loop {
        match socket.next().await.expect("join frame").expect("frame") {
            Message::Text(text) => break serde_json::from_str(&text.to_string()).unwrap(),
            _ => continue,
        }
    };
    assert_eq!(join["event"], "phx_join");
    assert_eq!(join["topic"], "game:9");
    assert_eq!(join["payload"]["token"], "tok");

    let status = if reject { "error" } else { "ok" };
    let reply = json!({
        "topic": "game:9",
        "event": "phx_reply",
        "payload": {"status": status, "response": if reject { json!("forbidden") } else { json!({}) }},
        "ref": join["ref"],
    });
    socket
        .send(Message::Text(reply.to_string().into()))
        .await
        .unwrap();
    if reject {
        return;
    }

    let state = json!({
        "topic": "game:9",
        "event": "state:change",
        "payload": {"state": {"score": 0}, "version": 1},
        "ref": null,
    });
    socket
        .send(Message::Text(state.to_string().into()))
        .await
        .unwrap();

    while let Some(Ok(msg)) = socket.next().await {
        let Message::Text(text) = msg else { continue };
        let frame: Value = serde_json::from_str(&text.to_string()).unwrap();
        match frame["event"].as_str().unwrap_or_default() {
            "phx_leave" => break,
            event => {
                let echo = json!({
                    "topic": "game:9",
                    "event": "echoed",
                    "payload": {"was": event, "payload": frame["payload"]},
                    "ref": null,
                });
                let _ = socket.send(Message::Text(echo.to_string().into())).await;
            }
        }
    }
}

async fn bound_listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ws_join_sync_push_leave() {
    let (listener, url) = bound_listener().await;
    let server = tokio::spawn(serve_one(listener, false));

    let config = Config::builder()
        .url(url)
        .topic("game:9")
        .param("token", "tok")
        .build()
        .unwrap();
    let live = LiveState::new(config);
    let mut changes = live.subscribe_changes();
    let mut echoed = live.receive_event("echoed");
    live.connect();

    let change = timeout(Duration::from_secs(3), changes.recv())
        .await
        .expect("state deadline")
        .unwrap();
    assert_eq!(change.state, json!({"score": 0}));
    assert_eq!(change.version, 1);

    live.push_event("move", json!({"dir": "n"}));
    let echo = timeout(Duration::from_secs(3), echoed.recv())
        .await
        .expect("echo deadline")
        .unwrap();
    assert_eq!(echo["was"], "lvs_evt:move");
    assert_eq!(echo["payload"], json!({"dir": "n"}));

    // Disconnect triggers phx_leave; the server loop returns.
    live.disconnect();
    timeout(Duration::from_secs(3), server)
        .await
        .expect("leave deadline")
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ws_join_rejection_classifies() {
    let (listener, url) = bound_listener().await;
    let server = tokio::spawn(serve_one(listener, true));

    let config = Config::builder().url(url).topic("game:9").param("token", "tok").build().unwrap();
    let live = LiveState::new(config);
    let mut errors = live.subscribe_errors();
    live.connect();

    let error = timeout(Duration::from_secs(3), errors.recv())
        .await
        .expect("error deadline")
        .unwrap();
    assert!(matches!(error, Error::Join(_)));
    assert_eq!(error.kind(), "channel join error");
    assert_eq!(live.status(), ConnectionStatus::Errored);

    let _ = server.await;
}

#[tokio::test]
async fn ws_connect_failure_is_socket_error() {
    // Nothing is listening here.
    let config = Config::new("ws://127.0.0.1:1/none", "game:9").unwrap();
    let live = LiveState::new(config);
    let mut errors = live.subscribe_errors();
    live.connect();

    let error = timeout(Duration::from_secs(3), errors.recv())
        .await
        .expect("error deadline")
        .unwrap();
    assert_eq!(error.kind(), "socket error");
}
