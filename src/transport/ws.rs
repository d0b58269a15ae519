//! WebSocket transport.
//!
//! Frames are JSON text messages of the shape
//! `{"topic": ..., "event": ..., "payload": ..., "ref": ...}`. Joining a
//! topic sends a `phx_join` frame and waits for the matching `phx_reply`;
//! dropping the [`ChannelHandle`] sends `phx_leave` and closes the socket.

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::transport::{ChannelHandle, ChannelMessage, Transport};

pub const JOIN_EVENT: &str = "phx_join";
pub const LEAVE_EVENT: &str = "phx_leave";
pub const REPLY_EVENT: &str = "phx_reply";
pub const CLOSE_EVENT: &str = "phx_close";
pub const ERROR_EVENT: &str = "phx_error";

/// One wire frame.
#[derive(Debug, Serialize, Deserialize)]
struct Frame {
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
    #[serde(default, rename = "ref")]
    reference: Option<String>,
}

impl Frame {
    fn new(topic: &str, event: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.to_string(),
            event: event.into(),
            payload,
            reference: Some(Uuid::new_v4().to_string()),
        }
    }
}

/// WebSocket-backed [`Transport`].
#[derive(Debug, Default)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Transport for WsTransport {
    async fn join(&mut self, config: &Config) -> Result<ChannelHandle> {
        let (socket, _) = tokio_tungstenite::connect_async(config.url.as_str())
            .await
            .map_err(|e| Error::Socket(format!("connect failed: {e}")))?;
        let (mut ws_tx, mut ws_rx) = socket.split();

        // Join handshake: phx_join out, matching phx_reply back.
        let join = Frame::new(
            &config.topic,
            JOIN_EVENT,
            Value::Object(config.params.clone()),
        );
        let join_ref = join.reference.clone();
        let text = serde_json::to_string(&join)
            .map_err(|e| Error::Socket(format!("unencodable join frame: {e}")))?;
        ws_tx
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| Error::Socket(format!("send failed during join: {e}")))?;

        let reply = tokio::time::timeout(config.join_timeout(), async {
            while let Some(msg) = ws_rx.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if let Ok(frame) = serde_json::from_str::<Frame>(&text.to_string()) {
                            if frame.event == REPLY_EVENT && frame.reference == join_ref {
                                return Ok(frame.payload);
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => return Err(Error::Socket(format!("socket failed during join: {e}"))),
                }
            }
            Err(Error::Socket("socket closed during join".into()))
        })
        .await
        .map_err(|_| Error::Join("join timed out".into()))??;

        let status = reply.get("status").and_then(Value::as_str).unwrap_or("error");
        if status != "ok" {
            let reason = match reply.get("response") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => "join rejected".into(),
            };
            return Err(Error::Join(reason));
        }

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ChannelMessage>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<ChannelMessage>();

        // Forward pushes to the socket; a closed queue means the handle was
        // dropped, so leave the channel.
        let topic = config.topic.clone();
        tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                let frame = Frame::new(&topic, message.event, message.payload);
                let Ok(text) = serde_json::to_string(&frame) else {
                    continue;
                };
                if ws_tx.send(Message::Text(text.into())).await.is_err() {
                    return;
                }
            }
            let leave = Frame::new(&topic, LEAVE_EVENT, Value::Null);
            if let Ok(text) = serde_json::to_string(&leave) {
                let _ = ws_tx.send(Message::Text(text.into())).await;
            }
            let _ = ws_tx.send(Message::Close(None)).await;
        });

        // Forward inbound frames; replies and control frames stay here.
        tokio::spawn(async move {
            while let Some(msg) = ws_rx.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        let text: String = text.to_string();
                        match serde_json::from_str::<Frame>(&text) {
                            Ok(frame) if frame.event == REPLY_EVENT => {}
                            Ok(frame)
                                if frame.event == CLOSE_EVENT || frame.event == ERROR_EVENT =>
                            {
                                tracing::debug!(event = %frame.event, "channel closed by server");
                                break;
                            }
                            Ok(frame) => {
                                if in_tx
                                    .send(ChannelMessage::new(frame.event, frame.payload))
                                    .is_err()
                                {
                                    break;
                                }
                            }
                            Err(err) => {
                                tracing::debug!("ignoring unparseable frame: {err}");
                            }
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                    Ok(_) => {}
                    Err(err) => {
                        tracing::debug!("socket error: {err}");
                        break;
                    }
                }
            }
        });

        Ok(ChannelHandle::new(out_tx, in_rx))
    }
}
