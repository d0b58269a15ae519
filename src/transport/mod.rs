//! Transport boundary.
//!
//! The synchronization core does not care how bytes move; it speaks to a
//! [`Transport`] that can join a topic and hand back a [`ChannelHandle`]
//! carrying named messages in both directions. The crate ships two
//! implementations: [`ws::WsTransport`] over WebSocket and
//! [`memory::MemoryTransport`] for tests and embedding.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::error::Result;

pub mod memory;
pub mod ws;

/// One named message on a joined channel, in either direction. Wire encoding
/// is the transport's business; this type never touches serde directly.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMessage {
    pub event: String,
    pub payload: Value,
}

impl ChannelMessage {
    pub fn new(event: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }
}

/// Live handle to a joined channel.
///
/// Dropping the handle leaves the channel: the transport observes the closed
/// sender and performs its leave handshake.
pub struct ChannelHandle {
    outbound: mpsc::UnboundedSender<ChannelMessage>,
    inbound: mpsc::UnboundedReceiver<ChannelMessage>,
}

impl ChannelHandle {
    pub fn new(
        outbound: mpsc::UnboundedSender<ChannelMessage>,
        inbound: mpsc::UnboundedReceiver<ChannelMessage>,
    ) -> Self {
        Self { outbound, inbound }
    }

    /// Fire-and-forget send. A push after the transport went away is dropped.
    pub fn push(&self, message: ChannelMessage) {
        if self.outbound.send(message).is_err() {
            tracing::debug!("push on a closed channel, dropping");
        }
    }

    /// Next inbound message; `None` once the channel is gone.
    pub async fn next(&mut self) -> Option<ChannelMessage> {
        self.inbound.recv().await
    }
}

/// A message-channel transport with join/leave semantics.
///
/// `join` classifies a rejected join as [`Error::Join`](crate::Error::Join)
/// and a connect-level failure as [`Error::Socket`](crate::Error::Socket).
#[async_trait]
pub trait Transport: Send + 'static {
    async fn join(&mut self, config: &Config) -> Result<ChannelHandle>;
}
