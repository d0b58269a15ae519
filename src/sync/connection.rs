//! Channel connection ownership and lifecycle.

use serde_json::Value;

use crate::config::Config;
use crate::error::Result;
use crate::transport::{ChannelHandle, ChannelMessage, Transport};

/// Lifecycle state of the single connection an instance owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Unconnected,
    Joining,
    Joined,
    Errored,
}

/// Owns the channel handle and the transport that produced it.
pub struct ConnectionManager {
    transport: Box<dyn Transport>,
    status: ConnectionStatus,
    channel: Option<ChannelHandle>,
}

impl ConnectionManager {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            status: ConnectionStatus::Unconnected,
            channel: None,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_joined(&self) -> bool {
        self.status == ConnectionStatus::Joined
    }

    /// Open the channel for the configured topic. Idempotent: ignored unless
    /// currently unconnected, so a duplicate call never produces a second
    /// join request.
    pub async fn connect(&mut self, config: &Config) -> Result<()> {
        if self.status != ConnectionStatus::Unconnected {
            tracing::debug!(status = ?self.status, "connect ignored, already underway");
            return Ok(());
        }
        self.status = ConnectionStatus::Joining;
        match self.transport.join(config).await {
            Ok(channel) => {
                self.channel = Some(channel);
                self.status = ConnectionStatus::Joined;
                tracing::debug!(topic = %config.topic, "channel joined");
                Ok(())
            }
            Err(err) => {
                self.status = ConnectionStatus::Errored;
                Err(err)
            }
        }
    }

    /// Leave the channel. Idempotent and safe when never connected. Dropping
    /// the handle is the leave signal; the transport observes it and sends
    /// the leave frame.
    pub fn disconnect(&mut self) {
        self.channel = None;
        self.status = ConnectionStatus::Unconnected;
    }

    /// Fire-and-forget push of a named message. Dropped silently when not
    /// joined.
    pub fn push(&self, event: &str, payload: Value) {
        match &self.channel {
            Some(channel) => channel.push(ChannelMessage::new(event, payload)),
            None => tracing::debug!(event, "push while not joined, dropping"),
        }
    }

    /// Next inbound message; `None` once the transport ends the stream.
    /// Callers must only poll this while joined.
    pub async fn next_message(&mut self) -> Option<ChannelMessage> {
        match self.channel.as_mut() {
            Some(channel) => channel.next().await,
            None => None,
        }
    }

    /// Record that the transport dropped us. Any completion still in flight
    /// belongs to the discarded handle and is ignored from here on.
    pub fn mark_errored(&mut self) {
        self.channel = None;
        self.status = ConnectionStatus::Errored;
    }
}
