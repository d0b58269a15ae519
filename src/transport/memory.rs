//! In-memory transport for tests and in-process embedding.
//!
//! [`MemoryTransport::new`] returns the client half together with a
//! [`MemoryServer`] that observes every join as a [`MemorySession`]: the
//! session exposes the client's pushes and lets the test inject inbound
//! messages.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::transport::{ChannelHandle, ChannelMessage, Transport};

#[derive(Debug, Clone)]
enum JoinPolicy {
    Accept,
    Reject(String),
}

/// Client half; plug into [`LiveState::with_transport`](crate::LiveState::with_transport).
pub struct MemoryTransport {
    policy: Arc<Mutex<JoinPolicy>>,
    sessions: mpsc::UnboundedSender<MemorySession>,
}

/// Server half; accepts sessions and scripts join outcomes.
pub struct MemoryServer {
    policy: Arc<Mutex<JoinPolicy>>,
    sessions: mpsc::UnboundedReceiver<MemorySession>,
}

/// One accepted join.
pub struct MemorySession {
    pub topic: String,
    pub params: Map<String, Value>,
    outbound: mpsc::UnboundedReceiver<ChannelMessage>,
    inbound: mpsc::UnboundedSender<ChannelMessage>,
}

impl MemoryTransport {
    pub fn new() -> (Self, MemoryServer) {
        let policy = Arc::new(Mutex::new(JoinPolicy::Accept));
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                policy: policy.clone(),
                sessions: tx,
            },
            MemoryServer {
                policy,
                sessions: rx,
            },
        )
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn join(&mut self, config: &Config) -> Result<ChannelHandle> {
        let policy = self.policy.lock().clone();
        if let JoinPolicy::Reject(reason) = policy {
            return Err(Error::Join(reason));
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let session = MemorySession {
            topic: config.topic.clone(),
            params: config.params.clone(),
            outbound: out_rx,
            inbound: in_tx,
        };
        self.sessions
            .send(session)
            .map_err(|_| Error::Socket("memory server dropped".into()))?;
        Ok(ChannelHandle::new(out_tx, in_rx))
    }
}

impl MemoryServer {
    /// All joins from now on are rejected with `reason`.
    pub fn reject_joins(&self, reason: &str) {
        *self.policy.lock() = JoinPolicy::Reject(reason.to_string());
    }

    pub fn accept_joins(&self) {
        *self.policy.lock() = JoinPolicy::Accept;
    }

    /// Next join, in arrival order.
    pub async fn accept(&mut self) -> Option<MemorySession> {
        self.sessions.recv().await
    }

    /// Non-blocking variant of [`accept`](Self::accept).
    pub fn try_accept(&mut self) -> Option<MemorySession> {
        self.sessions.try_recv().ok()
    }
}

impl MemorySession {
    /// Inject a named message toward the client.
    pub fn send(&self, event: &str, payload: Value) {
        let _ = self.inbound.send(ChannelMessage::new(event, payload));
    }

    /// Next message pushed by the client; `None` once it disconnected.
    pub async fn next_push(&mut self) -> Option<ChannelMessage> {
        self.outbound.recv().await
    }

    /// Non-blocking variant of [`next_push`](Self::next_push).
    pub fn try_next_push(&mut self) -> Option<ChannelMessage> {
        self.outbound.try_recv().ok()
    }

    /// Whether the client side has dropped its channel handle.
    pub fn is_closed(&self) -> bool {
        self.inbound.is_closed()
    }
}
