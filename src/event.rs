//! Event multiplexing over the channel.
//!
//! Outbound application events are namespaced with [`EVENT_PREFIX`] so they
//! can never collide with the state messages or join/leave control traffic.
//! Inbound events are not prefixed; the server already disambiguates them,
//! so a configured receive name maps 1:1 to a channel message of that name.

use serde_json::Value;
use tokio::sync::mpsc;

/// Namespace token prepended to every outbound application event name.
pub const EVENT_PREFIX: &str = "lvs_evt:";

/// Channel message name for a local event `name`.
pub fn namespaced(name: &str) -> String {
    format!("{EVENT_PREFIX}{name}")
}

/// Routes inbound named messages to registered bindings.
///
/// Bindings are permanent for the lifetime of the instance; there is no
/// unbind. Registering the same name twice yields two deliveries per message,
/// so callers that need dedup must guard registration themselves.
#[derive(Default)]
pub struct EventRouter {
    bindings: Vec<(String, mpsc::UnboundedSender<Value>)>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, name: String, sink: mpsc::UnboundedSender<Value>) {
        self.bindings.push((name, sink));
    }

    /// Deliver `payload` to every binding registered under `event`, in
    /// registration order. Bindings whose receiver is gone are dropped.
    /// Returns the number of deliveries made.
    pub fn dispatch(&mut self, event: &str, payload: &Value) -> usize {
        let mut delivered = 0;
        self.bindings.retain(|(name, sink)| {
            if name != event {
                return true;
            }
            match sink.send(payload.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            }
        });
        delivered
    }
}
