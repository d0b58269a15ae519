//! Composition wrapper binding a [`LiveState`] instance to a consumer.
//!
//! [`attach`] wires a [`StateSink`] to an instance: chosen top-level (or
//! path-qualified) fields of the snapshot flow into properties, attributes
//! mirror fields, and declared events flow both ways. The returned
//! [`Binding`] is the explicit lifecycle handle: [`Binding::detach`] stops
//! all forwarding and disconnects the instance.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::path;
use crate::sync::LiveState;

/// Consumer side of a binding. All methods default to no-ops so a sink only
/// implements what it cares about.
pub trait StateSink: Send + 'static {
    fn set_property(&mut self, _name: &str, _value: &Value) {}
    fn set_attribute(&mut self, _name: &str, _value: &Value) {}
    fn dispatch_event(&mut self, _name: &str, _payload: &Value) {}
}

/// One property binding: the sink property `name` tracks either the
/// same-named top-level field of the snapshot or, when `path` is set, the
/// nested value it navigates to.
#[derive(Debug, Clone)]
pub struct PropertyBinding {
    pub name: String,
    pub path: Option<String>,
}

impl PropertyBinding {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
        }
    }

    pub fn with_path(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: Some(path.into()),
        }
    }
}

impl From<&str> for PropertyBinding {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// What to wire up when attaching.
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    pub properties: Vec<PropertyBinding>,
    pub attributes: Vec<String>,
    pub send_events: Vec<String>,
    pub receive_events: Vec<String>,
}

/// Live attachment; dropping it stops forwarding, [`detach`](Self::detach)
/// additionally disconnects the instance.
pub struct Binding {
    live: Arc<LiveState>,
    send_events: Vec<String>,
    forwarders: Vec<JoinHandle<()>>,
}

/// Connect `sink` to `live` per `options`. Calls `connect()` on the instance
/// (idempotent upstream, so attaching several sinks to a shared instance
/// sends one join).
pub fn attach<S: StateSink>(live: Arc<LiveState>, sink: S, options: ConnectOptions) -> Binding {
    let sink = Arc::new(Mutex::new(sink));
    let mut forwarders = Vec::new();

    if !options.properties.is_empty() || !options.attributes.is_empty() {
        let mut changes = live.subscribe_changes();
        let sink = sink.clone();
        let properties = options.properties.clone();
        let attributes = options.attributes.clone();
        forwarders.push(tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        let mut sink = sink.lock();
                        for binding in &properties {
                            let value = match &binding.path {
                                Some(p) => path::extract(&change.state, p),
                                None => change.state.get(binding.name.as_str()),
                            };
                            if let Some(value) = value {
                                sink.set_property(&binding.name, value);
                            }
                        }
                        for attribute in &attributes {
                            if let Some(value) = change.state.get(attribute.as_str()) {
                                sink.set_attribute(attribute, value);
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "sink fell behind on state changes");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));
    }

    for name in &options.receive_events {
        let mut events = live.receive_event(name);
        let sink = sink.clone();
        let name = name.clone();
        forwarders.push(tokio::spawn(async move {
            while let Some(payload) = events.recv().await {
                sink.lock().dispatch_event(&name, &payload);
            }
        }));
    }

    // Bindings are registered ahead of the join so nothing delivered right
    // after the ack can slip past them.
    live.connect();

    Binding {
        live,
        send_events: options.send_events,
        forwarders,
    }
}

impl Binding {
    pub fn live(&self) -> &Arc<LiveState> {
        &self.live
    }

    /// Forward a declared send event to the channel; undeclared names are
    /// dropped.
    pub fn emit(&self, name: &str, payload: Value) {
        if self.send_events.iter().any(|declared| declared == name) {
            self.live.push_event(name, payload);
        } else {
            tracing::debug!(event = name, "emit of undeclared send event, dropping");
        }
    }

    /// Stop forwarding and disconnect the instance.
    pub fn detach(self) {
        self.live.disconnect();
        // Drop does the rest.
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        for forwarder in &self.forwarders {
            forwarder.abort();
        }
    }
}
