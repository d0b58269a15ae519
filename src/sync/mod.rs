//! The synchronization instance.
//!
//! [`LiveState`] is the one addressable unit per (endpoint, topic). It spawns
//! a single worker task that owns the connection, the state store, and the
//! event router; every mutation runs on that task, so no locking is needed
//! anywhere in the core. The public handle only sends commands and hands out
//! notification receivers, so no method here ever blocks the caller.

pub mod connection;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch};

use crate::config::Config;
use crate::error::Error;
use crate::event::{self, EventRouter};
use crate::state::{
    PatchPayload, StateChange, StatePayload, StateStore, STATE_CHANGE_EVENT, STATE_PATCH_EVENT,
};
use crate::transport::{ws::WsTransport, ChannelMessage, Transport};
use connection::{ConnectionManager, ConnectionStatus};

enum Command {
    Connect,
    Disconnect,
    PushEvent { name: String, payload: Value },
    Bind { name: String, sink: mpsc::UnboundedSender<Value> },
}

/// Handle to one synchronized state instance.
///
/// Consumers share a `LiveState` through `Arc` (typically via the
/// [`Registry`](crate::Registry)); the worker task exits when the last
/// handle is dropped, which also leaves the channel. Cloning a handle is
/// cheap and shares the same worker.
#[derive(Clone)]
pub struct LiveState {
    config: Config,
    commands: mpsc::UnboundedSender<Command>,
    changes: broadcast::Sender<StateChange>,
    errors: broadcast::Sender<Error>,
    status: watch::Receiver<ConnectionStatus>,
}

impl LiveState {
    /// Build over the default WebSocket transport. Must be called inside a
    /// tokio runtime: the worker task is spawned immediately.
    pub fn new(config: Config) -> Self {
        Self::with_transport(config, WsTransport::new())
    }

    /// Build over a caller-supplied transport (see
    /// [`transport::memory`](crate::transport::memory) for the test one).
    pub fn with_transport(config: Config, transport: impl Transport) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (changes, _) = broadcast::channel(64);
        let (errors, _) = broadcast::channel(16);
        let (status_tx, status) = watch::channel(ConnectionStatus::Unconnected);

        let worker = Worker {
            config: config.clone(),
            connection: ConnectionManager::new(Box::new(transport)),
            store: StateStore::new(),
            router: EventRouter::new(),
            commands: command_rx,
            changes: changes.clone(),
            errors: errors.clone(),
            status: status_tx,
        };
        tokio::spawn(worker.run());

        Self {
            config,
            commands,
            changes,
            errors,
            status,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Open the connection. Idempotent; calling while joining or joined is a
    /// no-op. The result is observed via [`subscribe_errors`] /
    /// [`status_stream`], never returned here.
    ///
    /// [`subscribe_errors`]: Self::subscribe_errors
    /// [`status_stream`]: Self::status_stream
    pub fn connect(&self) {
        let _ = self.commands.send(Command::Connect);
    }

    /// Leave the channel. Idempotent and safe when never connected.
    pub fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }

    /// Send application event `name` with `payload`. The name is namespaced
    /// on the wire (see [`event::EVENT_PREFIX`](crate::event::EVENT_PREFIX));
    /// the payload passes through unchanged. Fire-and-forget.
    pub fn push_event(&self, name: &str, payload: Value) {
        let _ = self.commands.send(Command::PushEvent {
            name: name.to_string(),
            payload,
        });
    }

    /// Notifications for every snapshot change, full or patch. Each carries
    /// the complete post-update value.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    /// Classified error notifications (join failures, socket drops, patch
    /// problems).
    pub fn subscribe_errors(&self) -> broadcast::Receiver<Error> {
        self.errors.subscribe()
    }

    /// Bind inbound channel messages named `name` to a local stream. Binding
    /// the same name twice delivers each message twice; bindings last for
    /// the life of the instance (dropping the receiver is the only way out).
    pub fn receive_event(&self, name: &str) -> mpsc::UnboundedReceiver<Value> {
        let (sink, stream) = mpsc::unbounded_channel();
        let _ = self.commands.send(Command::Bind {
            name: name.to_string(),
            sink,
        });
        stream
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Watchable connection status, for callers that want to await `Joined`
    /// or `Errored`.
    pub fn status_stream(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }
}

/// Owns all mutable state; runs until every `LiveState` handle is gone.
struct Worker {
    config: Config,
    connection: ConnectionManager,
    store: StateStore,
    router: EventRouter,
    commands: mpsc::UnboundedReceiver<Command>,
    changes: broadcast::Sender<StateChange>,
    errors: broadcast::Sender<Error>,
    status: watch::Sender<ConnectionStatus>,
}

impl Worker {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                message = self.connection.next_message(), if self.connection.is_joined() => {
                    match message {
                        Some(message) => self.handle_message(message),
                        None => {
                            self.connection.mark_errored();
                            self.status.send_replace(ConnectionStatus::Errored);
                            self.report(Error::Socket("channel closed".into()));
                        }
                    }
                }
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => {
                if self.connection.status() != ConnectionStatus::Unconnected {
                    return;
                }
                self.status.send_replace(ConnectionStatus::Joining);
                match self.connection.connect(&self.config).await {
                    Ok(()) => {
                        self.status.send_replace(ConnectionStatus::Joined);
                    }
                    Err(err) => {
                        self.status.send_replace(ConnectionStatus::Errored);
                        self.report(err);
                    }
                }
            }
            Command::Disconnect => {
                self.connection.disconnect();
                self.status.send_replace(ConnectionStatus::Unconnected);
            }
            Command::PushEvent { name, payload } => {
                self.connection.push(&event::namespaced(&name), payload);
            }
            Command::Bind { name, sink } => {
                self.router.bind(name, sink);
            }
        }
    }

    fn handle_message(&mut self, message: ChannelMessage) {
        match message.event.as_str() {
            STATE_CHANGE_EVENT => match serde_json::from_value::<StatePayload>(message.payload) {
                Ok(payload) => {
                    let change = self.store.replace(payload.state, payload.version);
                    let _ = self.changes.send(change);
                }
                Err(err) => {
                    self.report(Error::Socket(format!(
                        "malformed {STATE_CHANGE_EVENT} payload: {err}"
                    )));
                }
            },
            STATE_PATCH_EVENT => match serde_json::from_value::<PatchPayload>(message.payload) {
                Ok(payload) => match self.store.apply_patch(&payload.patch, payload.version) {
                    Ok((change, skipped)) => {
                        let _ = self.changes.send(change);
                        if !skipped.is_empty() {
                            let detail: Vec<String> =
                                skipped.iter().map(ToString::to_string).collect();
                            self.report(Error::Patch(format!(
                                "skipped {} op(s): {}",
                                detail.len(),
                                detail.join("; ")
                            )));
                        }
                    }
                    Err(err) => self.report(err),
                },
                Err(err) => {
                    self.report(Error::Socket(format!(
                        "malformed {STATE_PATCH_EVENT} payload: {err}"
                    )));
                }
            },
            _ => {
                self.router.dispatch(&message.event, &message.payload);
            }
        }
    }

    fn report(&self, error: Error) {
        tracing::warn!(kind = error.kind(), message = error.message(), "sync error");
        let _ = self.errors.send(error);
    }
}
