//! # livesync - real-time state synchronization client
//!
//! Keeps a local snapshot synchronized with a server-held value over a
//! long-lived message channel, and multiplexes application events over the
//! same connection.
//!
//! ## Features
//!
//! - **Full + incremental updates**: `state:change` replaces the snapshot,
//!   `state:patch` applies JSON Patch operations; consumers always see the
//!   complete post-update value
//! - **Event multiplexing**: outbound events are namespaced so they can never
//!   collide with system messages; inbound events map 1:1 to channel names
//! - **Order-independent sharing**: a [`Registry`] lets any number of
//!   consumers resolve a shared instance before or after it is published
//! - **Single-task core**: one worker task per instance serializes all
//!   mutation; no public method blocks the caller
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use livesync::{Config, LiveState};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), livesync::Error> {
//!     let config = Config::builder()
//!         .url("wss://example.com/socket/websocket")
//!         .topic("todo:42")
//!         .param("token", "secret")
//!         .build()?;
//!
//!     let live = LiveState::new(config);
//!     let mut changes = live.subscribe_changes();
//!     live.connect();
//!
//!     while let Ok(change) = changes.recv().await {
//!         println!("v{}: {}", change.version, change.state);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connect;
pub mod error;
pub mod event;
pub mod path;
pub mod registry;
pub mod state;
pub mod sync;
pub mod transport;

// Re-export main types for library consumers
pub use config::{Config, ConfigBuilder};
pub use connect::{attach, Binding, ConnectOptions, PropertyBinding, StateSink};
pub use error::Error;
pub use registry::{Registry, Scope};
pub use state::{PatchOp, StateChange, StateStore};
pub use sync::{connection::ConnectionStatus, LiveState};
pub use transport::{ChannelMessage, Transport};

/// Registry specialized to shared synchronization instances.
pub type LiveStateRegistry = Registry<std::sync::Arc<LiveState>>;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
