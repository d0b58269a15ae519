//! Error taxonomy for the synchronization core.
//!
//! Runtime failures (join rejections, socket drops, bad patches) never cross
//! the public API as `Err` values; they are broadcast as notifications on the
//! owning [`LiveState`](crate::LiveState) and classified by [`Error::kind`].
//! Only construction-time misuse (an invalid [`Config`](crate::Config))
//! fails fast.

use thiserror::Error;

/// All failure modes surfaced by this crate.
///
/// The enum is `Clone` because instances of it are fanned out over a
/// broadcast channel to every error subscriber.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// The channel rejected our join request.
    #[error("channel join error: {0}")]
    Join(String),

    /// The underlying socket failed to connect or dropped mid-session.
    #[error("socket error: {0}")]
    Socket(String),

    /// A patch message could not be applied (in whole or in part).
    #[error("patch error: {0}")]
    Patch(String),

    /// Invalid configuration supplied at build time.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Stable classifier string, used as the `type` field of error
    /// notifications delivered to consumers.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Join(_) => "channel join error",
            Error::Socket(_) => "socket error",
            Error::Patch(_) => "patch error",
            Error::Config(_) => "config error",
        }
    }

    /// Human-readable message without the classifier prefix.
    pub fn message(&self) -> &str {
        match self {
            Error::Join(m) | Error::Socket(m) | Error::Patch(m) | Error::Config(m) => m,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
