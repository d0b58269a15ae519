//! Connection configuration.
//!
//! A [`Config`] is immutable once built. Construction goes through
//! [`ConfigBuilder`], which accepts plain values as well as *resolver*
//! closures keyed by configuration key (`"url"`, `"topic"`, `"params.<name>"`,
//! `"socketOptions"`). All resolvers are evaluated exactly once at build time,
//! so the resulting `Config` is an ordinary value with no late binding.

use std::time::Duration;

use serde_json::{Map, Value};
use url::Url;

use crate::error::{Error, Result};

/// Default join handshake timeout, overridable via the `timeout_ms`
/// socket option.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_millis(5000);

/// Immutable configuration for one synchronization instance.
#[derive(Debug, Clone)]
pub struct Config {
    /// WebSocket endpoint address.
    pub url: Url,
    /// Channel topic to join on the endpoint.
    pub topic: String,
    /// Join parameters, sent once with the join request.
    pub params: Map<String, Value>,
    /// Transport-level passthrough options.
    pub socket_options: Map<String, Value>,
}

impl Config {
    /// Start building a configuration.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Shorthand for the common url + topic case.
    pub fn new(url: &str, topic: &str) -> Result<Self> {
        Self::builder().url(url).topic(topic).build()
    }

    /// Join handshake timeout, from the `timeout_ms` socket option.
    pub fn join_timeout(&self) -> Duration {
        self.socket_options
            .get("timeout_ms")
            .and_then(Value::as_u64)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_JOIN_TIMEOUT)
    }
}

type Resolver = Box<dyn FnOnce() -> Value + Send>;

/// Builder for [`Config`].
///
/// Fails fast at [`build`](ConfigBuilder::build) on a missing or unparseable
/// url, an empty topic, an unrecognized resolver key, or a resolver returning
/// a value of the wrong type.
#[derive(Default)]
pub struct ConfigBuilder {
    url: Option<String>,
    topic: Option<String>,
    params: Map<String, Value>,
    socket_options: Map<String, Value>,
    resolvers: Vec<(String, Resolver)>,
}

impl ConfigBuilder {
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Add one join parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add one transport-level option.
    pub fn socket_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.socket_options.insert(key.into(), value.into());
        self
    }

    /// Register a resolver for a configuration key. Recognized keys are
    /// `"url"`, `"topic"`, `"socketOptions"` and `"params.<name>"`. Resolvers
    /// run once, in registration order, when `build` is called; a resolved
    /// value overrides any plain value set for the same key.
    pub fn resolver(
        mut self,
        key: impl Into<String>,
        resolve: impl FnOnce() -> Value + Send + 'static,
    ) -> Self {
        self.resolvers.push((key.into(), Box::new(resolve)));
        self
    }

    pub fn build(mut self) -> Result<Config> {
        for (key, resolve) in std::mem::take(&mut self.resolvers) {
            let value = resolve();
            if let Some(param) = key.strip_prefix("params.") {
                self.params.insert(param.to_string(), value);
            } else {
                match key.as_str() {
                    "url" => match value {
                        Value::String(url) => self.url = Some(url),
                        other => {
                            return Err(Error::Config(format!(
                                "url resolver must return a string, got {other}"
                            )));
                        }
                    },
                    "topic" => match value {
                        Value::String(topic) => self.topic = Some(topic),
                        other => {
                            return Err(Error::Config(format!(
                                "topic resolver must return a string, got {other}"
                            )));
                        }
                    },
                    "socketOptions" => match value {
                        Value::Object(options) => self.socket_options.extend(options),
                        other => {
                            return Err(Error::Config(format!(
                                "socketOptions resolver must return an object, got {other}"
                            )));
                        }
                    },
                    other => {
                        return Err(Error::Config(format!("unrecognized config key: {other}")));
                    }
                }
            }
        }

        let url = self
            .url
            .ok_or_else(|| Error::Config("url is required".into()))?;
        let url = Url::parse(&url).map_err(|e| Error::Config(format!("invalid url: {e}")))?;
        let topic = self
            .topic
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Config("topic is required".into()))?;

        Ok(Config {
            url,
            topic,
            params: self.params,
            socket_options: self.socket_options,
        })
    }
}
