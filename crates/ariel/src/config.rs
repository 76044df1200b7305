//! Ariel configuration

use crate::Error;
use binder::BindOptions;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use transport::{Protocol, TransportConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_MESSAGE_SIZE};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Client configuration
///
/// Every field has a default, so an empty file or environment yields a
/// gRPC client for `localhost:8001`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArielConfig {
    /// Wire protocol
    pub protocol: Protocol,

    /// `host:port` or URI; protocol default when unset
    pub endpoint: Option<String>,

    /// Pinned model version; the backend chooses when unset
    pub model_version: Option<String>,

    /// Connect timeout (milliseconds)
    pub connect_timeout_ms: u64,

    /// Per-request deadline (milliseconds)
    pub request_timeout_ms: Option<u64>,

    /// Reject datatype and shape mismatches at bind time
    pub strict_binding: bool,

    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,

    pub log_format: LogFormat,
}

impl Default for ArielConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::Grpc,
            endpoint: None,
            model_version: None,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
            request_timeout_ms: None,
            strict_binding: false,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl ArielConfig {
    /// Load from an optional file, overridden by `ARIEL_*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        Self::from_builder(builder)
    }

    /// Defaults overridden by `ARIEL_*` environment variables
    pub fn from_env() -> Result<Self, Error> {
        Self::load(None)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, Error> {
        let config = builder
            .add_source(Environment::with_prefix("ARIEL").try_parsing(true))
            .build()?
            .try_deserialize::<Self>()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.connect_timeout_ms == 0 {
            return Err(Error::Config("connect_timeout_ms must be positive".to_string()));
        }
        if self.request_timeout_ms == Some(0) {
            return Err(Error::Config("request_timeout_ms must be positive".to_string()));
        }
        if matches!(self.endpoint.as_deref(), Some(e) if e.trim().is_empty()) {
            return Err(Error::Config("endpoint must not be empty".to_string()));
        }
        Ok(())
    }

    /// Same settings over another protocol
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Transport settings for [`transport::connect`]
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            protocol: self.protocol,
            endpoint: self.endpoint.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: self.request_timeout_ms.map(Duration::from_millis),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    pub fn bind_options(&self) -> BindOptions {
        BindOptions {
            strict: self.strict_binding,
        }
    }
}
