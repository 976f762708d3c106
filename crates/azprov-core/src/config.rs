//! Configuration structures for provisioning clients.
//!
//! This module provides the serializable configuration for a provisioner: the Resource
//! Manager and authority endpoints, request timeouts and the bounded wait applied to
//! long-running operations.

use crate::client::{ClientConfig, PollPolicy};
use crate::types::{DEFAULT_AUTHORITY_HOST, DEFAULT_MANAGEMENT_ENDPOINT};
use crate::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Configuration for a provisioner instance.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProvisionerConfig {
    /// Azure Resource Manager base URL
    #[validate(url)]
    #[serde(default = "default_management_endpoint")]
    pub management_endpoint: String,

    /// Token authority host
    #[validate(url)]
    #[serde(default = "default_authority_host")]
    pub authority_host: String,

    /// Whether to verify TLS certificates
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Long-running operation polling
    #[validate(nested)]
    #[serde(default)]
    pub poll: PollConfig,
}

fn default_management_endpoint() -> String {
    DEFAULT_MANAGEMENT_ENDPOINT.to_string()
}

fn default_authority_host() -> String {
    DEFAULT_AUTHORITY_HOST.to_string()
}

const fn default_tls_verify() -> bool {
    true
}

const fn default_request_timeout_secs() -> u64 {
    30
}

impl ProvisionerConfig {
    /// Create a configuration targeting the given Resource Manager endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or validation fails.
    pub fn new(management_endpoint: impl Into<String>) -> Result<Self, Error> {
        let config = Self {
            management_endpoint: management_endpoint.into(),
            ..Self::default()
        };

        config
            .validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;

        Ok(config)
    }

    /// Set the token authority host.
    #[must_use]
    pub fn with_authority_host(mut self, host: impl Into<String>) -> Self {
        self.authority_host = host.into();
        self
    }

    /// Set whether to verify TLS certificates.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Set request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    /// Set the long-running operation polling configuration.
    #[must_use]
    pub const fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Parse the Resource Manager endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn parse_management_endpoint(&self) -> Result<Url, Error> {
        Url::parse(&self.management_endpoint)
            .map_err(|e| Error::ConfigError(format!("Invalid management endpoint: {e}")))
    }

    /// Parse the authority host.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn parse_authority_host(&self) -> Result<Url, Error> {
        Url::parse(&self.authority_host)
            .map_err(|e| Error::ConfigError(format!("Invalid authority host: {e}")))
    }

    /// HTTP client settings derived from this configuration.
    #[must_use]
    pub const fn client_config(&self) -> ClientConfig {
        ClientConfig::new()
            .with_timeout(self.timeout())
            .with_tls_verify(self.tls_verify)
    }

    /// Poll policy derived from this configuration.
    #[must_use]
    pub const fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new()
            .with_interval(self.poll.interval())
            .with_max_wait(self.poll.max_wait())
    }
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            management_endpoint: default_management_endpoint(),
            authority_host: default_authority_host(),
            tls_verify: default_tls_verify(),
            request_timeout_secs: default_request_timeout_secs(),
            poll: PollConfig::default(),
        }
    }
}

/// Polling configuration for long-running operations.
///
/// There is no retry budget: the maximum wait bounds a single operation, after which the
/// operation is reported as timed out and may still complete remotely.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct PollConfig {
    /// Delay between status polls in seconds
    #[validate(range(min = 1, max = 60))]
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,

    /// Maximum time to wait for a single operation in seconds
    #[validate(range(min = 1, max = 7200))]
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
}

const fn default_poll_interval_secs() -> u64 {
    5
}

const fn default_max_wait_secs() -> u64 {
    900
}

impl PollConfig {
    /// Create a polling configuration with defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            interval_secs: default_poll_interval_secs(),
            max_wait_secs: default_max_wait_secs(),
        }
    }

    /// Set the poll interval in seconds.
    #[must_use]
    pub const fn with_interval(mut self, seconds: u64) -> Self {
        self.interval_secs = seconds;
        self
    }

    /// Set the maximum wait in seconds.
    #[must_use]
    pub const fn with_max_wait(mut self, seconds: u64) -> Self {
        self.max_wait_secs = seconds;
        self
    }

    /// Poll interval as a Duration.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Maximum wait as a Duration.
    #[must_use]
    pub const fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::new()
    }
}
