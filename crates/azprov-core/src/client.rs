//! HTTP client utilities and long-running operation poll policy.
//!
//! This module provides HTTP client configuration, the bounded poll policy used when
//! awaiting long-running operations, and the [`ServiceClient`] shared by the per-service
//! client crates.

use crate::auth::Session;
use crate::error::map_status_to_error;
use crate::types::AzureService;
use crate::{Error, Result};
use reqwest::{Client, ClientBuilder, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

// API versions pinned per resource provider

/// API version for `Microsoft.Resources`
pub const RESOURCES_API_VERSION: &str = "2021-04-01";

/// API version for `Microsoft.Storage`
pub const STORAGE_API_VERSION: &str = "2023-01-01";

/// API version for `Microsoft.Network`
pub const NETWORK_API_VERSION: &str = "2023-09-01";

/// API version for `Microsoft.Compute`
pub const COMPUTE_API_VERSION: &str = "2023-09-01";

// Service-specific timeout configurations (in seconds)

/// Default timeout for resource group requests
pub const RESOURCES_DEFAULT_TIMEOUT: u64 = 30;

/// Default timeout for storage requests
pub const STORAGE_DEFAULT_TIMEOUT: u64 = 30;

/// Default timeout for network requests
pub const NETWORK_DEFAULT_TIMEOUT: u64 = 30;

/// Default timeout for compute requests
pub const COMPUTE_DEFAULT_TIMEOUT: u64 = 60;

// Connection pool settings

/// Default idle timeout for connection pools
pub const DEFAULT_POOL_IDLE_TIMEOUT: u64 = 90;

/// Default maximum idle connections per host
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 10;

// Poll settings

/// Default delay between long-running operation polls in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;

/// Default bounded wait for a single long-running operation in seconds
pub const DEFAULT_MAX_WAIT_SECS: u64 = 900;

/// Returns the pinned API version for a service.
#[must_use]
pub const fn api_version(service: AzureService) -> &'static str {
    match service {
        AzureService::Resources => RESOURCES_API_VERSION,
        AzureService::Storage => STORAGE_API_VERSION,
        AzureService::Network => NETWORK_API_VERSION,
        AzureService::Compute => COMPUTE_API_VERSION,
    }
}

/// Returns the default request timeout for a service.
#[must_use]
pub const fn default_timeout(service: AzureService) -> Duration {
    Duration::from_secs(match service {
        AzureService::Resources => RESOURCES_DEFAULT_TIMEOUT,
        AzureService::Storage => STORAGE_DEFAULT_TIMEOUT,
        AzureService::Network => NETWORK_DEFAULT_TIMEOUT,
        AzureService::Compute => COMPUTE_DEFAULT_TIMEOUT,
    })
}

/// Polling policy for long-running operations.
///
/// Bounds how long a caller blocks on a single operation. Failed operations are never
/// resubmitted; the only knobs are the poll cadence and the total wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between status polls
    pub interval: Duration,

    /// Maximum total wait before the operation is reported as timed out
    pub max_wait: Duration,

    /// Whether a provider `Retry-After` hint may replace the interval
    pub honor_retry_after: bool,
}

impl PollPolicy {
    /// Create a poll policy with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_wait: Duration::from_secs(DEFAULT_MAX_WAIT_SECS),
            honor_retry_after: true,
        }
    }

    /// Set the poll interval.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the maximum wait.
    #[must_use]
    pub const fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Enable or disable honoring `Retry-After`.
    #[must_use]
    pub const fn with_retry_after(mut self, honor: bool) -> Self {
        self.honor_retry_after = honor;
        self
    }

    /// Delay before the next poll, given the provider's `Retry-After` hint.
    ///
    /// A hint never stretches the delay beyond `max_wait`.
    #[must_use]
    pub fn next_delay(&self, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) if self.honor_retry_after => std::cmp::min(hint, self.max_wait),
            _ => self.interval,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP client configuration.
///
/// Configures HTTP client behavior including timeouts, TLS and connection pooling.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout
    pub timeout: Duration,

    /// Connection pool idle timeout
    pub pool_idle_timeout: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Enable request logging
    pub enable_logging: bool,

    /// Enable response compression
    pub enable_compression: bool,

    /// Verify TLS certificates
    pub tls_verify: bool,
}

impl ClientConfig {
    /// Create a new client configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            pool_idle_timeout: Duration::from_secs(DEFAULT_POOL_IDLE_TIMEOUT),
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            enable_logging: true,
            enable_compression: true,
            tls_verify: true,
        }
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set connection pool idle timeout.
    #[must_use]
    pub const fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Set maximum idle connections per host.
    #[must_use]
    pub const fn with_pool_max_idle(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Enable or disable logging.
    #[must_use]
    pub const fn with_logging(mut self, enabled: bool) -> Self {
        self.enable_logging = enabled;
        self
    }

    /// Enable or disable compression.
    #[must_use]
    pub const fn with_compression(mut self, enabled: bool) -> Self {
        self.enable_compression = enabled;
        self
    }

    /// Enable or disable TLS certificate verification.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Build a `reqwest` client from this configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the TLS backend cannot be initialised.
    pub fn build_http(&self, user_agent: &str) -> Result<Client> {
        let mut builder = ClientBuilder::new()
            .user_agent(user_agent)
            .timeout(self.timeout)
            .pool_idle_timeout(self.pool_idle_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .connect_timeout(Duration::from_secs(10));

        if !self.enable_compression {
            builder = builder.no_gzip();
        }

        if !self.tls_verify {
            warn!("TLS verification disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder
            .build()
            .map_err(|err| Error::ConfigError(format!("Failed to build HTTP client: {err}")))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`ServiceClient`].
#[derive(Debug, Clone)]
pub struct ServiceClientBuilder {
    service: AzureService,
    base_url: Url,
    session: Arc<Session>,
    api_version: String,
    http_config: ClientConfig,
    poll_policy: PollPolicy,
    user_agent: String,
}

impl ServiceClientBuilder {
    /// Create a builder for a service rooted at the Resource Manager endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid.
    pub fn new(
        service: AzureService,
        base_url: impl AsRef<str>,
        session: Arc<Session>,
    ) -> Result<Self> {
        let raw = base_url.as_ref();
        // Paths are joined relative to the base, which must end in a slash.
        let normalized = if raw.ends_with('/') {
            raw.to_string()
        } else {
            format!("{raw}/")
        };
        let url = Url::parse(&normalized).map_err(|err| {
            Error::ConfigError(format!("Invalid {service} base URL `{raw}`: {err}"))
        })?;

        Ok(Self {
            service,
            base_url: url,
            session,
            api_version: api_version(service).to_string(),
            http_config: ClientConfig::new().with_timeout(default_timeout(service)),
            poll_policy: PollPolicy::new(),
            user_agent: format!("azprov/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    /// Override the API version sent with every request.
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.http_config = config;
        self
    }

    /// Override the long-running operation poll policy.
    #[must_use]
    pub const fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    /// Override the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn build(self) -> Result<ServiceClient> {
        let http = self.http_config.build_http(&self.user_agent)?;
        Ok(ServiceClient {
            service: self.service,
            http,
            base_url: self.base_url,
            session: self.session,
            api_version: self.api_version,
            poll_policy: self.poll_policy,
            enable_logging: self.http_config.enable_logging,
        })
    }
}

/// Authenticated HTTP client for one Resource Manager service.
///
/// Cheap to clone: the connection pool and session are shared.
#[derive(Clone)]
pub struct ServiceClient {
    service: AzureService,
    http: Client,
    base_url: Url,
    session: Arc<Session>,
    api_version: String,
    poll_policy: PollPolicy,
    enable_logging: bool,
}

impl ServiceClient {
    /// The service this client talks to.
    #[must_use]
    pub const fn service(&self) -> AzureService {
        self.service
    }

    /// The Resource Manager base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The session used to authenticate requests.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The API version sent with every request.
    #[must_use]
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// The poll policy applied to long-running operations.
    #[must_use]
    pub const fn poll_policy(&self) -> PollPolicy {
        self.poll_policy
    }

    /// Resolve a resource path against the base URL and append the API version.
    ///
    /// Each `/`-separated segment is percent-encoded, so a name containing `?` or `#`
    /// stays part of the path instead of addressing another resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot carry a path.
    pub fn resource_url(&self, path: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                Error::InvalidEndpoint(format!(
                    "{} base URL `{}` cannot carry a path",
                    self.service, self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(path.split('/').filter(|segment| !segment.is_empty()));
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }

    /// Fetch a resource and deserialize it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the resource does not exist, or the mapped provider error.
    pub async fn get_json<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = self.resource_url(path)?;
        let response = self.execute::<()>(Method::GET, url, None).await?;
        self.read_json(path, response).await
    }

    /// Issue a request against an absolute URL and return the successful response.
    ///
    /// Used for resource paths as well as the operation URLs handed back by the provider,
    /// which already carry their own `api-version`.
    ///
    /// # Errors
    ///
    /// Fails with `Authentication` if the session has expired, otherwise with the
    /// error mapped from a non-success status.
    pub async fn execute<B>(&self, method: Method, url: Url, body: Option<&B>) -> Result<Response>
    where
        B: Serialize + ?Sized,
    {
        self.session.ensure_valid()?;

        if self.enable_logging {
            info!(service = %self.service, %method, path = url.path(), "Resource Manager request");
        }

        let mut request = self.authorize(self.http.request(method, url));
        request = request.header("Accept", "application/json");
        if let Some(payload) = body {
            request = request.json(payload);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(map_status_to_error(self.service.name(), status, &text))
    }

    /// Read a successful response body as JSON.
    ///
    /// # Errors
    ///
    /// Returns a parse error naming the path when the body does not match `T`.
    pub async fn read_json<T>(&self, path: &str, response: Response) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let bytes = response.bytes().await.map_err(|err| {
            Error::HttpError(format!(
                "Failed to read {} response body: {err}",
                self.service
            ))
        })?;
        serde_json::from_slice(&bytes).map_err(|err| {
            Error::ParseError(format!(
                "Failed to parse {} response for `{path}`: {err}",
                self.service
            ))
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.session.bearer_token())
    }
}
