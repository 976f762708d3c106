//! Credential providers and the scoped provisioning session.
//!
//! A [`Session`] is acquired once per provisioning run from a [`CredentialProvider`] and
//! shared by every service client of that run. The bearer token lives in a
//! [`SecretString`], so it is redacted from `Debug` output and zeroized when the session
//! is dropped.

use crate::config::ProvisionerConfig;
use crate::types::DEFAULT_AUTHORITY_HOST;
use crate::uuid::{ClientId, SubscriptionId};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Public client id of the Azure CLI, used for username/password sign-in.
pub const AZURE_CLI_CLIENT_ID: &str = "04b07795-8ddb-461a-bbee-02f9e1bf7b46";

/// Default tenant for username/password sign-in.
pub const DEFAULT_TENANT: &str = "common";

/// Token audience for Azure Resource Manager.
pub const DEFAULT_TOKEN_RESOURCE: &str = "https://management.core.windows.net/";

/// Tokens this close to expiry are treated as expired.
pub const EXPIRY_SKEW_SECS: i64 = 30;

/// Bearer token issued by a credential provider.
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// The bearer token
    pub token: SecretString,
    /// Expiry, if the issuer reported one
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// Create a token.
    #[must_use]
    pub fn new(token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            token: SecretString::from(token.into()),
            expires_at,
        }
    }
}

/// Exchanges caller credentials for a Resource Manager bearer token.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Acquire a fresh token.
    ///
    /// # Errors
    ///
    /// Returns `Authentication` if the credentials are rejected.
    async fn acquire_token(&self) -> Result<AccessToken>;
}

/// Authenticated context of one provisioning run.
#[derive(Debug)]
pub struct Session {
    subscription: SubscriptionId,
    token: SecretString,
    expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Acquire a session for a subscription.
    ///
    /// # Errors
    ///
    /// Propagates the provider's error, typically `Authentication`.
    pub async fn acquire(
        provider: &dyn CredentialProvider,
        subscription: SubscriptionId,
    ) -> Result<Self> {
        let token = provider.acquire_token().await?;
        info!(%subscription, expires_at = ?token.expires_at, "Acquired provisioning session");
        Ok(Self {
            subscription,
            token: token.token,
            expires_at: token.expires_at,
        })
    }

    /// Build a session from an already issued token.
    #[must_use]
    pub fn with_token(
        subscription: SubscriptionId,
        token: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            subscription,
            token: SecretString::from(token.into()),
            expires_at,
        }
    }

    /// The subscription this session is bound to.
    #[must_use]
    pub const fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    /// Token expiry, if known.
    #[must_use]
    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns true if the token expires within `window`.
    #[must_use]
    pub fn expires_within(&self, window: Duration) -> bool {
        let Ok(window) = ChronoDuration::from_std(window) else {
            return self.expires_at.is_some();
        };
        self.expires_at
            .is_some_and(|expiry| expiry <= Utc::now() + window)
    }

    /// Returns true once the token can no longer be used.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expiry| expiry - ChronoDuration::seconds(EXPIRY_SKEW_SECS) <= Utc::now())
    }

    /// Fail with `Authentication` if the token has expired.
    ///
    /// # Errors
    ///
    /// Returns `Authentication` for an expired session.
    pub fn ensure_valid(&self) -> Result<()> {
        if self.is_expired() {
            return Err(Error::Authentication(format!(
                "session for subscription {} expired",
                self.subscription
            )));
        }
        if self.expires_within(Duration::from_secs(300)) {
            warn!(subscription = %self.subscription, "Provisioning session expires within 5 minutes");
        }
        Ok(())
    }

    pub(crate) fn bearer_token(&self) -> &str {
        self.token.expose_secret()
    }
}

/// A token obtained out of band.
#[derive(Debug, Clone)]
pub struct StaticTokenCredential {
    token: AccessToken,
}

impl StaticTokenCredential {
    /// Wrap a pre-issued token.
    #[must_use]
    pub fn new(token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            token: AccessToken::new(token, expires_at),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticTokenCredential {
    async fn acquire_token(&self) -> Result<AccessToken> {
        Ok(self.token.clone())
    }
}

/// OAuth2 token endpoint of a tenant.
#[derive(Debug, Clone)]
struct TokenEndpoint {
    http: Client,
    authority: Url,
    tenant: String,
    resource: String,
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default, deserialize_with = "deserialize_expires_in")]
    expires_in: Option<i64>,
}

/// Token endpoint error body.
#[derive(Debug, Default, Deserialize)]
struct TokenError {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: String,
}

// The v1 endpoint reports `expires_in` as a string, v2 as a number.
fn deserialize_expires_in<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(secs)) => Some(secs),
        Some(Raw::Text(text)) => text.parse().ok(),
        None => None,
    })
}

// Out-of-range lifetimes are treated as unknown rather than trusted.
fn expiry_after(secs: i64) -> Option<DateTime<Utc>> {
    let expiry = ChronoDuration::try_seconds(secs)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime));
    if expiry.is_none() {
        warn!(expires_in = secs, "Ignoring out-of-range token lifetime");
    }
    expiry
}

impl TokenEndpoint {
    fn new(authority_host: &str, tenant: String) -> Result<Self> {
        let normalized = if authority_host.ends_with('/') {
            authority_host.to_string()
        } else {
            format!("{authority_host}/")
        };
        let authority = Url::parse(&normalized).map_err(|err| {
            Error::ConfigError(format!("Invalid authority host `{authority_host}`: {err}"))
        })?;
        let http = Client::builder()
            .user_agent(concat!("azprov/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| Error::ConfigError(format!("Failed to build token client: {err}")))?;

        Ok(Self {
            http,
            authority,
            tenant,
            resource: DEFAULT_TOKEN_RESOURCE.to_string(),
        })
    }

    fn token_url(&self) -> Result<Url> {
        self.authority
            .join(&format!("{}/oauth2/token", self.tenant))
            .map_err(|err| Error::ConfigError(format!("Invalid tenant `{}`: {err}", self.tenant)))
    }

    async fn request(&self, form: &[(&str, &str)]) -> Result<AccessToken> {
        let url = self.token_url()?;
        debug!(tenant = %self.tenant, "Requesting management token");

        let response = self
            .http
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|err| Error::Authentication(format!("token request failed: {err}")))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| Error::Authentication(format!("token response unreadable: {err}")))?;

        if !status.is_success() {
            let body: TokenError = serde_json::from_slice(&bytes).unwrap_or_default();
            return Err(Error::Authentication(format!(
                "token endpoint returned {status}: {} {}",
                body.error, body.error_description
            )));
        }

        let body: TokenResponse = serde_json::from_slice(&bytes)
            .map_err(|err| Error::Authentication(format!("malformed token response: {err}")))?;
        let expires_at = body.expires_in.and_then(expiry_after);

        Ok(AccessToken::new(body.access_token, expires_at))
    }
}

/// Username/password sign-in (OAuth2 resource owner password grant).
#[derive(Debug, Clone)]
pub struct UserPassCredential {
    username: String,
    password: SecretString,
    client_id: String,
    endpoint: TokenEndpoint,
}

impl UserPassCredential {
    /// Create a credential against the default authority and tenant.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the token client cannot be built.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        Ok(Self {
            username: username.into(),
            password: SecretString::from(password.into()),
            client_id: AZURE_CLI_CLIENT_ID.to_string(),
            endpoint: TokenEndpoint::new(DEFAULT_AUTHORITY_HOST, DEFAULT_TENANT.to_string())?,
        })
    }

    /// Create a credential against the configured authority host and the default tenant.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the authority URL is invalid.
    pub fn from_config(
        config: &ProvisionerConfig,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        Self::new(username, password)?.with_authority(&config.authority_host, DEFAULT_TENANT)
    }

    /// Use a different authority host and tenant.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the authority URL is invalid.
    pub fn with_authority(
        mut self,
        authority_host: &str,
        tenant: impl Into<String>,
    ) -> Result<Self> {
        self.endpoint = TokenEndpoint {
            resource: self.endpoint.resource,
            ..TokenEndpoint::new(authority_host, tenant.into())?
        };
        Ok(self)
    }

    /// Use a different public client registration.
    #[must_use]
    pub fn with_client_id(mut self, client_id: ClientId) -> Self {
        self.client_id = client_id.to_string();
        self
    }

    /// Request tokens for a different audience.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.endpoint.resource = resource.into();
        self
    }
}

#[async_trait]
impl CredentialProvider for UserPassCredential {
    async fn acquire_token(&self) -> Result<AccessToken> {
        self.endpoint
            .request(&[
                ("grant_type", "password"),
                ("client_id", &self.client_id),
                ("username", &self.username),
                ("password", self.password.expose_secret()),
                ("resource", &self.endpoint.resource),
            ])
            .await
    }
}

/// Service principal sign-in (OAuth2 client credentials grant).
#[derive(Debug, Clone)]
pub struct ServicePrincipalCredential {
    client_id: ClientId,
    secret: SecretString,
    endpoint: TokenEndpoint,
}

impl ServicePrincipalCredential {
    /// Create a credential for an app registration in `tenant`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the token client cannot be built.
    pub fn new(
        client_id: ClientId,
        secret: impl Into<String>,
        tenant: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            client_id,
            secret: SecretString::from(secret.into()),
            endpoint: TokenEndpoint::new(DEFAULT_AUTHORITY_HOST, tenant.into())?,
        })
    }

    /// Create a credential for `tenant` against the configured authority host.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the authority URL is invalid.
    pub fn from_config(
        config: &ProvisionerConfig,
        client_id: ClientId,
        secret: impl Into<String>,
        tenant: impl Into<String>,
    ) -> Result<Self> {
        Self::new(client_id, secret, tenant)?.with_authority_host(&config.authority_host)
    }

    /// Use a different authority host.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the authority URL is invalid.
    pub fn with_authority_host(mut self, authority_host: &str) -> Result<Self> {
        self.endpoint = TokenEndpoint {
            resource: self.endpoint.resource,
            ..TokenEndpoint::new(authority_host, self.endpoint.tenant)?
        };
        Ok(self)
    }

    /// Request tokens for a different audience.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.endpoint.resource = resource.into();
        self
    }
}

#[async_trait]
impl CredentialProvider for ServicePrincipalCredential {
    async fn acquire_token(&self) -> Result<AccessToken> {
        let client_id = self.client_id.to_string();
        self.endpoint
            .request(&[
                ("grant_type", "client_credentials"),
                ("client_id", &client_id),
                ("client_secret", self.secret.expose_secret()),
                ("resource", &self.endpoint.resource),
            ])
            .await
    }
}
