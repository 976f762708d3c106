//! Asynchronous storage account client implementation.

use crate::models::{CreateStorageAccountRequest, StorageAccount};
use crate::Result;
use azprov_core::auth::Session;
use azprov_core::client::{ClientConfig, PollPolicy, ServiceClient, ServiceClientBuilder};
use azprov_core::lro::CreateOutcome;
use azprov_core::types::{AzureService, ResourceRef};
use std::sync::Arc;
use tracing::info;
use url::Url;

/// Builder for [`StorageClient`].
#[derive(Debug, Clone)]
pub struct StorageClientBuilder {
    inner: ServiceClientBuilder,
}

impl StorageClientBuilder {
    /// Create a new builder for the given Resource Manager endpoint.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the base URL is invalid.
    pub fn new(base_url: impl AsRef<str>, session: Arc<Session>) -> Result<Self> {
        Ok(Self {
            inner: ServiceClientBuilder::new(AzureService::Storage, base_url, session)?,
        })
    }

    /// Override the API version.
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.inner = self.inner.with_api_version(version);
        self
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.inner = self.inner.with_http_config(config);
        self
    }

    /// Override the long-running operation poll policy.
    #[must_use]
    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.inner = self.inner.with_poll_policy(policy);
        self
    }

    /// Build the client instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn build(self) -> Result<StorageClient> {
        Ok(StorageClient {
            inner: self.inner.build()?,
        })
    }
}

/// Asynchronous client for storage accounts.
#[derive(Clone)]
pub struct StorageClient {
    inner: ServiceClient,
}

impl StorageClient {
    /// Construct directly from a base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid.
    pub fn new(base_url: impl AsRef<str>, session: Arc<Session>) -> Result<Self> {
        StorageClientBuilder::new(base_url, session)?.build()
    }

    /// Access the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        self.inner.base_url()
    }

    /// Access the underlying service client.
    #[must_use]
    pub const fn service_client(&self) -> &ServiceClient {
        &self.inner
    }

    /// Submit a storage account creation without waiting for it to finish.
    ///
    /// # Errors
    ///
    /// Returns the provider error if the request is rejected, for example when the name
    /// is already taken.
    pub async fn begin_create_storage_account(
        &self,
        resource_group: &str,
        account_name: &str,
        request: &CreateStorageAccountRequest,
    ) -> Result<CreateOutcome<StorageAccount>> {
        info!(
            resource_group,
            account = account_name,
            location = %request.location,
            sku = %request.sku.name,
            "Creating storage account"
        );
        self.inner
            .begin_put(&self.account_path(resource_group, account_name), request)
            .await
    }

    /// Create a storage account and block until the provider reports it complete.
    ///
    /// # Errors
    ///
    /// Returns `Provider` on name collision or quota exhaustion, `Timeout` if the bounded
    /// wait elapses.
    pub async fn create_storage_account(
        &self,
        resource_group: &str,
        account_name: &str,
        request: &CreateStorageAccountRequest,
    ) -> Result<StorageAccount> {
        self.begin_create_storage_account(resource_group, account_name, request)
            .await?
            .wait()
            .await
    }

    /// Fetch the properties of a storage account.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account does not exist.
    pub async fn get_properties(
        &self,
        resource_group: &str,
        account_name: &str,
    ) -> Result<StorageAccount> {
        self.inner
            .get_json(&self.account_path(resource_group, account_name))
            .await
    }

    fn account_path(&self, resource_group: &str, account_name: &str) -> String {
        ResourceRef::storage_account(resource_group, account_name)
            .to_resource_id(self.inner.session().subscription())
            .as_path()
            .to_string()
    }
}
