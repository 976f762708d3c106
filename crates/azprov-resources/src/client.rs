//! Asynchronous resource group client implementation.

use crate::models::{CreateResourceGroupRequest, ResourceGroup};
use crate::Result;
use azprov_core::auth::Session;
use azprov_core::client::{ClientConfig, PollPolicy, ServiceClient, ServiceClientBuilder};
use azprov_core::lro::CreateOutcome;
use azprov_core::types::{AzureService, ResourceRef};
use std::sync::Arc;
use tracing::info;
use url::Url;

/// Builder for [`ResourcesClient`].
#[derive(Debug, Clone)]
pub struct ResourcesClientBuilder {
    inner: ServiceClientBuilder,
}

impl ResourcesClientBuilder {
    /// Create a new builder for the given Resource Manager endpoint.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the base URL is invalid.
    pub fn new(base_url: impl AsRef<str>, session: Arc<Session>) -> Result<Self> {
        Ok(Self {
            inner: ServiceClientBuilder::new(AzureService::Resources, base_url, session)?,
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
    pub fn build(self) -> Result<ResourcesClient> {
        Ok(ResourcesClient {
            inner: self.inner.build()?,
        })
    }
}

/// Asynchronous client for resource groups.
#[derive(Clone)]
pub struct ResourcesClient {
    inner: ServiceClient,
}

impl ResourcesClient {
    /// Construct directly from a base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid.
    pub fn new(base_url: impl AsRef<str>, session: Arc<Session>) -> Result<Self> {
        ResourcesClientBuilder::new(base_url, session)?.build()
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

    /// Create a resource group, or update the existing one with the same name.
    ///
    /// Idempotent when repeated with the same location. Returns once the group exists.
    ///
    /// # Errors
    ///
    /// Returns the provider error if the group cannot be created, for example when it
    /// already exists in a different location.
    pub async fn create_or_update_resource_group(
        &self,
        name: &str,
        request: &CreateResourceGroupRequest,
    ) -> Result<ResourceGroup> {
        let path = self.group_path(name);
        info!(resource_group = name, location = %request.location, "Creating resource group");
        let outcome: CreateOutcome<ResourceGroup> = self.inner.begin_put(&path, request).await?;
        outcome.wait().await
    }

    /// Fetch a resource group by name.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no group with that name exists in the subscription.
    pub async fn get_resource_group(&self, name: &str) -> Result<ResourceGroup> {
        self.inner.get_json(&self.group_path(name)).await
    }

    fn group_path(&self, name: &str) -> String {
        ResourceRef::resource_group(name)
            .to_resource_id(self.inner.session().subscription())
            .as_path()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use azprov_core::uuid::SubscriptionId;
    use azprov_core::Error;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000001";

    fn client(server: &MockServer) -> ResourcesClient {
        let subscription = SubscriptionId::parse_str(SUBSCRIPTION).unwrap();
        let session = Arc::new(Session::with_token(subscription, "token", None));
        ResourcesClient::new(server.uri(), session).unwrap()
    }

    fn group_body(location: &str) -> serde_json::Value {
        json!({
            "id": format!("/subscriptions/{SUBSCRIPTION}/resourceGroups/rg1"),
            "name": "rg1",
            "location": location,
            "properties": {"provisioningState": "Succeeded"}
        })
    }

    #[tokio::test]
    async fn create_resource_group_puts_location() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(format!("/subscriptions/{SUBSCRIPTION}/resourceGroups/rg1")))
            .and(query_param("api-version", "2021-04-01"))
            .and(body_json(json!({"location": "westus"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(group_body("westus")))
            .expect(1)
            .mount(&server)
            .await;

        let group = client(&server)
            .create_or_update_resource_group("rg1", &CreateResourceGroupRequest::new("westus"))
            .await
            .unwrap();
        assert_eq!(group.name, "rg1");
        assert_eq!(group.location, "westus");
        assert_eq!(group.provisioning_state(), Some("Succeeded"));
    }

    #[tokio::test]
    async fn create_resource_group_twice_is_idempotent() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(format!("/subscriptions/{SUBSCRIPTION}/resourceGroups/rg1")))
            .respond_with(ResponseTemplate::new(200).set_body_json(group_body("westus")))
            .expect(2)
            .mount(&server)
            .await;

        let client = client(&server);
        let request = CreateResourceGroupRequest::new("westus");
        let first = client
            .create_or_update_resource_group("rg1", &request)
            .await
            .unwrap();
        let second = client
            .create_or_update_resource_group("rg1", &request)
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn location_conflict_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": {
                    "code": "InvalidResourceGroupLocation",
                    "message": "Invalid resource group location 'eastus'."
                }
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .create_or_update_resource_group("rg1", &CreateResourceGroupRequest::new("eastus"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::Provider { ref code, .. } if code == "InvalidResourceGroupLocation")
        );
    }

    #[tokio::test]
    async fn get_missing_group_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/subscriptions/{SUBSCRIPTION}/resourceGroups/missing")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {
                    "code": "ResourceGroupNotFound",
                    "message": "Resource group 'missing' could not be found."
                }
            })))
            .mount(&server)
            .await;

        let err = client(&server).get_resource_group("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn get_group_returns_properties() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/subscriptions/{SUBSCRIPTION}/resourceGroups/rg1")))
            .respond_with(ResponseTemplate::new(200).set_body_json(group_body("westus")))
            .mount(&server)
            .await;

        let group = client(&server).get_resource_group("rg1").await.unwrap();
        assert_eq!(group.id.resource_group_name(), Some("rg1"));
    }
}
