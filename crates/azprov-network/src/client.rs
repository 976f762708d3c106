//! Asynchronous network client implementation.

use crate::models::{
    CreateNetworkInterfaceRequest, CreateSubnetRequest, CreateVirtualNetworkRequest,
    NetworkInterface, Subnet, VirtualNetwork,
};
use crate::Result;
use azprov_core::auth::Session;
use azprov_core::client::{ClientConfig, PollPolicy, ServiceClient, ServiceClientBuilder};
use azprov_core::lro::CreateOutcome;
use azprov_core::types::{AzureService, ResourceRef};
use std::sync::Arc;
use tracing::info;
use url::Url;

/// Builder for [`NetworkClient`].
#[derive(Debug, Clone)]
pub struct NetworkClientBuilder {
    inner: ServiceClientBuilder,
}

impl NetworkClientBuilder {
    /// Create a new builder for the given Resource Manager endpoint.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the base URL is invalid.
    pub fn new(base_url: impl AsRef<str>, session: Arc<Session>) -> Result<Self> {
        Ok(Self {
            inner: ServiceClientBuilder::new(AzureService::Network, base_url, session)?,
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
    pub fn build(self) -> Result<NetworkClient> {
        Ok(NetworkClient {
            inner: self.inner.build()?,
        })
    }
}

/// Asynchronous client for virtual networks, subnets and network interfaces.
#[derive(Clone)]
pub struct NetworkClient {
    inner: ServiceClient,
}

impl NetworkClient {
    /// Construct directly from a base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid.
    pub fn new(base_url: impl AsRef<str>, session: Arc<Session>) -> Result<Self> {
        NetworkClientBuilder::new(base_url, session)?.build()
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

    /// Submit a virtual network creation without waiting for it to finish.
    ///
    /// # Errors
    ///
    /// Returns the provider error if the request is rejected.
    pub async fn begin_create_virtual_network(
        &self,
        resource_group: &str,
        name: &str,
        request: &CreateVirtualNetworkRequest,
    ) -> Result<CreateOutcome<VirtualNetwork>> {
        info!(resource_group, vnet = name, location = %request.location, "Creating virtual network");
        let path = self.path(&ResourceRef::virtual_network(resource_group, name));
        self.inner.begin_put(&path, request).await
    }

    /// Create a virtual network and block until it is provisioned.
    ///
    /// # Errors
    ///
    /// Returns `Provider` for a malformed address space, `Timeout` if the bounded wait
    /// elapses.
    pub async fn create_virtual_network(
        &self,
        resource_group: &str,
        name: &str,
        request: &CreateVirtualNetworkRequest,
    ) -> Result<VirtualNetwork> {
        self.begin_create_virtual_network(resource_group, name, request)
            .await?
            .wait()
            .await
    }

    /// Fetch a virtual network.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the network does not exist.
    pub async fn get_virtual_network(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<VirtualNetwork> {
        let path = self.path(&ResourceRef::virtual_network(resource_group, name));
        self.inner.get_json(&path).await
    }

    /// Submit a subnet creation without waiting for it to finish.
    ///
    /// # Errors
    ///
    /// Returns the provider error if the request is rejected.
    pub async fn begin_create_subnet(
        &self,
        resource_group: &str,
        vnet_name: &str,
        subnet_name: &str,
        request: &CreateSubnetRequest,
    ) -> Result<CreateOutcome<Subnet>> {
        info!(
            resource_group,
            vnet = vnet_name,
            subnet = subnet_name,
            prefix = ?request.properties.address_prefix,
            "Creating subnet"
        );
        let path = self.path(&ResourceRef::subnet(resource_group, vnet_name, subnet_name));
        self.inner.begin_put(&path, request).await
    }

    /// Create a subnet and block until its result is available.
    ///
    /// # Errors
    ///
    /// Returns `Provider` if the prefix does not nest inside the parent address space,
    /// `NotFound` if the virtual network does not exist.
    pub async fn create_subnet(
        &self,
        resource_group: &str,
        vnet_name: &str,
        subnet_name: &str,
        request: &CreateSubnetRequest,
    ) -> Result<Subnet> {
        self.begin_create_subnet(resource_group, vnet_name, subnet_name, request)
            .await?
            .wait()
            .await
    }

    /// Fetch a subnet, including its provider-assigned identifier.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the subnet or its virtual network does not exist.
    pub async fn get_subnet(
        &self,
        resource_group: &str,
        vnet_name: &str,
        subnet_name: &str,
    ) -> Result<Subnet> {
        let path = self.path(&ResourceRef::subnet(resource_group, vnet_name, subnet_name));
        self.inner.get_json(&path).await
    }

    /// Submit a network interface creation without waiting for it to finish.
    ///
    /// # Errors
    ///
    /// Returns the provider error if the request is rejected.
    pub async fn begin_create_network_interface(
        &self,
        resource_group: &str,
        name: &str,
        request: &CreateNetworkInterfaceRequest,
    ) -> Result<CreateOutcome<NetworkInterface>> {
        info!(resource_group, nic = name, location = %request.location, "Creating network interface");
        let path = self.path(&ResourceRef::network_interface(resource_group, name));
        self.inner.begin_put(&path, request).await
    }

    /// Create a network interface and block until it is provisioned.
    ///
    /// # Errors
    ///
    /// Returns the provider error if the request is rejected, `Timeout` if the bounded
    /// wait elapses.
    pub async fn create_network_interface(
        &self,
        resource_group: &str,
        name: &str,
        request: &CreateNetworkInterfaceRequest,
    ) -> Result<NetworkInterface> {
        self.begin_create_network_interface(resource_group, name, request)
            .await?
            .wait()
            .await
    }

    /// Fetch a network interface.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the interface does not exist.
    pub async fn get_network_interface(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<NetworkInterface> {
        let path = self.path(&ResourceRef::network_interface(resource_group, name));
        self.inner.get_json(&path).await
    }

    fn path(&self, resource: &ResourceRef) -> String {
        resource
            .to_resource_id(self.inner.session().subscription())
            .as_path()
            .to_string()
    }
}
