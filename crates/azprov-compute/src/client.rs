//! Asynchronous virtual machine client implementation.

use crate::models::VirtualMachine;
use crate::template::VmTemplate;
use crate::Result;
use azprov_core::auth::Session;
use azprov_core::client::{ClientConfig, PollPolicy, ServiceClient, ServiceClientBuilder};
use azprov_core::lro::CreateOutcome;
use azprov_core::types::{AzureService, ResourceRef};
use std::sync::Arc;
use tracing::info;
use url::Url;

/// Builder for [`ComputeClient`].
#[derive(Debug, Clone)]
pub struct ComputeClientBuilder {
    inner: ServiceClientBuilder,
}

impl ComputeClientBuilder {
    /// Create a new builder for the given Resource Manager endpoint.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the base URL is invalid.
    pub fn new(base_url: impl AsRef<str>, session: Arc<Session>) -> Result<Self> {
        Ok(Self {
            inner: ServiceClientBuilder::new(AzureService::Compute, base_url, session)?,
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
    pub fn build(self) -> Result<ComputeClient> {
        Ok(ComputeClient {
            inner: self.inner.build()?,
        })
    }
}

/// Asynchronous client for virtual machines.
#[derive(Clone)]
pub struct ComputeClient {
    inner: ServiceClient,
}

impl ComputeClient {
    /// Construct directly from a base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid.
    pub fn new(base_url: impl AsRef<str>, session: Arc<Session>) -> Result<Self> {
        ComputeClientBuilder::new(base_url, session)?.build()
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

    /// Submit a virtual machine launch without waiting for it to finish.
    ///
    /// The VM is named after the template's computer name.
    ///
    /// # Errors
    ///
    /// Returns the provider error if the template is rejected.
    pub async fn begin_create_virtual_machine(
        &self,
        resource_group: &str,
        template: &VmTemplate,
    ) -> Result<CreateOutcome<VirtualMachine>> {
        let vm_name = template.vm_name();
        info!(
            resource_group,
            vm = vm_name,
            location = %template.location,
            size = %template.properties.hardware_profile.vm_size,
            "Creating virtual machine"
        );
        let path = self.vm_path(resource_group, vm_name);
        self.inner.begin_put(&path, template).await
    }

    /// Launch a virtual machine and block until creation completes.
    ///
    /// # Errors
    ///
    /// Returns `Provider` if the launch fails, `Timeout` if the bounded wait elapses.
    pub async fn create_virtual_machine(
        &self,
        resource_group: &str,
        template: &VmTemplate,
    ) -> Result<VirtualMachine> {
        self.begin_create_virtual_machine(resource_group, template)
            .await?
            .wait()
            .await
    }

    /// Fetch a virtual machine.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the VM does not exist.
    pub async fn get_virtual_machine(
        &self,
        resource_group: &str,
        vm_name: &str,
    ) -> Result<VirtualMachine> {
        self.inner.get_json(&self.vm_path(resource_group, vm_name)).await
    }

    fn vm_path(&self, resource_group: &str, vm_name: &str) -> String {
        ResourceRef::virtual_machine(resource_group, vm_name)
            .to_resource_id(self.inner.session().subscription())
            .as_path()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::LINUX;
    use crate::template::build_vm_template;
    use azprov_core::uuid::SubscriptionId;
    use azprov_core::Error;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000001";

    fn vm_path() -> String {
        format!(
            "/subscriptions/{SUBSCRIPTION}/resourceGroups/rg1/providers/Microsoft.Compute/virtualMachines/vm1"
        )
    }

    fn client(server: &MockServer) -> ComputeClient {
        let subscription = SubscriptionId::parse_str(SUBSCRIPTION).unwrap();
        let session = Arc::new(Session::with_token(subscription, "token", None));
        ComputeClientBuilder::new(server.uri(), session)
            .unwrap()
            .with_poll_policy(
                PollPolicy::new()
                    .with_interval(Duration::from_millis(10))
                    .with_max_wait(Duration::from_secs(5)),
            )
            .build()
            .unwrap()
    }

    fn template() -> VmTemplate {
        build_vm_template(
            "westus", "vm1", "admin", "pw", "disk1", "acct1", "nicId123", &LINUX,
        )
    }

    fn vm_body(state: &str) -> serde_json::Value {
        json!({
            "id": vm_path(),
            "name": "vm1",
            "location": "westus",
            "properties": {
                "provisioningState": state,
                "hardwareProfile": {"vmSize": "Standard_DS1"},
                "osProfile": {"computerName": "vm1", "adminUsername": "admin"},
                "storageProfile": {
                    "imageReference": {
                        "publisher": "Canonical",
                        "offer": "UbuntuServer",
                        "sku": "16.04.0-LTS",
                        "version": "latest"
                    },
                    "osDisk": {
                        "name": "disk1",
                        "caching": "None",
                        "createOption": "FromImage",
                        "vhd": {"uri": "https://acct1.blob.core.windows.net/vhds/vm1.vhd"}
                    }
                },
                "networkProfile": {"networkInterfaces": [{"id": "nicId123"}]}
            }
        })
    }

    #[tokio::test]
    async fn create_submits_template_and_waits() {
        let server = MockServer::start().await;
        let operation = format!("{}/operations/vm1", server.uri());

        Mock::given(method("PUT"))
            .and(path(vm_path()))
            .and(query_param("api-version", "2023-09-01"))
            .and(body_partial_json(json!({
                "location": "westus",
                "properties": {
                    "osProfile": {"computerName": "vm1", "adminPassword": "pw"},
                    "hardwareProfile": {"vmSize": "Standard_DS1"},
                    "networkProfile": {"networkInterfaces": [{"id": "nicId123"}]}
                }
            })))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("Azure-AsyncOperation", operation.as_str())
                    .set_body_json(vm_body("Creating")),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/vm1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "InProgress"})))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/vm1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "Succeeded"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(vm_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(vm_body("Succeeded")))
            .expect(1)
            .mount(&server)
            .await;

        let vm = client(&server)
            .create_virtual_machine("rg1", &template())
            .await
            .unwrap();
        assert_eq!(vm.provisioning_state(), Some("Succeeded"));
        assert_eq!(vm.network_interface_ids().collect::<Vec<_>>(), ["nicId123"]);
        assert_eq!(
            vm.os_disk_vhd_uri(),
            Some("https://acct1.blob.core.windows.net/vhds/vm1.vhd")
        );
        assert_eq!(vm.image_reference(), Some(&LINUX));
    }

    #[tokio::test]
    async fn failed_launch_is_provider_error() {
        let server = MockServer::start().await;
        let operation = format!("{}/operations/vm1", server.uri());

        Mock::given(method("PUT"))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("Azure-AsyncOperation", operation.as_str()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/vm1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "Failed",
                "error": {
                    "code": "OperationNotAllowed",
                    "message": "Operation results in exceeding quota limits of Core."
                }
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .create_virtual_machine("rg1", &template())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider { ref code, .. } if code == "OperationNotAllowed"));
    }

    #[tokio::test]
    async fn get_virtual_machine_reads_profiles() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(vm_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(vm_body("Succeeded")))
            .mount(&server)
            .await;

        let vm = client(&server).get_virtual_machine("rg1", "vm1").await.unwrap();
        let os_profile = vm.properties.os_profile.as_ref().unwrap();
        assert_eq!(os_profile.computer_name, "vm1");
        assert!(os_profile.admin_password.is_none());
    }

    #[tokio::test]
    async fn get_missing_vm_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {
                    "code": "ResourceNotFound",
                    "message": "The Resource 'Microsoft.Compute/virtualMachines/vm2' was not found."
                }
            })))
            .mount(&server)
            .await;

        let err = client(&server).get_virtual_machine("rg1", "vm2").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
