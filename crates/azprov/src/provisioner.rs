//! Provisioning orchestrator.
//!
//! A [`Provisioner`] is bound to one [`Session`] for its lifetime: the token is acquired
//! once, shared by the four service clients, and released by [`Provisioner::finish`].
//! Every create blocks until the provider reports the resource ready and every failure
//! names the resource it concerns.

use crate::plan::{RunFailure, RunPlan, RunState};
use crate::stages::{
    GroupCreated, NetworkReady, NicReady, RunContext, StorageReady, SubnetReady, VmReady,
    VmSubmitted,
};
use crate::Result;
use azprov_compute::images;
use azprov_compute::models::VirtualMachine;
use azprov_compute::template::VmTemplate;
use azprov_compute::{ComputeClient, ComputeClientBuilder};
use azprov_core::auth::{CredentialProvider, Session};
use azprov_core::client::{ClientConfig, PollPolicy};
use azprov_core::config::ProvisionerConfig;
use azprov_core::lro::CreateOutcome;
use azprov_core::types::ResourceRef;
use azprov_core::uuid::SubscriptionId;
use azprov_core::Error;
use azprov_network::models::{
    CreateNetworkInterfaceRequest, CreateSubnetRequest, CreateVirtualNetworkRequest,
    NetworkInterface, Subnet, VirtualNetwork,
};
use azprov_network::{NetworkClient, NetworkClientBuilder};
use azprov_resources::models::{CreateResourceGroupRequest, ResourceGroup};
use azprov_resources::{ResourcesClient, ResourcesClientBuilder};
use azprov_storage::models::{CreateStorageAccountRequest, StorageAccount};
use azprov_storage::{StorageClient, StorageClientBuilder};
use secrecy::ExposeSecret;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

/// Builder for [`Provisioner`].
#[derive(Debug, Clone)]
pub struct ProvisionerBuilder {
    session: Arc<Session>,
    config: ProvisionerConfig,
    http_config: Option<ClientConfig>,
    poll_policy: Option<PollPolicy>,
}

impl ProvisionerBuilder {
    /// Create a builder for a session and configuration.
    #[must_use]
    pub fn new(session: Arc<Session>, config: ProvisionerConfig) -> Self {
        Self {
            session,
            config,
            http_config: None,
            poll_policy: None,
        }
    }

    /// Override the HTTP client configuration derived from the config.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.http_config = Some(config);
        self
    }

    /// Override the poll policy derived from the config.
    #[must_use]
    pub const fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = Some(policy);
        self
    }

    /// Build the provisioner and its four service clients.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration is invalid.
    pub fn build(self) -> Result<Provisioner> {
        self.config
            .validate()
            .map_err(|err| Error::ConfigError(format!("Invalid configuration: {err}")))?;

        let endpoint = self.config.parse_management_endpoint()?;
        let http = self
            .http_config
            .unwrap_or_else(|| self.config.client_config());
        let poll = self.poll_policy.unwrap_or_else(|| self.config.poll_policy());
        let session = self.session;

        debug!(
            endpoint = %endpoint,
            subscription = %session.subscription(),
            max_wait = ?poll.max_wait,
            "Building provisioner"
        );

        Ok(Provisioner {
            resources: ResourcesClientBuilder::new(endpoint.as_str(), Arc::clone(&session))?
                .with_http_config(http.clone())
                .with_poll_policy(poll)
                .build()?,
            storage: StorageClientBuilder::new(endpoint.as_str(), Arc::clone(&session))?
                .with_http_config(http.clone())
                .with_poll_policy(poll)
                .build()?,
            network: NetworkClientBuilder::new(endpoint.as_str(), Arc::clone(&session))?
                .with_http_config(http.clone())
                .with_poll_policy(poll)
                .build()?,
            compute: ComputeClientBuilder::new(endpoint.as_str(), Arc::clone(&session))?
                .with_http_config(http)
                .with_poll_policy(poll)
                .build()?,
            session,
        })
    }
}

/// Drives the dependency-ordered creation of a VM stack.
///
/// Steps are strictly sequential; independent runs use independent provisioners and
/// share nothing.
#[derive(Clone)]
pub struct Provisioner {
    session: Arc<Session>,
    resources: ResourcesClient,
    storage: StorageClient,
    network: NetworkClient,
    compute: ComputeClient,
}

impl Provisioner {
    /// Create a provisioner bound to an acquired session.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration is invalid.
    pub fn new(session: Arc<Session>, config: ProvisionerConfig) -> Result<Self> {
        ProvisionerBuilder::new(session, config).build()
    }

    /// Acquire a session from `provider` and create a provisioner bound to it.
    ///
    /// # Errors
    ///
    /// Returns `Authentication` if the credential exchange fails, `ConfigError` if the
    /// configuration is invalid.
    pub async fn connect(
        provider: &dyn CredentialProvider,
        subscription: SubscriptionId,
        config: ProvisionerConfig,
    ) -> Result<Self> {
        let session = Session::acquire(provider, subscription).await?;
        Self::new(Arc::new(session), config)
    }

    /// The session shared by every request of this run.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Resource group client.
    #[must_use]
    pub const fn resources(&self) -> &ResourcesClient {
        &self.resources
    }

    /// Storage account client.
    #[must_use]
    pub const fn storage(&self) -> &StorageClient {
        &self.storage
    }

    /// Network client.
    #[must_use]
    pub const fn network(&self) -> &NetworkClient {
        &self.network
    }

    /// Compute client.
    #[must_use]
    pub const fn compute(&self) -> &ComputeClient {
        &self.compute
    }

    /// End the run and release the session.
    ///
    /// The token is zeroized once the last client sharing it is dropped.
    pub fn finish(self) {
        info!(subscription = %self.session.subscription(), "Provisioning session released");
    }

    async fn step<T, F>(&self, resource: ResourceRef, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if let Err(err) = self.session.ensure_valid() {
            return Err(err.for_resource(resource));
        }
        info!(%resource, "Provisioning");
        match operation.await {
            Ok(value) => Ok(value),
            Err(err) => {
                if err.should_log() {
                    warn!(%resource, error = %err, code = err.error_code(), "Provisioning step failed");
                }
                Err(err.for_resource(resource))
            }
        }
    }

    /// Create a resource group, or update it in place.
    ///
    /// # Errors
    ///
    /// Returns `Authentication` if the session is no longer valid and `Provider` if the
    /// request is rejected (bad location, quota).
    pub async fn create_resource_group(&self, name: &str, location: &str) -> Result<ResourceGroup> {
        let request = CreateResourceGroupRequest::new(location);
        self.step(
            ResourceRef::resource_group(name),
            self.resources.create_or_update_resource_group(name, &request),
        )
        .await
    }

    /// Fetch a resource group.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the group does not exist.
    pub async fn get_resource_group(&self, name: &str) -> Result<ResourceGroup> {
        self.step(
            ResourceRef::resource_group(name),
            self.resources.get_resource_group(name),
        )
        .await
    }

    /// Create a storage account and block until it is provisioned.
    ///
    /// The resource group must already exist.
    ///
    /// # Errors
    ///
    /// Returns `Provider` on name collision or quota exhaustion, `Timeout` if the bounded
    /// wait elapses.
    pub async fn create_storage_account(
        &self,
        resource_group: &str,
        account_name: &str,
        location: &str,
    ) -> Result<StorageAccount> {
        let request = CreateStorageAccountRequest::new(location);
        self.step(
            ResourceRef::storage_account(resource_group, account_name),
            self.storage
                .create_storage_account(resource_group, account_name, &request),
        )
        .await
    }

    /// Fetch a storage account.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account does not exist.
    pub async fn get_storage_account(
        &self,
        resource_group: &str,
        account_name: &str,
    ) -> Result<StorageAccount> {
        self.step(
            ResourceRef::storage_account(resource_group, account_name),
            self.storage.get_properties(resource_group, account_name),
        )
        .await
    }

    /// Create a virtual network with one address prefix and block until it is
    /// provisioned.
    ///
    /// # Errors
    ///
    /// Returns `Provider` for a malformed prefix, `Timeout` if the bounded wait elapses.
    pub async fn create_virtual_network(
        &self,
        resource_group: &str,
        name: &str,
        location: &str,
        cidr: &str,
    ) -> Result<VirtualNetwork> {
        let request = CreateVirtualNetworkRequest::new(location, cidr);
        self.step(
            ResourceRef::virtual_network(resource_group, name),
            self.network
                .create_virtual_network(resource_group, name, &request),
        )
        .await
    }

    /// Fetch a virtual network.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the network does not exist.
    pub async fn get_virtual_network(&self, resource_group: &str, name: &str) -> Result<VirtualNetwork> {
        self.step(
            ResourceRef::virtual_network(resource_group, name),
            self.network.get_virtual_network(resource_group, name),
        )
        .await
    }

    /// Create a subnet and block until its result is available.
    ///
    /// # Errors
    ///
    /// Returns `Provider` if `cidr` does not nest inside the network's address space,
    /// `NotFound` if the network does not exist.
    pub async fn create_subnet(
        &self,
        resource_group: &str,
        vnet_name: &str,
        subnet_name: &str,
        cidr: &str,
    ) -> Result<Subnet> {
        let request = CreateSubnetRequest::new(cidr);
        self.step(
            ResourceRef::subnet(resource_group, vnet_name, subnet_name),
            self.network
                .create_subnet(resource_group, vnet_name, subnet_name, &request),
        )
        .await
    }

    /// Fetch a subnet.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the subnet or its network does not exist.
    pub async fn get_subnet(
        &self,
        resource_group: &str,
        vnet_name: &str,
        subnet_name: &str,
    ) -> Result<Subnet> {
        self.step(
            ResourceRef::subnet(resource_group, vnet_name, subnet_name),
            self.network.get_subnet(resource_group, vnet_name, subnet_name),
        )
        .await
    }

    /// Resolve the subnet, then create a network interface bound to it.
    ///
    /// No interface is submitted unless the subnet lookup succeeds.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` naming the subnet if it does not exist, otherwise the error of
    /// the interface creation.
    pub async fn create_network_interface(
        &self,
        resource_group: &str,
        location: &str,
        vnet_name: &str,
        subnet_name: &str,
        nic_name: &str,
        ip_config_name: &str,
    ) -> Result<NetworkInterface> {
        let subnet = self.get_subnet(resource_group, vnet_name, subnet_name).await?;
        debug!(subnet_id = %subnet.id, nic = nic_name, "Resolved subnet for network interface");
        self.create_network_interface_in(resource_group, location, nic_name, ip_config_name, &subnet)
            .await
    }

    async fn create_network_interface_in(
        &self,
        resource_group: &str,
        location: &str,
        nic_name: &str,
        ip_config_name: &str,
        subnet: &Subnet,
    ) -> Result<NetworkInterface> {
        let request = CreateNetworkInterfaceRequest::new(location, ip_config_name, subnet.id.clone());
        self.step(
            ResourceRef::network_interface(resource_group, nic_name),
            self.network
                .create_network_interface(resource_group, nic_name, &request),
        )
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
        nic_name: &str,
    ) -> Result<NetworkInterface> {
        self.step(
            ResourceRef::network_interface(resource_group, nic_name),
            self.network.get_network_interface(resource_group, nic_name),
        )
        .await
    }

    /// Submit a VM launch template without waiting for the VM to be created.
    ///
    /// # Errors
    ///
    /// Returns the provider error if the template is rejected.
    pub async fn begin_create_virtual_machine(
        &self,
        resource_group: &str,
        template: &VmTemplate,
    ) -> Result<CreateOutcome<VirtualMachine>> {
        self.step(
            ResourceRef::virtual_machine(resource_group, template.vm_name()),
            self.compute.begin_create_virtual_machine(resource_group, template),
        )
        .await
    }

    /// Launch a VM from a template and block until it is created.
    ///
    /// The template must already reference a provisioned network interface.
    ///
    /// # Errors
    ///
    /// Returns `Provider` if the launch fails, `Timeout` if the bounded wait elapses.
    pub async fn create_virtual_machine(
        &self,
        resource_group: &str,
        template: &VmTemplate,
    ) -> Result<VirtualMachine> {
        self.step(
            ResourceRef::virtual_machine(resource_group, template.vm_name()),
            self.compute.create_virtual_machine(resource_group, template),
        )
        .await
    }

    /// Fetch a virtual machine.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the VM does not exist.
    pub async fn get_virtual_machine(&self, resource_group: &str, vm_name: &str) -> Result<VirtualMachine> {
        self.step(
            ResourceRef::virtual_machine(resource_group, vm_name),
            self.compute.get_virtual_machine(resource_group, vm_name),
        )
        .await
    }

    /// Create the resource group and start a run.
    ///
    /// # Errors
    ///
    /// See [`Provisioner::create_resource_group`].
    pub async fn provision_group(&self, name: &str, location: &str) -> Result<GroupCreated> {
        let group = self.create_resource_group(name, location).await?;
        info!(state = %RunState::GroupCreated, resource_group = name, "Provisioning step complete");
        Ok(GroupCreated {
            context: RunContext {
                resource_group: name.to_string(),
                location: location.to_string(),
            },
            group,
        })
    }

    /// Create the run's storage account.
    ///
    /// # Errors
    ///
    /// See [`Provisioner::create_storage_account`].
    pub async fn provision_storage(
        &self,
        group: &GroupCreated,
        account_name: &str,
    ) -> Result<StorageReady> {
        let context = group.context.clone();
        let account = self
            .create_storage_account(&context.resource_group, account_name, &context.location)
            .await?;
        info!(state = %RunState::StorageReady, account = account_name, "Provisioning step complete");
        Ok(StorageReady { context, account })
    }

    /// Create the run's virtual network.
    ///
    /// # Errors
    ///
    /// See [`Provisioner::create_virtual_network`].
    pub async fn provision_network(
        &self,
        storage: &StorageReady,
        vnet_name: &str,
        cidr: &str,
    ) -> Result<NetworkReady> {
        let context = storage.context.clone();
        let vnet = self
            .create_virtual_network(&context.resource_group, vnet_name, &context.location, cidr)
            .await?;
        info!(state = %RunState::NetworkReady, vnet = vnet_name, "Provisioning step complete");
        Ok(NetworkReady {
            context,
            storage_account: storage.account.name.clone(),
            vnet,
        })
    }

    /// Create a subnet of the run's virtual network.
    ///
    /// # Errors
    ///
    /// See [`Provisioner::create_subnet`].
    pub async fn provision_subnet(
        &self,
        network: &NetworkReady,
        subnet_name: &str,
        cidr: &str,
    ) -> Result<SubnetReady> {
        let context = network.context.clone();
        let subnet = self
            .create_subnet(&context.resource_group, &network.vnet.name, subnet_name, cidr)
            .await?;
        info!(state = %RunState::SubnetReady, subnet_id = %subnet.id, "Provisioning step complete");
        Ok(SubnetReady {
            context,
            storage_account: network.storage_account.clone(),
            vnet_name: network.vnet.name.clone(),
            subnet,
        })
    }

    /// Create a network interface bound to the run's subnet.
    ///
    /// The subnet is resolved again before the interface is submitted, so a subnet
    /// removed since the previous step fails with `NotFound` instead of a dangling
    /// reference.
    ///
    /// # Errors
    ///
    /// See [`Provisioner::create_network_interface`].
    pub async fn provision_nic(
        &self,
        subnet: &SubnetReady,
        nic_name: &str,
        ip_config_name: &str,
    ) -> Result<NicReady> {
        let context = subnet.context.clone();
        let nic = self
            .create_network_interface(
                &context.resource_group,
                &context.location,
                &subnet.vnet_name,
                &subnet.subnet.name,
                nic_name,
                ip_config_name,
            )
            .await?;
        info!(state = %RunState::NicReady, nic_id = %nic.id, "Provisioning step complete");
        Ok(NicReady {
            context,
            storage_account: subnet.storage_account.clone(),
            nic,
        })
    }

    /// Submit the VM launch.
    ///
    /// Build the template with [`NicReady::vm_template`] so it references this
    /// interface and the run's storage account.
    ///
    /// # Errors
    ///
    /// See [`Provisioner::begin_create_virtual_machine`].
    pub async fn submit_vm(&self, nic: &NicReady, template: VmTemplate) -> Result<VmSubmitted> {
        let context = nic.context.clone();
        if template.nic_id() != Some(nic.nic_id().as_str()) {
            warn!(
                vm = template.vm_name(),
                nic_id = %nic.nic_id(),
                "VM template does not reference the provisioned network interface"
            );
        }
        let operation = self
            .begin_create_virtual_machine(&context.resource_group, &template)
            .await?;
        info!(
            state = %RunState::VmSubmitted,
            vm = template.vm_name(),
            pending = operation.is_pending(),
            "Provisioning step complete"
        );
        Ok(VmSubmitted {
            context,
            template,
            operation,
        })
    }

    /// Execute a complete run.
    ///
    /// The plan is validated and its OS key resolved against the image catalog before
    /// any request is sent. On failure the run halts without rollback; executing the same
    /// plan again resumes it.
    ///
    /// # Errors
    ///
    /// Returns a [`RunFailure`] carrying the last state reached and the cause.
    pub async fn execute(&self, plan: &RunPlan) -> std::result::Result<VmReady, RunFailure> {
        let halted = |reached: RunState| move |error: Error| RunFailure::new(reached, error);

        plan.validate()
            .map_err(|err| RunFailure::new(RunState::NotStarted, err.into()))?;
        let image = images::lookup(&plan.os).map_err(halted(RunState::NotStarted))?;

        info!(
            resource_group = %plan.resource_group,
            location = %plan.location,
            vm = %plan.vm_name,
            image = %image,
            "Starting provisioning run"
        );

        let group = self
            .provision_group(&plan.resource_group, &plan.location)
            .await
            .map_err(halted(RunState::NotStarted))?;
        let storage = self
            .provision_storage(&group, &plan.storage_account)
            .await
            .map_err(halted(RunState::GroupCreated))?;
        let network = self
            .provision_network(&storage, &plan.vnet_name, &plan.vnet_cidr)
            .await
            .map_err(halted(RunState::StorageReady))?;
        let subnet = self
            .provision_subnet(&network, &plan.subnet_name, &plan.subnet_cidr)
            .await
            .map_err(halted(RunState::NetworkReady))?;
        let nic = self
            .provision_nic(&subnet, &plan.nic_name, &plan.ip_config_name)
            .await
            .map_err(halted(RunState::SubnetReady))?;

        let template = nic.vm_template(
            &plan.vm_name,
            &plan.admin_username,
            plan.admin_password.expose_secret(),
            &plan.os_disk_name,
            image,
        );
        let submitted = self
            .submit_vm(&nic, template)
            .await
            .map_err(halted(RunState::NicReady))?;
        let ready = submitted
            .wait()
            .await
            .map_err(halted(RunState::VmSubmitted))?;

        info!(vm_id = %ready.vm().id, "Provisioning run complete");
        Ok(ready)
    }
}
