//! Typed results of each provisioning step.
//!
//! Every stage owns the identifiers the following step needs: the storage account name
//! for the OS disk URI, the subnet identifier for the network interface, the interface
//! identifier for the VM. A step can only be invoked with its predecessor in hand.

use crate::plan::RunState;
use crate::Result;
use azprov_compute::images::ImageReference;
use azprov_compute::models::VirtualMachine;
use azprov_compute::template::{build_vm_template, VmTemplate};
use azprov_core::lro::CreateOutcome;
use azprov_core::types::{ResourceId, ResourceRef};
use azprov_network::models::{NetworkInterface, Subnet, VirtualNetwork};
use azprov_resources::models::ResourceGroup;
use azprov_storage::models::StorageAccount;
use tracing::info;

/// Resource group and region shared by every resource of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// Resource group name
    pub resource_group: String,
    /// Region
    pub location: String,
}

/// The resource group exists.
#[derive(Debug, Clone)]
pub struct GroupCreated {
    pub(crate) context: RunContext,
    pub(crate) group: ResourceGroup,
}

impl GroupCreated {
    /// Run context.
    #[must_use]
    pub const fn context(&self) -> &RunContext {
        &self.context
    }

    /// The created group.
    #[must_use]
    pub const fn group(&self) -> &ResourceGroup {
        &self.group
    }
}

/// The storage account is provisioned and addressable.
#[derive(Debug, Clone)]
pub struct StorageReady {
    pub(crate) context: RunContext,
    pub(crate) account: StorageAccount,
}

impl StorageReady {
    /// Run context.
    #[must_use]
    pub const fn context(&self) -> &RunContext {
        &self.context
    }

    /// The storage account.
    #[must_use]
    pub const fn account(&self) -> &StorageAccount {
        &self.account
    }
}

/// The virtual network is provisioned.
#[derive(Debug, Clone)]
pub struct NetworkReady {
    pub(crate) context: RunContext,
    pub(crate) storage_account: String,
    pub(crate) vnet: VirtualNetwork,
}

impl NetworkReady {
    /// Run context.
    #[must_use]
    pub const fn context(&self) -> &RunContext {
        &self.context
    }

    /// The virtual network.
    #[must_use]
    pub const fn vnet(&self) -> &VirtualNetwork {
        &self.vnet
    }
}

/// The subnet exists and its identifier is known.
#[derive(Debug, Clone)]
pub struct SubnetReady {
    pub(crate) context: RunContext,
    pub(crate) storage_account: String,
    pub(crate) vnet_name: String,
    pub(crate) subnet: Subnet,
}

impl SubnetReady {
    /// Run context.
    #[must_use]
    pub const fn context(&self) -> &RunContext {
        &self.context
    }

    /// The subnet.
    #[must_use]
    pub const fn subnet(&self) -> &Subnet {
        &self.subnet
    }

    /// Provider-assigned subnet identifier.
    #[must_use]
    pub const fn subnet_id(&self) -> &ResourceId {
        &self.subnet.id
    }
}

/// The network interface exists and is bound to the subnet.
#[derive(Debug, Clone)]
pub struct NicReady {
    pub(crate) context: RunContext,
    pub(crate) storage_account: String,
    pub(crate) nic: NetworkInterface,
}

impl NicReady {
    /// Run context.
    #[must_use]
    pub const fn context(&self) -> &RunContext {
        &self.context
    }

    /// The network interface.
    #[must_use]
    pub const fn nic(&self) -> &NetworkInterface {
        &self.nic
    }

    /// Provider-assigned interface identifier.
    #[must_use]
    pub const fn nic_id(&self) -> &ResourceId {
        &self.nic.id
    }

    /// Launch template for a VM attached to this interface, with its OS disk in the
    /// run's storage account.
    #[must_use]
    pub fn vm_template(
        &self,
        vm_name: &str,
        admin_username: &str,
        admin_password: &str,
        os_disk_name: &str,
        image: &ImageReference,
    ) -> VmTemplate {
        build_vm_template(
            &self.context.location,
            vm_name,
            admin_username,
            admin_password,
            os_disk_name,
            &self.storage_account,
            self.nic.id.as_str(),
            image,
        )
    }
}

/// The VM launch was accepted by the provider.
#[derive(Debug)]
pub struct VmSubmitted {
    pub(crate) context: RunContext,
    pub(crate) template: VmTemplate,
    pub(crate) operation: CreateOutcome<VirtualMachine>,
}

impl VmSubmitted {
    /// Run context.
    #[must_use]
    pub const fn context(&self) -> &RunContext {
        &self.context
    }

    /// The submitted template.
    #[must_use]
    pub const fn template(&self) -> &VmTemplate {
        &self.template
    }

    /// Returns true if the provider is still creating the VM.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.operation.is_pending()
    }

    /// Block until the VM is created.
    ///
    /// # Errors
    ///
    /// Returns `Provider` if the launch failed or `Timeout` if the bounded wait elapsed;
    /// the error names the VM.
    pub async fn wait(self) -> Result<VmReady> {
        let resource =
            ResourceRef::virtual_machine(&self.context.resource_group, self.template.vm_name());
        let vm = self
            .operation
            .wait()
            .await
            .map_err(|err| err.for_resource(resource))?;
        info!(state = %RunState::VmReady, vm = %vm.name, "Provisioning step complete");
        Ok(VmReady {
            context: self.context,
            vm,
        })
    }
}

/// The VM is created.
#[derive(Debug, Clone)]
pub struct VmReady {
    pub(crate) context: RunContext,
    pub(crate) vm: VirtualMachine,
}

impl VmReady {
    /// Run context.
    #[must_use]
    pub const fn context(&self) -> &RunContext {
        &self.context
    }

    /// The virtual machine.
    #[must_use]
    pub const fn vm(&self) -> &VirtualMachine {
        &self.vm
    }

    /// Consume the stage and return the VM.
    #[must_use]
    pub fn into_vm(self) -> VirtualMachine {
        self.vm
    }
}
