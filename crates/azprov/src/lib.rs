//! Dependency-ordered provisioning of a small virtual machine stack.
//!
//! A run creates, in order, a resource group, a storage account, a virtual network, a
//! subnet, a network interface bound to that subnet, and a virtual machine whose OS disk
//! lives in the storage account. Each step blocks until the provider reports the
//! resource ready; a failure halts the run where it stands, and because every create is
//! idempotent the caller may simply re-invoke the remaining steps.
//!
//! The [`Provisioner`] exposes one create/get pair per resource type. The typed stage
//! chain in [`stages`] carries the identifiers each step needs into the next, so the
//! order cannot be violated without a compile error:
//!
//! ```no_run
//! # async fn run(provisioner: azprov::Provisioner) -> azprov::Result<()> {
//! let image = azprov::images::lookup("linux")?;
//! let group = provisioner.provision_group("prov-rg", "westus").await?;
//! let storage = provisioner.provision_storage(&group, "provstore01").await?;
//! let network = provisioner.provision_network(&storage, "prov-vnet", "10.0.0.0/16").await?;
//! let subnet = provisioner.provision_subnet(&network, "web", "10.0.0.0/24").await?;
//! let nic = provisioner.provision_nic(&subnet, "web-01-nic", "ipconfig1").await?;
//! let template = nic.vm_template("web-01", "azureuser", "S3cret!pass", "web-01-os", image);
//! let ready = provisioner.submit_vm(&nic, template).await?.wait().await?;
//! println!("{}", ready.vm().id);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

pub mod plan;
pub mod provisioner;
pub mod stages;

pub use azprov_compute::images;
pub use azprov_core::{Error, Result};
pub use plan::{RunFailure, RunPlan, RunState};
pub use provisioner::{Provisioner, ProvisionerBuilder};
pub use stages::{
    GroupCreated, NetworkReady, NicReady, RunContext, StorageReady, SubnetReady, VmReady,
    VmSubmitted,
};
