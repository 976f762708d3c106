//! Virtual machine client, launch template builder and OS image catalog.
//!
//! The [`images`] catalog maps a logical OS key to the marketplace image a VM boots from;
//! [`template::build_vm_template`] assembles the launch specification submitted through
//! [`ComputeClient::create_virtual_machine`].

#![deny(missing_docs)]

pub mod client;
pub mod images;
pub mod models;
pub mod template;

pub use client::{ComputeClient, ComputeClientBuilder};
pub use images::ImageReference;
pub use models::{
    HardwareProfile, NetworkInterfaceReference, NetworkProfile, OsDisk, OsProfile, StorageProfile,
    VirtualHardDisk, VirtualMachine, VirtualMachineProperties,
};
pub use template::{build_vm_template, os_disk_vhd_uri, VmTemplate, VmTemplateProperties};

/// Convenient result alias that reuses the shared provisioning error type.
pub type Result<T> = azprov_core::Result<T>;
