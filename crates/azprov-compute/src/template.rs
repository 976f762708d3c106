//! Launch template for new virtual machines.
//!
//! [`build_vm_template`] is a pure transform: identical inputs always serialize to
//! identical bytes, so a template can be rebuilt and resubmitted after a failed attempt.

use crate::images::ImageReference;
use crate::models::{
    HardwareProfile, NetworkInterfaceReference, NetworkProfile, OsDisk, OsProfile, StorageProfile,
    VirtualHardDisk,
};
use secrecy::SecretString;
use serde::Serialize;

/// Compute size of every VM launched from a template.
pub const VM_SIZE: &str = "Standard_DS1";

/// Host caching of the OS disk.
pub const OS_DISK_CACHING: &str = "None";

/// OS disks are always created from the image.
pub const OS_DISK_CREATE_OPTION: &str = "fromImage";

/// Blob container holding OS disk images.
pub const VHD_CONTAINER: &str = "vhds";

/// Derive the blob URI of a VM's OS disk.
///
/// The account must exist and be addressable; a wrong account name still yields a
/// syntactically valid URI.
#[must_use]
pub fn os_disk_vhd_uri(storage_account_name: &str, vm_name: &str) -> String {
    format!("https://{storage_account_name}.blob.core.windows.net/{VHD_CONTAINER}/{vm_name}.vhd")
}

/// Create-or-update payload for a virtual machine.
#[derive(Debug, Clone, Serialize)]
pub struct VmTemplate {
    /// Region
    pub location: String,
    /// Launch sections
    pub properties: VmTemplateProperties,
}

impl VmTemplate {
    /// Resource name of the VM, which is also its computer name.
    #[must_use]
    pub fn vm_name(&self) -> &str {
        &self.properties.os_profile.computer_name
    }

    /// Identifier of the network interface the VM attaches to.
    #[must_use]
    pub fn nic_id(&self) -> Option<&str> {
        self.properties
            .network_profile
            .network_interfaces
            .first()
            .map(|nic| nic.id.as_str())
    }

    /// Serialized request body.
    ///
    /// # Errors
    ///
    /// Returns a parse error if serialization fails.
    pub fn to_json(&self) -> azprov_core::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// The four launch sections.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VmTemplateProperties {
    /// Computer name and admin account
    pub os_profile: OsProfile,
    /// Compute size
    pub hardware_profile: HardwareProfile,
    /// Image and OS disk
    pub storage_profile: StorageProfile,
    /// Network attachment
    pub network_profile: NetworkProfile,
}

/// Assemble the launch template of a virtual machine.
///
/// The admin credentials are passed through verbatim; credential policy is enforced by
/// the provider.
#[allow(clippy::too_many_arguments)]
#[must_use]
pub fn build_vm_template(
    location: &str,
    vm_name: &str,
    admin_username: &str,
    admin_password: &str,
    os_disk_name: &str,
    storage_account_name: &str,
    nic_id: &str,
    image: &ImageReference,
) -> VmTemplate {
    VmTemplate {
        location: location.to_string(),
        properties: VmTemplateProperties {
            os_profile: OsProfile {
                computer_name: vm_name.to_string(),
                admin_username: admin_username.to_string(),
                admin_password: Some(SecretString::from(admin_password.to_string())),
            },
            hardware_profile: HardwareProfile {
                vm_size: VM_SIZE.to_string(),
            },
            storage_profile: StorageProfile {
                image_reference: Some(image.clone()),
                os_disk: OsDisk {
                    name: os_disk_name.to_string(),
                    caching: Some(OS_DISK_CACHING.to_string()),
                    create_option: OS_DISK_CREATE_OPTION.to_string(),
                    vhd: Some(VirtualHardDisk {
                        uri: os_disk_vhd_uri(storage_account_name, vm_name),
                    }),
                    os_type: None,
                },
            },
            network_profile: NetworkProfile {
                network_interfaces: vec![NetworkInterfaceReference {
                    id: nic_id.to_string(),
                    properties: None,
                }],
            },
        },
    }
}
