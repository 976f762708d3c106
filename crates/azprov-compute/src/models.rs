//! Virtual machine models.
//!
//! The profile sections are shared between the launch template and the resource returned
//! by the provider.

use crate::images::ImageReference;
use azprov_core::types::ResourceId;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};

/// Virtual machine as returned by Resource Manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualMachine {
    /// Provider-assigned identifier
    pub id: ResourceId,
    /// VM name
    pub name: String,
    /// Region
    pub location: String,
    /// VM properties
    #[serde(default)]
    pub properties: VirtualMachineProperties,
}

impl VirtualMachine {
    /// Provisioning state reported by the provider.
    #[must_use]
    pub fn provisioning_state(&self) -> Option<&str> {
        self.properties.provisioning_state.as_deref()
    }

    /// Identifiers of the attached network interfaces.
    pub fn network_interface_ids(&self) -> impl Iterator<Item = &str> {
        self.properties
            .network_profile
            .iter()
            .flat_map(|profile| profile.network_interfaces.iter())
            .map(|nic| nic.id.as_str())
    }

    /// URI of the OS disk VHD.
    #[must_use]
    pub fn os_disk_vhd_uri(&self) -> Option<&str> {
        self.properties
            .storage_profile
            .as_ref()
            .and_then(|storage| storage.os_disk.vhd.as_ref())
            .map(|vhd| vhd.uri.as_str())
    }

    /// Image the VM was created from.
    #[must_use]
    pub fn image_reference(&self) -> Option<&ImageReference> {
        self.properties
            .storage_profile
            .as_ref()
            .and_then(|storage| storage.image_reference.as_ref())
    }
}

/// Virtual machine properties.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineProperties {
    /// Compute size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_profile: Option<HardwareProfile>,
    /// Image and OS disk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_profile: Option<StorageProfile>,
    /// Computer name and admin account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_profile: Option<OsProfile>,
    /// Attached network interfaces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_profile: Option<NetworkProfile>,
    /// Provisioning state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
    /// Unique VM identifier assigned by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_id: Option<String>,
}

/// Computer name and administrator account.
///
/// The password is only ever sent, never returned by the provider; it is kept in a
/// [`SecretString`] so it stays out of `Debug` output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsProfile {
    /// Host name inside the guest
    pub computer_name: String,
    /// Administrator user name
    pub admin_username: String,
    /// Administrator password
    #[serde(
        default,
        skip_deserializing,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_password"
    )]
    pub admin_password: Option<SecretString>,
}

fn serialize_password<S>(password: &Option<SecretString>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match password {
        Some(secret) => serializer.serialize_str(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}

/// Compute size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareProfile {
    /// VM size (`Standard_DS1`, ...)
    pub vm_size: String,
}

/// Image and OS disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageProfile {
    /// Boot image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_reference: Option<ImageReference>,
    /// OS disk
    pub os_disk: OsDisk,
}

/// OS disk of a virtual machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsDisk {
    /// Disk name
    pub name: String,
    /// Host caching (`None`, `ReadOnly`, `ReadWrite`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caching: Option<String>,
    /// How the disk is created
    pub create_option: String,
    /// Backing blob
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vhd: Option<VirtualHardDisk>,
    /// Guest OS family reported by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_type: Option<String>,
}

/// Blob backing a disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualHardDisk {
    /// Blob URI
    pub uri: String,
}

/// Network attachment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProfile {
    /// Attached interfaces
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterfaceReference>,
}

/// Reference to an attached network interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterfaceReference {
    /// Network interface identifier
    pub id: String,
    /// Whether this is the primary interface
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<NetworkInterfaceReferenceProperties>,
}

/// Properties of a network interface reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterfaceReferenceProperties {
    /// Primary interface flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<bool>,
}
