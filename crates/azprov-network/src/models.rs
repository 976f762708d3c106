//! Network data models.
//!
//! Resource Manager nests resource attributes below `properties`; the request types
//! serialize exactly the attributes a create-or-update needs.

use azprov_core::types::ResourceId;
use serde::{Deserialize, Serialize};

/// Private IP allocation method used for new IP configurations.
pub const DYNAMIC_ALLOCATION: &str = "Dynamic";

/// Reference to another resource by identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SubResource {
    /// Referenced resource identifier
    pub id: ResourceId,
}

impl From<ResourceId> for SubResource {
    fn from(id: ResourceId) -> Self {
        Self { id }
    }
}

/// Address space of a virtual network.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddressSpace {
    /// CIDR prefixes
    #[serde(default)]
    pub address_prefixes: Vec<String>,
}

/// Virtual network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VirtualNetwork {
    /// Provider-assigned identifier
    pub id: ResourceId,
    /// Network name
    pub name: String,
    /// Region
    pub location: String,
    /// Network properties
    #[serde(default)]
    pub properties: VirtualNetworkProperties,
}

impl VirtualNetwork {
    /// Provisioning state reported by the provider.
    #[must_use]
    pub fn provisioning_state(&self) -> Option<&str> {
        self.properties.provisioning_state.as_deref()
    }

    /// CIDR prefixes of the address space.
    #[must_use]
    pub fn address_prefixes(&self) -> &[String] {
        self.properties
            .address_space
            .as_ref()
            .map_or(&[][..], |space| space.address_prefixes.as_slice())
    }

    /// Look up a subnet by name.
    #[must_use]
    pub fn subnet(&self, name: &str) -> Option<&Subnet> {
        self.properties.subnets.iter().find(|subnet| subnet.name == name)
    }
}

/// Virtual network properties.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetworkProperties {
    /// Address space
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_space: Option<AddressSpace>,
    /// Subnets owned by the network
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subnets: Vec<Subnet>,
    /// Provisioning state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

/// Subnet of a virtual network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subnet {
    /// Provider-assigned identifier; network interfaces bind to this
    pub id: ResourceId,
    /// Subnet name
    pub name: String,
    /// Subnet properties
    #[serde(default)]
    pub properties: SubnetProperties,
}

impl Subnet {
    /// CIDR prefix of the subnet.
    #[must_use]
    pub fn address_prefix(&self) -> Option<&str> {
        self.properties.address_prefix.as_deref()
    }
}

/// Subnet properties.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubnetProperties {
    /// CIDR prefix, contained in the parent address space
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_prefix: Option<String>,
    /// Provisioning state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

/// Network interface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkInterface {
    /// Provider-assigned identifier; virtual machines attach to this
    pub id: ResourceId,
    /// Interface name
    pub name: String,
    /// Region
    pub location: String,
    /// Interface properties
    #[serde(default)]
    pub properties: NetworkInterfaceProperties,
}

impl NetworkInterface {
    /// Subnet the first IP configuration is bound to.
    #[must_use]
    pub fn subnet_id(&self) -> Option<&ResourceId> {
        self.properties
            .ip_configurations
            .first()
            .and_then(|config| config.properties.subnet.as_ref())
            .map(|subnet| &subnet.id)
    }
}

/// Network interface properties.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterfaceProperties {
    /// IP configurations
    #[serde(default)]
    pub ip_configurations: Vec<IpConfiguration>,
    /// MAC address, assigned once attached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    /// Provisioning state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

/// IP configuration of a network interface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IpConfiguration {
    /// Configuration name
    pub name: String,
    /// Configuration properties
    #[serde(default)]
    pub properties: IpConfigurationProperties,
}

/// IP configuration properties.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IpConfigurationProperties {
    /// Bound subnet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<SubResource>,
    /// Allocation method (`Dynamic` or `Static`)
    #[serde(
        default,
        rename = "privateIPAllocationMethod",
        skip_serializing_if = "Option::is_none"
    )]
    pub private_ip_allocation_method: Option<String>,
    /// Assigned private address
    #[serde(
        default,
        rename = "privateIPAddress",
        skip_serializing_if = "Option::is_none"
    )]
    pub private_ip_address: Option<String>,
}

/// Payload for creating a virtual network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateVirtualNetworkRequest {
    /// Region
    pub location: String,
    /// Address space
    pub properties: VirtualNetworkProperties,
}

impl CreateVirtualNetworkRequest {
    /// Network in `location` with a single address prefix.
    ///
    /// The prefix is passed through; malformed input is rejected by the provider.
    #[must_use]
    pub fn new(location: impl Into<String>, cidr: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            properties: VirtualNetworkProperties {
                address_space: Some(AddressSpace {
                    address_prefixes: vec![cidr.into()],
                }),
                ..VirtualNetworkProperties::default()
            },
        }
    }
}

/// Payload for creating a subnet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateSubnetRequest {
    /// Address prefix
    pub properties: SubnetProperties,
}

impl CreateSubnetRequest {
    /// Subnet with the given prefix.
    #[must_use]
    pub fn new(cidr: impl Into<String>) -> Self {
        Self {
            properties: SubnetProperties {
                address_prefix: Some(cidr.into()),
                provisioning_state: None,
            },
        }
    }
}

/// Payload for creating a network interface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateNetworkInterfaceRequest {
    /// Region
    pub location: String,
    /// IP configurations
    pub properties: NetworkInterfaceProperties,
}

impl CreateNetworkInterfaceRequest {
    /// Interface with one dynamically addressed IP configuration in `subnet_id`.
    #[must_use]
    pub fn new(
        location: impl Into<String>,
        ip_config_name: impl Into<String>,
        subnet_id: ResourceId,
    ) -> Self {
        Self {
            location: location.into(),
            properties: NetworkInterfaceProperties {
                ip_configurations: vec![IpConfiguration {
                    name: ip_config_name.into(),
                    properties: IpConfigurationProperties {
                        subnet: Some(subnet_id.into()),
                        private_ip_allocation_method: Some(DYNAMIC_ALLOCATION.to_string()),
                        private_ip_address: None,
                    },
                }],
                ..NetworkInterfaceProperties::default()
            },
        }
    }
}
