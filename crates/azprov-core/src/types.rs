//! Core provisioning domain types.
//!
//! This module provides the resource kinds handled by the provisioner, the Azure Resource
//! Manager identifier type and the context attached to errors raised for a given resource.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::uuid::SubscriptionId;

/// Default Azure Resource Manager endpoint.
pub const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com/";
/// Default Microsoft Entra ID authority host.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com/";
/// Header carrying the async operation status URL.
pub const ASYNC_OPERATION_HEADER: &str = "Azure-AsyncOperation";

/// Management services called during a provisioning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AzureService {
    /// `Microsoft.Resources`
    Resources,
    /// `Microsoft.Storage`
    Storage,
    /// `Microsoft.Network`
    Network,
    /// `Microsoft.Compute`
    Compute,
}

impl AzureService {
    /// Returns the short service name used in logs and error messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Resources => "resources",
            Self::Storage => "storage",
            Self::Network => "network",
            Self::Compute => "compute",
        }
    }

    /// Returns the resource provider namespace.
    #[must_use]
    pub const fn namespace(&self) -> &'static str {
        match self {
            Self::Resources => "Microsoft.Resources",
            Self::Storage => "Microsoft.Storage",
            Self::Network => "Microsoft.Network",
            Self::Compute => "Microsoft.Compute",
        }
    }

    /// Returns all services.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Resources, Self::Storage, Self::Network, Self::Compute]
    }
}

impl FromStr for AzureService {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "resources" | "microsoft.resources" => Ok(Self::Resources),
            "storage" | "microsoft.storage" => Ok(Self::Storage),
            "network" | "microsoft.network" => Ok(Self::Network),
            "compute" | "microsoft.compute" => Ok(Self::Compute),
            _ => Err(Error::ValidationError(format!("Unknown service: {s}"))),
        }
    }
}

impl fmt::Display for AzureService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resource types created by a provisioning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Resource group
    ResourceGroup,
    /// Storage account
    StorageAccount,
    /// Virtual network
    VirtualNetwork,
    /// Subnet of a virtual network
    Subnet,
    /// Network interface
    NetworkInterface,
    /// Virtual machine
    VirtualMachine,
}

impl ResourceKind {
    /// Human readable name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ResourceGroup => "resource group",
            Self::StorageAccount => "storage account",
            Self::VirtualNetwork => "virtual network",
            Self::Subnet => "subnet",
            Self::NetworkInterface => "network interface",
            Self::VirtualMachine => "virtual machine",
        }
    }

    /// The service that owns this resource type.
    #[must_use]
    pub const fn service(&self) -> AzureService {
        match self {
            Self::ResourceGroup => AzureService::Resources,
            Self::StorageAccount => AzureService::Storage,
            Self::VirtualNetwork | Self::Subnet | Self::NetworkInterface => AzureService::Network,
            Self::VirtualMachine => AzureService::Compute,
        }
    }

    /// Path segment for the resource type below its provider namespace.
    ///
    /// Subnets are nested below `virtualNetworks/{name}`, resource groups have no
    /// provider segment at all.
    #[must_use]
    pub const fn type_segment(&self) -> &'static str {
        match self {
            Self::ResourceGroup => "resourceGroups",
            Self::StorageAccount => "storageAccounts",
            Self::VirtualNetwork => "virtualNetworks",
            Self::Subnet => "subnets",
            Self::NetworkInterface => "networkInterfaces",
            Self::VirtualMachine => "virtualMachines",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identifies the resource an operation was acting on.
///
/// Attached to errors so callers can tell which step of a run failed and re-invoke it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Resource type
    pub kind: ResourceKind,
    /// Resource name
    pub name: String,
    /// Owning resource group
    pub resource_group: String,
    /// Parent resource name (the virtual network of a subnet)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl ResourceRef {
    /// Create a reference to a top-level resource.
    #[must_use]
    pub fn new(
        kind: ResourceKind,
        resource_group: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            resource_group: resource_group.into(),
            parent: None,
        }
    }

    /// Reference to a resource group.
    #[must_use]
    pub fn resource_group(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(ResourceKind::ResourceGroup, name.clone(), name)
    }

    /// Reference to a storage account.
    #[must_use]
    pub fn storage_account(resource_group: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(ResourceKind::StorageAccount, resource_group, name)
    }

    /// Reference to a virtual network.
    #[must_use]
    pub fn virtual_network(resource_group: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(ResourceKind::VirtualNetwork, resource_group, name)
    }

    /// Reference to a subnet of a virtual network.
    #[must_use]
    pub fn subnet(
        resource_group: impl Into<String>,
        vnet_name: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            parent: Some(vnet_name.into()),
            ..Self::new(ResourceKind::Subnet, resource_group, name)
        }
    }

    /// Reference to a network interface.
    #[must_use]
    pub fn network_interface(resource_group: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(ResourceKind::NetworkInterface, resource_group, name)
    }

    /// Reference to a virtual machine.
    #[must_use]
    pub fn virtual_machine(resource_group: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(ResourceKind::VirtualMachine, resource_group, name)
    }

    /// Build the full ARM identifier of this resource within a subscription.
    #[must_use]
    pub fn to_resource_id(&self, subscription: SubscriptionId) -> ResourceId {
        match (self.kind, &self.parent) {
            (ResourceKind::ResourceGroup, _) => ResourceId::resource_group(subscription, &self.name),
            (ResourceKind::Subnet, Some(vnet)) => {
                ResourceId::subnet(subscription, &self.resource_group, vnet, &self.name)
            }
            (kind, _) => ResourceId::resource(subscription, &self.resource_group, kind, &self.name),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == ResourceKind::ResourceGroup {
            return write!(f, "resource group `{}`", self.name);
        }
        write!(f, "{} `{}`", self.kind, self.name)?;
        if let Some(parent) = &self.parent {
            write!(f, " in virtual network `{parent}`")?;
        }
        write!(f, " (resource group `{}`)", self.resource_group)
    }
}

/// Azure Resource Manager resource identifier.
///
/// Identifiers look like
/// `/subscriptions/{sub}/resourceGroups/{rg}/providers/{namespace}/{type}/{name}` and are
/// assigned by the provider. The subnet identifier resolved from a lookup is what binds a
/// network interface to its subnet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Identifier of a resource group.
    #[must_use]
    pub fn resource_group(subscription: SubscriptionId, name: &str) -> Self {
        Self(format!("/subscriptions/{subscription}/resourceGroups/{name}"))
    }

    /// Identifier of a top-level resource inside a resource group.
    #[must_use]
    pub fn resource(
        subscription: SubscriptionId,
        resource_group: &str,
        kind: ResourceKind,
        name: &str,
    ) -> Self {
        Self(format!(
            "/subscriptions/{subscription}/resourceGroups/{resource_group}/providers/{}/{}/{name}",
            kind.service().namespace(),
            kind.type_segment(),
        ))
    }

    /// Identifier of a subnet nested below its virtual network.
    #[must_use]
    pub fn subnet(
        subscription: SubscriptionId,
        resource_group: &str,
        vnet_name: &str,
        name: &str,
    ) -> Self {
        let vnet = Self::resource(
            subscription,
            resource_group,
            ResourceKind::VirtualNetwork,
            vnet_name,
        );
        Self(format!("{}/subnets/{name}", vnet.0))
    }

    /// The raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identifier without its leading slash, suitable for joining onto a base URL.
    #[must_use]
    pub fn as_path(&self) -> &str {
        self.0.trim_start_matches('/')
    }

    /// Subscription segment.
    #[must_use]
    pub fn subscription(&self) -> Option<&str> {
        self.segment_after("subscriptions")
    }

    /// Resource group segment.
    #[must_use]
    pub fn resource_group_name(&self) -> Option<&str> {
        self.segment_after("resourceGroups")
    }

    /// Final name segment.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.0.rsplit('/').find(|segment| !segment.is_empty())
    }

    // ARM echoes ids back with inconsistent casing of the key segments.
    fn segment_after(&self, key: &str) -> Option<&str> {
        let mut segments = self.0.split('/').filter(|s| !s.is_empty());
        while let Some(segment) = segments.next() {
            if segment.eq_ignore_ascii_case(key) {
                return segments.next();
            }
        }
        None
    }
}

impl FromStr for ResourceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let id = Self(s.to_string());
        if !s.starts_with('/') || id.subscription().is_none() {
            return Err(Error::ValidationError(format!(
                "Invalid resource identifier: {s}"
            )));
        }
        Ok(id)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
