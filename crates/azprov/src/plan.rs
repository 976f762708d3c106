//! Run plans and the run state machine.

use azprov_core::Error;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error as ThisError;
use validator::Validate;

/// Progress of a provisioning run.
///
/// Each state is reached only after the step that produces it has completed on the
/// provider side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Nothing created yet
    NotStarted,
    /// Resource group exists
    GroupCreated,
    /// Storage account provisioned
    StorageReady,
    /// Virtual network provisioned
    NetworkReady,
    /// Subnet provisioned
    SubnetReady,
    /// Network interface provisioned
    NicReady,
    /// VM launch accepted
    VmSubmitted,
    /// VM created
    VmReady,
}

impl RunState {
    /// The state reached by the next step, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::NotStarted => Some(Self::GroupCreated),
            Self::GroupCreated => Some(Self::StorageReady),
            Self::StorageReady => Some(Self::NetworkReady),
            Self::NetworkReady => Some(Self::SubnetReady),
            Self::SubnetReady => Some(Self::NicReady),
            Self::NicReady => Some(Self::VmSubmitted),
            Self::VmSubmitted => Some(Self::VmReady),
            Self::VmReady => None,
        }
    }

    /// Returns true once the VM is created.
    #[must_use]
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::VmReady)
    }

    /// State name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "NotStarted",
            Self::GroupCreated => "GroupCreated",
            Self::StorageReady => "StorageReady",
            Self::NetworkReady => "NetworkReady",
            Self::SubnetReady => "SubnetReady",
            Self::NicReady => "NicReady",
            Self::VmSubmitted => "VmSubmitted",
            Self::VmReady => "VmReady",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A run that halted before the VM was created.
///
/// Nothing is rolled back. Every create is idempotent, so the run can be resumed by
/// executing the same plan again.
#[derive(Debug, Clone, PartialEq, ThisError)]
#[error("provisioning halted at {reached}: {error}")]
pub struct RunFailure {
    /// Last state reached before the failing step
    pub reached: RunState,
    /// Cause, naming the resource the failing step was acting on
    #[source]
    pub error: Error,
}

impl RunFailure {
    /// Failure of the step after `reached`.
    #[must_use]
    pub const fn new(reached: RunState, error: Error) -> Self {
        Self { reached, error }
    }

    /// The step that failed.
    #[must_use]
    pub const fn failed_step(&self) -> Option<RunState> {
        self.reached.next()
    }
}

/// IP configuration name used when a plan does not name one.
pub const DEFAULT_IP_CONFIG: &str = "ipconfig1";

fn default_ip_config() -> String {
    DEFAULT_IP_CONFIG.to_string()
}

fn default_os() -> String {
    "linux".to_string()
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

/// Everything a complete run needs.
///
/// Names and prefixes are only checked for presence; naming rules, uniqueness and CIDR
/// containment are enforced by the provider.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RunPlan {
    /// Resource group name
    #[validate(length(min = 1, max = 90))]
    pub resource_group: String,

    /// Region of every resource
    #[validate(length(min = 1))]
    pub location: String,

    /// Storage account name, globally unique
    #[validate(length(min = 1))]
    pub storage_account: String,

    /// Virtual network name
    #[validate(length(min = 1))]
    pub vnet_name: String,

    /// Virtual network address space, e.g. `10.0.0.0/16`
    #[validate(length(min = 1))]
    pub vnet_cidr: String,

    /// Subnet name
    #[validate(length(min = 1))]
    pub subnet_name: String,

    /// Subnet prefix, inside the address space
    #[validate(length(min = 1))]
    pub subnet_cidr: String,

    /// Network interface name
    #[validate(length(min = 1))]
    pub nic_name: String,

    /// IP configuration name
    #[validate(length(min = 1))]
    #[serde(default = "default_ip_config")]
    pub ip_config_name: String,

    /// VM name, also its computer name
    #[validate(length(min = 1))]
    pub vm_name: String,

    /// VM administrator user name
    #[validate(length(min = 1))]
    pub admin_username: String,

    /// VM administrator password, passed through to the provider
    #[serde(skip_serializing, deserialize_with = "deserialize_secret")]
    pub admin_password: SecretString,

    /// OS disk name
    #[validate(length(min = 1))]
    pub os_disk_name: String,

    /// Catalog key of the OS image
    #[serde(default = "default_os")]
    pub os: String,
}

impl RunPlan {
    /// Plan for a Linux VM with the conventional derived names.
    ///
    /// The network, subnet, interface and disk names are derived from `vm_name`; adjust
    /// the fields directly to override them.
    #[must_use]
    pub fn new(
        resource_group: impl Into<String>,
        location: impl Into<String>,
        storage_account: impl Into<String>,
        vm_name: impl Into<String>,
        admin_username: impl Into<String>,
        admin_password: impl Into<String>,
    ) -> Self {
        let vm_name = vm_name.into();
        Self {
            resource_group: resource_group.into(),
            location: location.into(),
            storage_account: storage_account.into(),
            vnet_name: format!("{vm_name}-vnet"),
            vnet_cidr: "10.0.0.0/16".to_string(),
            subnet_name: format!("{vm_name}-subnet"),
            subnet_cidr: "10.0.0.0/24".to_string(),
            nic_name: format!("{vm_name}-nic"),
            ip_config_name: default_ip_config(),
            os_disk_name: format!("{vm_name}-os"),
            vm_name,
            admin_username: admin_username.into(),
            admin_password: SecretString::from(admin_password.into()),
            os: default_os(),
        }
    }

    /// Set the OS image key.
    #[must_use]
    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = os.into();
        self
    }

    /// Set the virtual network and subnet prefixes.
    #[must_use]
    pub fn with_cidrs(mut self, vnet_cidr: impl Into<String>, subnet_cidr: impl Into<String>) -> Self {
        self.vnet_cidr = vnet_cidr.into();
        self.subnet_cidr = subnet_cidr.into();
        self
    }
}
