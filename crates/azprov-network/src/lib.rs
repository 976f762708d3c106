//! Network client and data models.
//!
//! Provides typed structures and an asynchronous client for the `Microsoft.Network`
//! resources a virtual machine depends on: virtual networks, their subnets, and network
//! interfaces bound to a subnet.

#![deny(missing_docs)]

pub mod client;
pub mod models;

pub use client::{NetworkClient, NetworkClientBuilder};
pub use models::{
    AddressSpace, CreateNetworkInterfaceRequest, CreateSubnetRequest, CreateVirtualNetworkRequest,
    IpConfiguration, IpConfigurationProperties, NetworkInterface, NetworkInterfaceProperties,
    SubResource, Subnet, SubnetProperties, VirtualNetwork, VirtualNetworkProperties,
    DYNAMIC_ALLOCATION,
};

/// Convenient result alias that reuses the shared provisioning error type.
pub type Result<T> = azprov_core::Result<T>;
