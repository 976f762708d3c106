//! Resource group client and data models.
//!
//! Provides typed structures and an asynchronous client for the `Microsoft.Resources`
//! resource group endpoints of Azure Resource Manager.

#![deny(missing_docs)]

pub mod client;
pub mod models;

pub use client::{ResourcesClient, ResourcesClientBuilder};
pub use models::{CreateResourceGroupRequest, ResourceGroup, ResourceGroupProperties};

/// Convenient result alias that reuses the shared provisioning error type.
pub type Result<T> = azprov_core::Result<T>;
