//! Storage account client and data models.
//!
//! Provides typed structures and an asynchronous client for `Microsoft.Storage` storage
//! accounts. The blob endpoint of an account hosts the OS disk images of virtual machines.

#![deny(missing_docs)]

pub mod client;
pub mod models;

pub use client::{StorageClient, StorageClientBuilder};
pub use models::{
    CreateStorageAccountRequest, Sku, StorageAccount, StorageAccountProperties, StorageEndpoints,
    DEFAULT_SKU, DEFAULT_STORAGE_KIND,
};

/// Convenient result alias that reuses the shared provisioning error type.
pub type Result<T> = azprov_core::Result<T>;
