//! Storage account models.

use azprov_core::types::ResourceId;
use serde::{Deserialize, Serialize};

/// SKU used for new accounts (locally redundant storage).
pub const DEFAULT_SKU: &str = "Standard_LRS";

/// Account kind used for new accounts.
pub const DEFAULT_STORAGE_KIND: &str = "Storage";

/// Storage SKU.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sku {
    /// SKU name (`Standard_LRS`, `Premium_LRS`, ...)
    pub name: String,
    /// SKU tier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
}

impl Sku {
    /// SKU with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tier: None,
        }
    }
}

/// Storage account as returned by Resource Manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageAccount {
    /// Provider-assigned identifier
    pub id: ResourceId,
    /// Account name, globally unique
    pub name: String,
    /// Region
    pub location: String,
    /// SKU
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<Sku>,
    /// Account kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Account properties
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<StorageAccountProperties>,
}

impl StorageAccount {
    /// Provisioning state reported by the provider.
    #[must_use]
    pub fn provisioning_state(&self) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|props| props.provisioning_state.as_deref())
    }

    /// Primary blob endpoint, when the account is addressable.
    #[must_use]
    pub fn blob_endpoint(&self) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|props| props.primary_endpoints.as_ref())
            .and_then(|endpoints| endpoints.blob.as_deref())
    }
}

/// Storage account properties.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StorageAccountProperties {
    /// Provisioning state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
    /// Public endpoints of the account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_endpoints: Option<StorageEndpoints>,
    /// Primary region
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_location: Option<String>,
}

/// Public endpoints of a storage account.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageEndpoints {
    /// Blob service endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
    /// Queue service endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
    /// Table service endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// File service endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Payload for creating a storage account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateStorageAccountRequest {
    /// SKU
    pub sku: Sku,
    /// Account kind
    pub kind: String,
    /// Region
    pub location: String,
}

impl CreateStorageAccountRequest {
    /// Standard locally redundant account in `location`.
    #[must_use]
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            sku: Sku::new(DEFAULT_SKU),
            kind: DEFAULT_STORAGE_KIND.to_string(),
            location: location.into(),
        }
    }

    /// Override the SKU.
    #[must_use]
    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Sku::new(sku);
        self
    }
}
