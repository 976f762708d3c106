//! Resource group models.

use azprov_core::types::ResourceId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Resource group as returned by Resource Manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceGroup {
    /// Provider-assigned identifier.
    pub id: ResourceId,
    /// Resource group name.
    pub name: String,
    /// Region; immutable once the group exists.
    pub location: String,
    /// Provisioning properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<ResourceGroupProperties>,
    /// Tag map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
}

impl ResourceGroup {
    /// Provisioning state reported by the provider.
    #[must_use]
    pub fn provisioning_state(&self) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|props| props.provisioning_state.as_deref())
    }
}

/// Resource group properties.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroupProperties {
    /// Provisioning state (`Succeeded`, `Deleting`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

/// Payload for creating or updating a resource group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateResourceGroupRequest {
    /// Region.
    pub location: String,
    /// Optional tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
}

impl CreateResourceGroupRequest {
    /// Request for a group in `location` without tags.
    #[must_use]
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            tags: None,
        }
    }
}
