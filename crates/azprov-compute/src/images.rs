//! Catalog of OS images available to new virtual machines.
//!
//! The catalog is a `static` table of borrowed strings: it is built at compile time and
//! has no mutation path. Unknown keys fail locally with `NotFound` before any request is
//! made.

use azprov_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Marketplace image a virtual machine boots from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageReference {
    /// Image publisher
    pub publisher: Cow<'static, str>,
    /// Image offer
    pub offer: Cow<'static, str>,
    /// Image SKU
    pub sku: Cow<'static, str>,
    /// Image version
    pub version: Cow<'static, str>,
}

impl ImageReference {
    /// Image reference from static strings.
    #[must_use]
    pub const fn from_static(
        publisher: &'static str,
        offer: &'static str,
        sku: &'static str,
        version: &'static str,
    ) -> Self {
        Self {
            publisher: Cow::Borrowed(publisher),
            offer: Cow::Borrowed(offer),
            sku: Cow::Borrowed(sku),
            version: Cow::Borrowed(version),
        }
    }

    /// Image reference from owned strings.
    #[must_use]
    pub fn new(
        publisher: impl Into<String>,
        offer: impl Into<String>,
        sku: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            publisher: Cow::Owned(publisher.into()),
            offer: Cow::Owned(offer.into()),
            sku: Cow::Owned(sku.into()),
            version: Cow::Owned(version.into()),
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.publisher, self.offer, self.sku, self.version
        )
    }
}

/// Ubuntu Server 16.04 LTS.
pub const LINUX: ImageReference =
    ImageReference::from_static("Canonical", "UbuntuServer", "16.04.0-LTS", "latest");

/// Windows Server Essentials.
pub const WINDOWS: ImageReference = ImageReference::from_static(
    "MicrosoftWindowsServerEssentials",
    "WindowsServerEssentials",
    "WindowsServerEssentials",
    "latest",
);

static CATALOG: [(&str, ImageReference); 2] = [("linux", LINUX), ("windows", WINDOWS)];

/// Look up the image for a logical OS key (`linux`, `windows`).
///
/// # Errors
///
/// Returns `NotFound` for any other key.
pub fn lookup(key: &str) -> Result<&'static ImageReference> {
    CATALOG
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, image)| image)
        .ok_or_else(|| {
            Error::NotFound(format!(
                "No OS image `{key}` in catalog (known: {})",
                keys().collect::<Vec<_>>().join(", ")
            ))
        })
}

/// Keys accepted by [`lookup`].
pub fn keys() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().map(|(name, _)| *name)
}
