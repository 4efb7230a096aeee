//! Templates embedded in the binary at build time.

use crate::error::{Error, Result};

/// Name of the Google Cloud bootstrap template.
pub const GOOGLE_BOOTSTRAP: &str = "bootstrap/google.json.j2";

/// An embedded template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Asset {
    /// Lookup name
    pub name: &'static str,
    /// Bumped whenever the contents change incompatibly
    pub version: u32,
    /// Template source
    pub contents: &'static str,
}

static ASSETS: &[Asset] = &[Asset {
    name: GOOGLE_BOOTSTRAP,
    version: 1,
    contents: include_str!("../../assets/bootstrap/google.json.j2"),
}];

/// Look up an embedded asset by name.
pub fn asset(name: &str) -> Result<&'static Asset> {
    ASSETS
        .iter()
        .find(|a| a.name == name)
        .ok_or_else(|| Error::AssetNotFound(name.to_string()))
}
