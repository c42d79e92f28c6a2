//! Predecessor config schema (`v1alpha1`)
//!
//! Filters are flat: each one carries its query and its actions side by
//! side, and labels are used without being declared.

use serde::{Deserialize, Serialize};

/// Version tag of this schema
pub const VERSION: &str = "v1alpha1";

/// A `v1alpha1` config document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub version: String,
    /// Display name of the config owner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub author: Author,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Author {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// A query together with the actions applied to matching items
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Filter {
    pub query: String,
    #[serde(default)]
    pub archive: bool,
    #[serde(default)]
    pub mark_read: bool,
    #[serde(default)]
    pub labels: Vec<String>,
}
