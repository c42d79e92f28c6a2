//! Version sniffing
//!
//! Extracts the top-level `version` field of a YAML document without
//! requiring the rest of the document to match any schema.

use std::fmt;

use serde::Deserialize;
use serde_yaml::Value;

use crate::error::{Error, Result};

/// The version tag declared by a config document
///
/// An empty tag means the document has no `version` field, which is a
/// distinct state from declaring a version that is not supported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VersionTag(String);

impl VersionTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if the document declared no version at all
    pub fn is_absent(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionTag {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

/// Read the top-level `version` field of a YAML document
///
/// Returns an empty tag if the field is absent or null. Fails only if the
/// buffer is not valid YAML, is not a mapping at the top level, or declares
/// a version that is not a scalar. In a multi-document stream only the first
/// document is read.
pub fn sniff_version(buf: &[u8]) -> Result<VersionTag> {
    let doc = match serde_yaml::Deserializer::from_slice(buf).next() {
        Some(first) => Value::deserialize(first),
        None => Ok(Value::Null),
    }
    .map_err(|e| Error::parse("malformed YAML document").with_source(e))?;

    let map = match doc {
        Value::Null => return Ok(VersionTag::default()),
        Value::Mapping(map) => map,
        other => {
            return Err(Error::parse(format!(
                "expected a mapping at the top level, found {}",
                type_name(&other)
            )))
        }
    };

    match map.get("version") {
        None | Some(Value::Null) => Ok(VersionTag::default()),
        Some(Value::String(s)) => Ok(VersionTag::new(s.as_str())),
        Some(Value::Number(n)) => Ok(VersionTag::new(n.to_string())),
        Some(Value::Bool(b)) => Ok(VersionTag::new(b.to_string())),
        Some(other) => Err(Error::parse(format!(
            "expected a string for 'version', found {}",
            type_name(other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}
