//! Latest config schema (`v1alpha2`)
//!
//! Rules split the filter from its actions, and every label used by a rule
//! is declared up front in `labels`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::v1alpha1;

/// Version tag of this schema
pub const VERSION: &str = "v1alpha2";

/// A `v1alpha2` config document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub author: Author,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Author {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// A declared label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    pub filter: Filter,
    #[serde(default)]
    pub actions: Actions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Filter {
    pub query: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Actions {
    #[serde(default, skip_serializing_if = "is_false")]
    pub archive: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub mark_read: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Actions {
    /// Check if no action is set
    pub fn is_empty(&self) -> bool {
        !self.archive && !self.mark_read && self.labels.is_empty()
    }
}

/// Failure to express a `v1alpha1` config in this schema
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImportError {
    #[error("filter at index {index} has an empty query")]
    EmptyQuery { index: usize },
    #[error("filter at index {index} has no actions")]
    NoActions { index: usize },
}

/// Import a `v1alpha1` config into this schema
///
/// Each filter becomes a rule, and every label referenced by a filter is
/// declared once, in sorted order. A legacy top-level `name` fills in the
/// author name when the author block has none.
pub fn import(prev: v1alpha1::Config) -> Result<Config, ImportError> {
    let mut declared = BTreeSet::new();
    let mut rules = Vec::with_capacity(prev.filters.len());

    for (index, filter) in prev.filters.into_iter().enumerate() {
        if filter.query.trim().is_empty() {
            return Err(ImportError::EmptyQuery { index });
        }
        let actions = Actions {
            archive: filter.archive,
            mark_read: filter.mark_read,
            labels: filter.labels,
        };
        if actions.is_empty() {
            return Err(ImportError::NoActions { index });
        }
        declared.extend(actions.labels.iter().cloned());
        rules.push(Rule {
            filter: Filter {
                query: filter.query,
            },
            actions,
        });
    }

    let name = match prev.name {
        Some(name) if prev.author.name.is_empty() => name,
        _ => prev.author.name,
    };

    Ok(Config {
        version: VERSION.to_string(),
        author: Author {
            name,
            email: prev.author.email,
        },
        labels: declared.into_iter().map(|name| Label { name }).collect(),
        rules,
    })
}

impl TryFrom<v1alpha1::Config> for Config {
    type Error = ImportError;

    fn try_from(prev: v1alpha1::Config) -> Result<Self, Self::Error> {
        import(prev)
    }
}
