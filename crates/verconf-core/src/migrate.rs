//! Version dispatch and upgrade-on-read migration
//!
//! A sniffed [`VersionTag`] selects exactly one decoder from a closed table.
//! Documents of the latest version are decoded strictly into
//! [`LatestConfig`]; predecessor documents are decoded strictly into their
//! own schema and then imported. Any other tag is rejected.

use std::fmt;

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::schema::{v1alpha1, v1alpha2, LatestConfig};
use crate::version::VersionTag;

/// The supported schema generations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaVersion {
    V1Alpha1,
    V1Alpha2,
}

type DecodeFn = fn(&[u8]) -> Result<VersionedConfig>;

/// Every supported version with its strict decoder
const DECODERS: [(SchemaVersion, DecodeFn); 2] = [
    (SchemaVersion::V1Alpha2, decode_v1alpha2),
    (SchemaVersion::V1Alpha1, decode_v1alpha1),
];

impl SchemaVersion {
    /// The latest supported version
    pub const LATEST: SchemaVersion = SchemaVersion::V1Alpha2;

    /// The version tag naming this schema in documents
    pub fn tag(self) -> &'static str {
        match self {
            SchemaVersion::V1Alpha1 => v1alpha1::VERSION,
            SchemaVersion::V1Alpha2 => v1alpha2::VERSION,
        }
    }

    pub fn is_latest(self) -> bool {
        self == Self::LATEST
    }

    /// Look up the schema named by `tag`; dispatch is exact-match only
    pub fn from_tag(tag: &VersionTag) -> Option<Self> {
        lookup(tag).map(|(version, _)| version)
    }
}

fn lookup(tag: &VersionTag) -> Option<(SchemaVersion, DecodeFn)> {
    DECODERS
        .iter()
        .copied()
        .find(|(version, _)| version.tag() == tag.as_str())
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A config decoded into the schema named by its own version tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionedConfig {
    V1Alpha1(v1alpha1::Config),
    V1Alpha2(v1alpha2::Config),
}

impl VersionedConfig {
    /// The schema this config was decoded into
    pub fn version(&self) -> SchemaVersion {
        match self {
            VersionedConfig::V1Alpha1(_) => SchemaVersion::V1Alpha1,
            VersionedConfig::V1Alpha2(_) => SchemaVersion::V1Alpha2,
        }
    }

    /// Migrate this config to the latest schema
    pub fn into_latest(self) -> Result<LatestConfig> {
        match self {
            VersionedConfig::V1Alpha2(cfg) => Ok(cfg),
            VersionedConfig::V1Alpha1(cfg) => {
                log::warn!(
                    "Migrating {} config to {}; run `verconf dump` to upgrade the file",
                    v1alpha1::VERSION,
                    v1alpha2::VERSION
                );
                v1alpha2::import(cfg).map_err(|e| Error::import(v1alpha1::VERSION, e))
            }
        }
    }
}

/// Strictly decode `buf` into the schema named by `tag`
pub fn decode(tag: &VersionTag, buf: &[u8]) -> Result<VersionedConfig> {
    match lookup(tag) {
        Some((version, decode_fn)) => {
            log::debug!("Decoding config as {}", version);
            decode_fn(buf)
        }
        None => Err(Error::unsupported_version(tag.as_str()).with_help(format!(
            "Set the top-level 'version' field to '{}'",
            SchemaVersion::LATEST
        ))),
    }
}

/// Decode `buf` into the schema named by `tag` and migrate it to the latest
pub fn resolve(tag: &VersionTag, buf: &[u8]) -> Result<LatestConfig> {
    decode(tag, buf)?.into_latest()
}

/// Decode the first document of `buf`, rejecting unknown fields
fn strict_yaml<T: DeserializeOwned>(buf: &[u8]) -> std::result::Result<T, serde_yaml::Error> {
    match serde_yaml::Deserializer::from_slice(buf).next() {
        Some(first) => T::deserialize(first),
        None => serde_yaml::from_slice(buf),
    }
}

fn decode_v1alpha2(buf: &[u8]) -> Result<VersionedConfig> {
    strict_yaml(buf)
        .map(VersionedConfig::V1Alpha2)
        .map_err(|e| Error::decode(v1alpha2::VERSION, e))
}

fn decode_v1alpha1(buf: &[u8]) -> Result<VersionedConfig> {
    strict_yaml(buf).map(VersionedConfig::V1Alpha1).map_err(|e| {
        Error::legacy_parse(v1alpha1::VERSION).with_cause(Error::decode_unnamed(e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    const LATEST_YAML: &str = r#"
version: v1alpha2
author:
  name: Jane
  email: jane@example.com
labels:
  - name: work
rules:
  - filter:
      query: "from:boss@example.com"
    actions:
      labels: [work]
"#;

    const LEGACY_YAML: &str = r#"
version: v1alpha1
author:
  name: Jane
  email: jane@example.com
filters:
  - query: "from:boss@example.com"
    labels: [work]
    archive: true
"#;

    #[test]
    fn test_from_tag_exact_match() {
        assert_eq!(
            SchemaVersion::from_tag(&"v1alpha2".into()),
            Some(SchemaVersion::V1Alpha2)
        );
        assert_eq!(
            SchemaVersion::from_tag(&"v1alpha1".into()),
            Some(SchemaVersion::V1Alpha1)
        );
        assert_eq!(SchemaVersion::from_tag(&"V1Alpha2".into()), None);
        assert_eq!(SchemaVersion::from_tag(&" v1alpha2".into()), None);
        assert_eq!(SchemaVersion::from_tag(&VersionTag::default()), None);
    }

    #[test]
    fn test_latest() {
        assert!(SchemaVersion::LATEST.is_latest());
        assert!(!SchemaVersion::V1Alpha1.is_latest());
        assert_eq!(SchemaVersion::LATEST.tag(), crate::schema::LATEST_VERSION);
    }

    #[test]
    fn test_resolve_latest_equals_strict_decode() {
        let direct: LatestConfig = serde_yaml::from_str(LATEST_YAML).unwrap();
        let cfg = resolve(&"v1alpha2".into(), LATEST_YAML.as_bytes()).unwrap();

        assert_eq!(cfg, direct);
        assert_eq!(cfg.rules[0].actions.labels, vec!["work"]);
    }

    #[test]
    fn test_resolve_legacy_equals_import() {
        let legacy: v1alpha1::Config = serde_yaml::from_str(LEGACY_YAML).unwrap();
        let expected = v1alpha2::import(legacy).unwrap();

        let decoded = decode(&"v1alpha1".into(), LEGACY_YAML.as_bytes()).unwrap();
        assert_eq!(decoded.version(), SchemaVersion::V1Alpha1);

        let cfg = decoded.into_latest().unwrap();
        assert_eq!(cfg, expected);
        assert_eq!(cfg.version, "v1alpha2");
        assert!(cfg.rules[0].actions.archive);
    }

    #[test]
    fn test_resolve_unsupported() {
        let err = resolve(&"v3".into(), b"version: v3\n").unwrap_err();

        assert_eq!(
            err.kind(),
            &ErrorKind::UnsupportedVersion {
                version: "v3".into()
            }
        );
        assert_eq!(err.to_string(), "unsupported version 'v3'");
        assert!(err.help().unwrap().contains("v1alpha2"));
    }

    #[test]
    fn test_resolve_missing_version() {
        let err = resolve(&VersionTag::default(), b"rules: []\n").unwrap_err();
        assert!(err.is_unsupported_version());
    }

    #[test]
    fn test_latest_rejects_unknown_field() {
        let err = resolve(&"v1alpha2".into(), b"version: v1alpha2\nfilters: []\n").unwrap_err();

        assert_eq!(err.kind(), &ErrorKind::UnknownField);
        assert!(err.to_string().contains("filters"));
    }

    #[test]
    fn test_legacy_accepts_its_own_fields() {
        // `filters` and `name` are unknown to v1alpha2 but valid v1alpha1 fields
        let yaml = b"version: v1alpha1\nname: x\nfilters: []\n";
        let cfg = resolve(&"v1alpha1".into(), yaml).unwrap();

        assert_eq!(cfg.version, "v1alpha2");
        assert_eq!(cfg.author.name, "x");
    }

    #[test]
    fn test_legacy_parse_error() {
        let err = resolve(&"v1alpha1".into(), b"version: v1alpha1\nrules: []\n").unwrap_err();

        assert_eq!(err.kind(), &ErrorKind::LegacyParse);
        assert!(err.is_kind(&ErrorKind::UnknownField));
        assert!(err
            .to_string()
            .starts_with("error parsing v1alpha1 config: unknown field in config: "));
        assert_eq!(err.to_string().matches("v1alpha1").count(), 1);
    }

    #[test]
    fn test_legacy_import_error() {
        let yaml = b"version: v1alpha1\nfilters:\n  - query: \"\"\n    archive: true\n";
        let err = resolve(&"v1alpha1".into(), yaml).unwrap_err();

        assert_eq!(err.kind(), &ErrorKind::Import);
        assert_eq!(
            err.find_source::<v1alpha2::ImportError>(),
            Some(&v1alpha2::ImportError::EmptyQuery { index: 0 })
        );
    }

    #[test]
    fn test_resolve_reads_first_document() {
        let yaml = format!("---{}---\nversion: v1alpha1\nfilters: []\n", LATEST_YAML);
        let cfg = resolve(&"v1alpha2".into(), yaml.as_bytes()).unwrap();

        assert_eq!(cfg, serde_yaml::from_str::<LatestConfig>(LATEST_YAML).unwrap());
    }

    #[test]
    fn test_latest_type_mismatch_is_parse_error() {
        let err = resolve(&"v1alpha2".into(), b"version: v1alpha2\nrules: nope\n").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::Parse);
    }
}
