//! Config resolution
//!
//! [`Reader`] turns a config document of any supported version, written in
//! YAML or Jsonnet, into the latest in-memory representation.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result, ResultExt};
use crate::format::{Evaluator, Format, JsonnetCommand, RawDocument};
use crate::migrate;
use crate::schema::{LatestConfig, LATEST_VERSION};
use crate::version::sniff_version;

/// Reads config documents into [`LatestConfig`]
///
/// A reader keeps no per-call state: one instance can be cloned or shared
/// between threads and used for any number of independent reads.
#[derive(Clone)]
pub struct Reader {
    evaluator: Arc<dyn Evaluator>,
}

impl fmt::Debug for Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader").finish_non_exhaustive()
    }
}

impl Default for Reader {
    fn default() -> Self {
        Self::new()
    }
}

impl Reader {
    /// Create a reader evaluating Jsonnet with the `jsonnet` binary
    ///
    /// The binary can be overridden with the `VERCONF_JSONNET` environment
    /// variable.
    pub fn new() -> Self {
        Self::with_evaluator(JsonnetCommand::from_env())
    }

    /// Create a reader with a custom Jsonnet evaluator
    pub fn with_evaluator(evaluator: impl Evaluator + 'static) -> Self {
        Self::with_shared_evaluator(Arc::new(evaluator))
    }

    /// Create a reader sharing an existing evaluator
    pub fn with_shared_evaluator(evaluator: Arc<dyn Evaluator>) -> Self {
        Self { evaluator }
    }

    /// Read and resolve the config file at `path`
    ///
    /// `.jsonnet` files are evaluated, everything else is read as YAML.
    /// A missing file yields an error for which
    /// [`Error::is_not_found`](crate::Error::is_not_found) holds.
    pub fn read_file(&self, path: impl AsRef<Path>) -> Result<LatestConfig> {
        let doc = RawDocument::read(path)?;
        self.read_document(&doc)
    }

    /// Resolve an in-memory document
    pub fn read_document(&self, doc: &RawDocument) -> Result<LatestConfig> {
        log::debug!("Reading {} as {}", doc.label(), doc.format());
        match doc.format() {
            Format::Jsonnet => {
                let source = std::str::from_utf8(doc.bytes()).map_err(|e| {
                    Error::parse(format!("'{}' is not valid UTF-8", doc.label())).with_source(e)
                })?;
                self.read_jsonnet(doc.label(), source)
            }
            Format::Yaml => self.read_yaml(doc.bytes()),
        }
    }

    /// Resolve a YAML document of any supported version
    ///
    /// The version is sniffed before the body is decoded, so a document
    /// whose version cannot be read reports that first.
    pub fn read_yaml(&self, buf: &[u8]) -> Result<LatestConfig> {
        let tag = sniff_version(buf)
            .with_symptom(|| Error::message("error parsing the config version"))?;
        log::debug!("Sniffed config version '{}'", tag);
        migrate::resolve(&tag, buf)
    }

    /// Evaluate Jsonnet source and decode the result as a latest-version config
    ///
    /// Jsonnet configs do not support older versions.
    pub fn read_jsonnet(&self, label: &str, source: &str) -> Result<LatestConfig> {
        let json = self
            .evaluator
            .evaluate(label, source)
            .map_err(|e| Error::expression(label).with_source(e))?;

        let cfg: LatestConfig =
            serde_json::from_str(&json).map_err(|e| Error::decode(LATEST_VERSION, e))?;
        if cfg.version != LATEST_VERSION {
            return Err(Error::unsupported_version(cfg.version).with_help(format!(
                "Jsonnet configs must declare version '{}'",
                LATEST_VERSION
            )));
        }
        Ok(cfg)
    }
}

/// Read and resolve the config file at `path` with a default [`Reader`]
pub fn read_file(path: impl AsRef<Path>) -> Result<LatestConfig> {
    Reader::new().read_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::format::{EvalError, FnEvaluator};
    use crate::schema::v1alpha2;
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
      mark_read: true
      labels: [work]
"#;

    const LATEST_JSON: &str = r#"{
  "version": "v1alpha2",
  "author": {"name": "Jane", "email": "jane@example.com"},
  "labels": [{"name": "work"}],
  "rules": [
    {
      "filter": {"query": "from:boss@example.com"},
      "actions": {"mark_read": true, "labels": ["work"]}
    }
  ]
}"#;

    /// Evaluator that ignores its input and returns fixed output
    fn fixed(output: &'static str) -> Reader {
        Reader::with_evaluator(FnEvaluator::new(move |_: &str, _: &str| {
            Ok(output.to_string())
        }))
    }

    fn failing() -> Reader {
        Reader::with_evaluator(FnEvaluator::new(|label: &str, _: &str| {
            Err(EvalError::Failed(format!(
                "{}:1:1 Unexpected end of file",
                label
            )))
        }))
    }

    #[test]
    fn test_read_yaml_latest() {
        let direct: LatestConfig = serde_yaml::from_str(LATEST_YAML).unwrap();
        let cfg = Reader::new().read_yaml(LATEST_YAML.as_bytes()).unwrap();

        assert_eq!(cfg, direct);
        assert!(cfg.rules[0].actions.mark_read);
    }

    #[test]
    fn test_read_yaml_legacy_example() {
        let cfg = Reader::new().read_yaml(b"version: v1alpha1\nname: x").unwrap();

        assert_eq!(cfg.version, v1alpha2::VERSION);
        assert_eq!(cfg.author.name, "x");
    }

    #[test]
    fn test_read_yaml_unsupported_version() {
        let err = Reader::new()
            .read_yaml(b"version: v1beta1\nrules: []\n")
            .unwrap_err();

        assert_eq!(
            err.kind(),
            &ErrorKind::UnsupportedVersion {
                version: "v1beta1".into()
            }
        );
    }

    #[test]
    fn test_read_yaml_missing_version() {
        let err = Reader::new().read_yaml(b"rules: []\n").unwrap_err();

        assert!(err.is_unsupported_version());
        assert_eq!(err.to_string(), "missing config version");
    }

    #[test]
    fn test_read_yaml_version_parse_failure() {
        let err = Reader::new().read_yaml(b"version: v1alpha2\nrules: [\n").unwrap_err();

        assert_eq!(err.kind(), &ErrorKind::Message);
        assert!(err.is_kind(&ErrorKind::Parse));
        assert!(err
            .to_string()
            .starts_with("error parsing the config version: "));
    }

    #[test]
    fn test_read_yaml_unknown_field() {
        let yaml = format!("{}typo_field: 1\n", LATEST_YAML);
        let err = Reader::new().read_yaml(yaml.as_bytes()).unwrap_err();

        assert_eq!(err.kind(), &ErrorKind::UnknownField);
        assert!(err.help().is_some());
    }

    #[test]
    fn test_read_jsonnet_round_trip() {
        let from_yaml = Reader::new().read_yaml(LATEST_YAML.as_bytes()).unwrap();
        let from_jsonnet = fixed(LATEST_JSON)
            .read_jsonnet("config.jsonnet", "local x = 1; {}")
            .unwrap();

        assert_eq!(from_jsonnet, from_yaml);
    }

    #[test]
    fn test_read_jsonnet_passes_label_and_source() {
        let reader = Reader::with_evaluator(FnEvaluator::new(|label: &str, source: &str| {
            assert_eq!(label, "rules.jsonnet");
            assert_eq!(source, "{ version: 'v1alpha2' }");
            Ok(r#"{"version": "v1alpha2"}"#.to_string())
        }));

        let cfg = reader
            .read_jsonnet("rules.jsonnet", "{ version: 'v1alpha2' }")
            .unwrap();
        assert!(cfg.rules.is_empty());
    }

    #[test]
    fn test_read_jsonnet_evaluator_failure() {
        let err = failing().read_jsonnet("bad.jsonnet", "{").unwrap_err();

        assert_eq!(err.kind(), &ErrorKind::Expression);
        assert!(err.to_string().contains("invalid jsonnet in 'bad.jsonnet'"));
        assert!(err.to_string().contains("Unexpected end of file"));
        assert!(err.find_source::<EvalError>().is_some());
    }

    #[test]
    fn test_read_jsonnet_rejects_legacy_version() {
        let err = fixed(r#"{"version": "v1alpha2x"}"#)
            .read_jsonnet("config.jsonnet", "{}")
            .unwrap_err();
        assert!(err.is_unsupported_version());

        // Legacy documents cannot even be decoded, since the shape differs
        let err = fixed(r#"{"version": "v1alpha1", "filters": []}"#)
            .read_jsonnet("config.jsonnet", "{}")
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnknownField);

        let err = fixed(r#"{"version": "v1alpha1"}"#)
            .read_jsonnet("config.jsonnet", "{}")
            .unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::UnsupportedVersion {
                version: "v1alpha1".into()
            }
        );
    }

    #[test]
    fn test_read_jsonnet_missing_version() {
        let err = fixed(r#"{"rules": []}"#)
            .read_jsonnet("config.jsonnet", "{}")
            .unwrap_err();
        assert_eq!(err.to_string(), "missing config version");
    }

    #[test]
    fn test_read_jsonnet_unknown_field() {
        let err = fixed(r#"{"version": "v1alpha2", "extra": true}"#)
            .read_jsonnet("config.jsonnet", "{}")
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnknownField);
    }

    #[test]
    fn test_read_document_dispatches_on_format() {
        let reader = fixed(LATEST_JSON);

        let jsonnet = RawDocument::from_path_hint("a.jsonnet", "ignored");
        let yaml = RawDocument::from_path_hint("a.yaml", LATEST_YAML);

        assert_eq!(
            reader.read_document(&jsonnet).unwrap(),
            reader.read_document(&yaml).unwrap()
        );
    }

    #[test]
    fn test_read_document_jsonnet_not_utf8() {
        let doc = RawDocument::new("bin.jsonnet", Format::Jsonnet, vec![0xff, 0xfe, 0x00]);
        let err = fixed(LATEST_JSON).read_document(&doc).unwrap_err();

        assert_eq!(err.kind(), &ErrorKind::Parse);
        assert!(err.to_string().contains("bin.jsonnet"));
    }

    #[test]
    fn test_read_file_yaml_and_jsonnet() {
        let temp_dir = std::env::temp_dir().join("verconf_test_read_file");
        std::fs::create_dir_all(&temp_dir).unwrap();

        let yaml_path = temp_dir.join("config.yaml");
        std::fs::write(&yaml_path, LATEST_YAML).unwrap();
        let jsonnet_path = temp_dir.join("config.jsonnet");
        std::fs::write(&jsonnet_path, "{}").unwrap();

        let expected_label = jsonnet_path.display().to_string();
        let reader = Reader::with_evaluator(FnEvaluator::new(move |label: &str, _: &str| {
            assert_eq!(label, expected_label);
            Ok(LATEST_JSON.to_string())
        }));

        let from_yaml = reader.read_file(&yaml_path).unwrap();
        let from_jsonnet = reader.read_file(&jsonnet_path).unwrap();
        assert_eq!(from_yaml, from_jsonnet);

        std::fs::remove_dir_all(&temp_dir).ok();
    }

    #[test]
    fn test_read_file_not_found() {
        let path = std::env::temp_dir().join("verconf_test_missing_dir/config.yaml");
        let err = read_file(&path).unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(err.kind(), &ErrorKind::Io);

        // Still classified after re-wrapping with more context
        let wrapped = Error::message("cannot start").with_cause(err.with_details("default path"));
        assert!(wrapped.is_not_found());
    }

    #[test]
    fn test_read_file_parse_error_is_not_not_found() {
        let temp_dir = std::env::temp_dir().join("verconf_test_read_file_bad");
        std::fs::create_dir_all(&temp_dir).unwrap();
        let path = temp_dir.join("config.yaml");
        std::fs::write(&path, "version: v1alpha2\nrules: {\n").unwrap();

        let err = read_file(&path).unwrap_err();
        assert!(!err.is_not_found());

        std::fs::remove_dir_all(&temp_dir).ok();
    }

    #[test]
    fn test_reader_shared_across_threads() {
        let reader = fixed(LATEST_JSON);

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let reader = reader.clone();
                std::thread::spawn(move || {
                    if i % 2 == 0 {
                        reader.read_jsonnet("config.jsonnet", "{}")
                    } else {
                        reader.read_yaml(LATEST_YAML.as_bytes())
                    }
                })
            })
            .collect();

        let results: Vec<LatestConfig> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();
        assert!(results.windows(2).all(|w| w[0] == w[1]));
    }
}
