//! verconf-core: versioned configuration loading
//!
//! This crate resolves a config document of unknown schema version into the
//! latest configuration representation. YAML documents are dispatched on
//! their top-level `version` field and older versions are migrated on read;
//! Jsonnet documents are evaluated and must produce the latest version.
//!
//! # Example
//!
//! ```rust
//! use verconf_core::Reader;
//!
//! let yaml = br#"
//! version: v1alpha1
//! author:
//!   name: Jane
//! filters:
//!   - query: "from:boss@example.com"
//!     labels: [work]
//! "#;
//!
//! let config = Reader::new().read_yaml(yaml).unwrap();
//! assert_eq!(config.version, "v1alpha2");
//! assert_eq!(config.labels[0].name, "work");
//! ```

pub mod error;
pub mod format;
pub mod migrate;
pub mod schema;
pub mod version;

mod config;

pub use config::{read_file, Reader};
pub use error::{Error, ErrorKind, Result, ResultExt};
pub use format::{EvalError, Evaluator, FnEvaluator, Format, JsonnetCommand, RawDocument};
pub use migrate::{SchemaVersion, VersionedConfig};
pub use schema::{LatestConfig, LATEST_VERSION};
pub use version::{sniff_version, VersionTag};
