//! Error types for verconf
//!
//! Errors are layered. A leaf carries an [`ErrorKind`], a message and an
//! optional actionable help text. Leaves are composed into:
//!
//! - annotated errors, pairing a higher-level symptom with its deeper cause
//!   ([`Error::with_cause`]),
//! - detailed errors, stacking human-readable detail lines
//!   ([`Error::with_details`], [`Error::details`]),
//! - not-found markers ([`Error::into_not_found`], [`Error::is_not_found`]).
//!
//! Matching walks every layer: a predicate matches an annotated error if it
//! matches the symptom or the cause, so classification survives any amount of
//! re-wrapping.

use std::fmt;
use std::sync::Arc;

/// Result type alias for verconf operations
pub type Result<T> = std::result::Result<T, Error>;

type Source = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for verconf operations
#[derive(Debug, Clone)]
pub struct Error {
    repr: Box<Repr>,
}

#[derive(Debug, Clone)]
enum Repr {
    Leaf(Leaf),
    Annotated { symptom: Error, cause: Error },
    Detailed { error: Error, details: String },
    NotFound(Error),
}

#[derive(Debug, Clone)]
struct Leaf {
    kind: ErrorKind,
    message: String,
    help: Option<String>,
    source: Option<Source>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Reading the input failed
    Io,
    /// The input is not syntactically valid
    Parse,
    /// The expression-language evaluator rejected the input
    Expression,
    /// Strict decoding found a field the schema does not define
    UnknownField,
    /// A predecessor-version document failed strict decoding
    LegacyParse,
    /// The version tag is absent or not one of the supported versions
    UnsupportedVersion { version: String },
    /// A predecessor config could not be mapped to the latest schema
    Import,
    /// Plain message with no further classification
    Message,
}

impl Error {
    /// Create a leaf error of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::leaf(Leaf {
            kind,
            message: message.into(),
            help: None,
            source: None,
        })
    }

    fn leaf(leaf: Leaf) -> Self {
        Self {
            repr: Box::new(Repr::Leaf(leaf)),
        }
    }

    /// Create an unclassified error, typically used as a symptom
    pub fn message(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Message, message)
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    /// Create an error for a failed read of `path`
    ///
    /// A missing file is tagged as not-found so callers can tell it apart
    /// from other I/O failures with [`Error::is_not_found`].
    pub fn file_read(path: impl fmt::Display, err: std::io::Error) -> Self {
        let missing = err.kind() == std::io::ErrorKind::NotFound;
        let error =
            Self::new(ErrorKind::Io, format!("failed to read '{}'", path)).with_source(err);
        if missing {
            error
                .with_help("Check that the config file exists")
                .into_not_found()
        } else {
            error.with_help("Check that the config file is readable")
        }
    }

    /// Create an expression-language evaluation error
    pub fn expression(label: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Expression, format!("invalid jsonnet in '{}'", label))
    }

    /// Create a strict-decode error from a deserializer failure
    ///
    /// Failures caused by unrecognized fields are classified as
    /// [`ErrorKind::UnknownField`], everything else as [`ErrorKind::Parse`].
    pub fn decode(schema: &str, err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::decode_in(&format!("{} config", schema), err)
    }

    /// Like [`Error::decode`], for failures wrapped by a symptom that
    /// already names the schema
    pub fn decode_unnamed(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::decode_in("config", err)
    }

    fn decode_in(what: &str, err: impl std::error::Error + Send + Sync + 'static) -> Self {
        if err.to_string().contains("unknown field") {
            Self::new(ErrorKind::UnknownField, format!("unknown field in {}", what))
                .with_help("Remove the field or check it for typos")
                .with_source(err)
        } else {
            Self::new(ErrorKind::Parse, format!("invalid {}", what)).with_source(err)
        }
    }

    /// Create a predecessor-version parse error
    pub fn legacy_parse(schema: &str) -> Self {
        Self::new(ErrorKind::LegacyParse, format!("error parsing {} config", schema))
    }

    /// Create an unsupported version error carrying the offending tag
    pub fn unsupported_version(version: impl Into<String>) -> Self {
        let version = version.into();
        let message = if version.is_empty() {
            "missing config version".to_string()
        } else {
            format!("unsupported version '{}'", version)
        };
        Self::new(ErrorKind::UnsupportedVersion { version }, message)
    }

    /// Create an import error from a predecessor-schema collaborator failure
    pub fn import(schema: &str, err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::new(ErrorKind::Import, format!("cannot import {} config", schema)).with_source(err)
    }

    /// Annotate this error (the symptom) with a deeper cause
    ///
    /// Both errors stay discoverable through [`Error::matches`].
    pub fn with_cause(self, cause: Error) -> Self {
        Self {
            repr: Box::new(Repr::Annotated {
                symptom: self,
                cause,
            }),
        }
    }

    /// Push a human-readable detail on top of this error
    pub fn with_details(self, details: impl Into<String>) -> Self {
        Self {
            repr: Box::new(Repr::Detailed {
                error: self,
                details: details.into(),
            }),
        }
    }

    /// Tag this error as a not-found condition
    pub fn into_not_found(self) -> Self {
        Self {
            repr: Box::new(Repr::NotFound(self)),
        }
    }

    /// Attach an underlying error to the outermost leaf
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.surface_leaf_mut().source = Some(Arc::new(source));
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.surface_leaf_mut().help = Some(help.into());
        self
    }

    fn surface_leaf_mut(&mut self) -> &mut Leaf {
        match &mut *self.repr {
            Repr::Leaf(leaf) => leaf,
            Repr::Annotated { symptom, .. } => symptom.surface_leaf_mut(),
            Repr::Detailed { error, .. } => error.surface_leaf_mut(),
            Repr::NotFound(error) => error.surface_leaf_mut(),
        }
    }

    fn surface_leaf(&self) -> &Leaf {
        match &*self.repr {
            Repr::Leaf(leaf) => leaf,
            Repr::Annotated { symptom, .. } => symptom.surface_leaf(),
            Repr::Detailed { error, .. } => error.surface_leaf(),
            Repr::NotFound(error) => error.surface_leaf(),
        }
    }

    /// The kind of the outermost leaf (the symptom for annotated errors)
    pub fn kind(&self) -> &ErrorKind {
        &self.surface_leaf().kind
    }

    /// The first help message found while walking the error layers
    pub fn help(&self) -> Option<&str> {
        self.find(&|e: &Error| matches!(&*e.repr, Repr::Leaf(Leaf { help: Some(_), .. })))
            .and_then(|e| e.surface_leaf().help.as_deref())
    }

    /// Walk this error and every wrapped error, symptoms before causes,
    /// returning the first layer satisfying `pred`.
    fn find<'a>(&'a self, pred: &dyn Fn(&Error) -> bool) -> Option<&'a Error> {
        if pred(self) {
            return Some(self);
        }
        match &*self.repr {
            Repr::Leaf(_) => None,
            Repr::Annotated { symptom, cause } => {
                symptom.find(pred).or_else(|| cause.find(pred))
            }
            Repr::Detailed { error, .. } => error.find(pred),
            Repr::NotFound(error) => error.find(pred),
        }
    }

    /// Check whether this error or any error it wraps satisfies `pred`
    pub fn matches(&self, pred: impl Fn(&Error) -> bool) -> bool {
        self.find(&pred).is_some()
    }

    /// Check whether any leaf in this error has exactly the given kind
    pub fn is_kind(&self, kind: &ErrorKind) -> bool {
        self.matches(|e| matches!(&*e.repr, Repr::Leaf(leaf) if &leaf.kind == kind))
    }

    /// Check whether any leaf in this error was caused by an unsupported version
    pub fn is_unsupported_version(&self) -> bool {
        self.matches(|e| {
            matches!(
                &*e.repr,
                Repr::Leaf(Leaf {
                    kind: ErrorKind::UnsupportedVersion { .. },
                    ..
                })
            )
        })
    }

    /// Check whether this error was tagged as not-found at any layer
    pub fn is_not_found(&self) -> bool {
        self.matches(|e| matches!(&*e.repr, Repr::NotFound(_)))
    }

    /// Find an underlying error of type `T` anywhere in the error layers
    pub fn find_source<T: std::error::Error + 'static>(&self) -> Option<&T> {
        let hit = self.find(&|e: &Error| match &*e.repr {
            Repr::Leaf(Leaf {
                source: Some(source),
                ..
            }) => source.is::<T>(),
            _ => false,
        })?;
        hit.surface_leaf().source.as_deref()?.downcast_ref::<T>()
    }

    /// Render the stacked detail messages, outermost first
    ///
    /// Each detail becomes an indented bullet; continuation lines of
    /// multi-line details (such as nested detail renderings) are indented
    /// further. Returns an empty string if there are no details.
    pub fn details(&self) -> String {
        let detailed = self.find(&|e: &Error| matches!(&*e.repr, Repr::Detailed { .. }));
        match detailed.map(|e| &*e.repr) {
            Some(Repr::Detailed { error, details }) => format!(
                "\n  - {}{}",
                details.replace('\n', "\n    "),
                error.details()
            ),
            _ => String::new(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.repr {
            Repr::Leaf(leaf) => {
                write!(f, "{}", leaf.message)?;
                if let Some(source) = &leaf.source {
                    write!(f, ": {}", source)?;
                }
                Ok(())
            }
            Repr::Annotated { symptom, cause } => write!(f, "{}: {}", symptom, cause),
            Repr::Detailed { error, .. } => write!(f, "{}", error),
            Repr::NotFound(error) => write!(f, "{}", error),
        }
    }
}

impl std::error::Error for Error {}

/// Annotate an optional symptom with an optional cause
///
/// When one side is absent the other is returned unchanged, so absence is
/// never wrapped.
pub fn with_cause(symptom: Option<Error>, cause: Option<Error>) -> Option<Error> {
    match (symptom, cause) {
        (Some(symptom), Some(cause)) => Some(symptom.with_cause(cause)),
        (symptom, cause) => symptom.or(cause),
    }
}

/// Add a detail to an optional error, propagating absence
pub fn with_details(err: Option<Error>, details: impl Into<String>) -> Option<Error> {
    err.map(|e| e.with_details(details))
}

/// Tag an optional error as not-found, propagating absence
pub fn not_found(err: Option<Error>) -> Option<Error> {
    err.map(Error::into_not_found)
}

/// Render the stacked details of `err`, see [`Error::details`]
pub fn details(err: &Error) -> String {
    err.details()
}

/// Check whether `err` was tagged as not-found at any layer
pub fn is_not_found(err: &Error) -> bool {
    err.is_not_found()
}

/// Extension methods for annotating the error side of a [`Result`]
pub trait ResultExt<T> {
    /// Push a detail onto the error, if any
    fn with_details(self, details: impl Into<String>) -> Result<T>;

    /// Annotate the error, if any, with a higher-level symptom
    fn with_symptom(self, symptom: impl FnOnce() -> Error) -> Result<T>;

    /// Tag the error, if any, as not-found
    fn not_found(self) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_details(self, details: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_details(details))
    }

    fn with_symptom(self, symptom: impl FnOnce() -> Error) -> Result<T> {
        self.map_err(|cause| symptom().with_cause(cause))
    }

    fn not_found(self) -> Result<T> {
        self.map_err(Error::into_not_found)
    }
}
