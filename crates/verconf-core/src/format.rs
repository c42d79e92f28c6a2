//! Input formats and the expression-language evaluator
//!
//! A config file is either YAML or Jsonnet, chosen by extension. Jsonnet is
//! compiled to JSON by an [`Evaluator`] before decoding.

use std::ffi::OsString;
use std::fmt;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{Error, Result};

/// Format of a config document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Structured YAML text with a top-level `version` field
    Yaml,
    /// Jsonnet source evaluating to a single latest-version document
    Jsonnet,
}

impl Format {
    /// Pick the format from a path extension
    ///
    /// Only `.jsonnet` selects Jsonnet; anything else is read as YAML.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some("jsonnet") => Format::Jsonnet,
            _ => Format::Yaml,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Yaml => f.write_str("yaml"),
            Format::Jsonnet => f.write_str("jsonnet"),
        }
    }
}

/// Raw bytes of a config document plus its format hint
///
/// The label names the document in error messages, usually its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    label: String,
    format: Format,
    bytes: Vec<u8>,
}

impl RawDocument {
    pub fn new(label: impl Into<String>, format: Format, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            label: label.into(),
            format,
            bytes: bytes.into(),
        }
    }

    /// Create a document whose format is derived from `path`
    pub fn from_path_hint(path: impl AsRef<Path>, bytes: impl Into<Vec<u8>>) -> Self {
        let path = path.as_ref();
        Self::new(path.display().to_string(), Format::from_path(path), bytes)
    }

    /// Read a document from disk
    ///
    /// A missing file yields an error for which [`Error::is_not_found`] holds.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| Error::file_read(path.display(), e))?;
        Ok(Self::from_path_hint(path, bytes))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Failure reported by an [`Evaluator`]
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Failed(String),
    #[error("evaluator output is not valid UTF-8")]
    InvalidOutput,
}

/// Compiles expression-language source into JSON text
pub trait Evaluator: Send + Sync {
    /// Evaluate `source`, using `label` to name it in diagnostics
    fn evaluate(&self, label: &str, source: &str) -> std::result::Result<String, EvalError>;
}

/// A simple function-based evaluator
pub struct FnEvaluator<F>
where
    F: Fn(&str, &str) -> std::result::Result<String, EvalError> + Send + Sync,
{
    func: F,
}

impl<F> FnEvaluator<F>
where
    F: Fn(&str, &str) -> std::result::Result<String, EvalError> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Evaluator for FnEvaluator<F>
where
    F: Fn(&str, &str) -> std::result::Result<String, EvalError> + Send + Sync,
{
    fn evaluate(&self, label: &str, source: &str) -> std::result::Result<String, EvalError> {
        (self.func)(label, source)
    }
}

/// Evaluator backed by an external `jsonnet` binary
///
/// The source is fed on stdin and the JSON result is read from stdout.
/// Imports resolve against the directory of the evaluated document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonnetCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl JsonnetCommand {
    /// Environment variable overriding the `jsonnet` binary
    pub const ENV_VAR: &'static str = "VERCONF_JSONNET";

    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Use the binary named by `VERCONF_JSONNET`, or `jsonnet` from `PATH`
    pub fn from_env() -> Self {
        Self::from_var(std::env::var_os(Self::ENV_VAR))
    }

    fn from_var(value: Option<OsString>) -> Self {
        match value {
            Some(program) if !program.is_empty() => Self::new(program),
            _ => Self::new("jsonnet"),
        }
    }

    /// Add leading arguments passed before the evaluator's own
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, label: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = Path::new(label).parent() {
            if !dir.as_os_str().is_empty() {
                cmd.arg("-J").arg(dir);
            }
        }
        cmd.arg("-");
        cmd
    }
}

impl Default for JsonnetCommand {
    fn default() -> Self {
        Self::from_env()
    }
}

impl Evaluator for JsonnetCommand {
    fn evaluate(&self, label: &str, source: &str) -> std::result::Result<String, EvalError> {
        let program = self.program.display().to_string();
        log::trace!("Evaluating {} with {}", label, program);

        let spawn_error = |source| EvalError::Spawn {
            program: program.clone(),
            source,
        };
        let mut child = self
            .command(label)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        if let Some(mut stdin) = child.stdin.take() {
            // The evaluator may exit before reading all of its input; its
            // status and stderr below report why.
            match stdin.write_all(source.as_bytes()) {
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    log::debug!("{} closed its input early", program);
                }
                result => result.map_err(spawn_error)?,
            }
        }
        let output = child.wait_with_output().map_err(spawn_error)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EvalError::Failed(stderr.trim().replace("<stdin>", label)));
        }
        String::from_utf8(output.stdout).map_err(|_| EvalError::InvalidOutput)
    }
}
