//! Error types for options, parameter sets and output formats.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for spec-level operations.
pub type SpecResult<T> = Result<T, SpecError>;

/// Errors raised while loading or validating run inputs.
///
/// All of these are setup-phase errors: they abort a run before any task is
/// scheduled.
#[derive(Debug, Error)]
pub enum SpecError {
    /// A parameter set or configuration document does not exist.
    #[error("File not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// A document exists but could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A document is malformed.
    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// The preset filter matched nothing in the parameter set document.
    #[error("Parameter set '{name}' not found in {path}")]
    PresetNotFound { name: String, path: PathBuf },

    /// Generation options violate an invariant.
    #[error("Invalid generation options: {message}")]
    InvalidOptions { message: String },

    /// A requested output format is not known.
    #[error("Unknown output format '{format}'")]
    UnknownFormat { format: String },
}

impl SpecError {
    /// Creates a new parse error.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new invalid options error.
    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self::InvalidOptions {
            message: message.into(),
        }
    }
}

/// Common trait for errors surfaced in run reports.
///
/// Each crate's error type implements this so that a failure line in the
/// console and in `generation_summary.json` carries a stable code.
///
/// # Example
///
/// ```ignore
/// use scadgen_spec::CodedError;
///
/// fn report<E: CodedError>(err: &E) {
///     eprintln!("[{}] {}", err.code(), err.message());
/// }
/// ```
pub trait CodedError: std::error::Error {
    /// Stable code like "SPEC_001" or "EXEC_002".
    fn code(&self) -> &'static str;

    /// Human-readable message, by default the `Display` output.
    fn message(&self) -> String {
        self.to_string()
    }

    /// Category used to group related errors ("spec", "exec", "render", ...).
    fn category(&self) -> &'static str;
}

impl CodedError for SpecError {
    fn code(&self) -> &'static str {
        match self {
            SpecError::ConfigNotFound { .. } => "SPEC_001",
            SpecError::Read { .. } => "SPEC_002",
            SpecError::Parse { .. } => "SPEC_003",
            SpecError::PresetNotFound { .. } => "SPEC_004",
            SpecError::InvalidOptions { .. } => "SPEC_005",
            SpecError::UnknownFormat { .. } => "SPEC_006",
        }
    }

    fn category(&self) -> &'static str {
        "spec"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SpecError::ConfigNotFound {
            path: PathBuf::from("model.json"),
        };
        assert!(err.to_string().contains("model.json"));

        let err = SpecError::PresetNotFound {
            name: "big".to_string(),
            path: PathBuf::from("model.json"),
        };
        assert!(err.to_string().contains("'big'"));

        let err = SpecError::parse("model.json", "expected value at line 1");
        assert!(err.to_string().contains("expected value"));
    }

    #[test]
    fn test_error_codes_are_distinct() {
        let errors = [
            SpecError::ConfigNotFound {
                path: PathBuf::new(),
            },
            SpecError::parse("x", "y"),
            SpecError::invalid_options("parallelJobs"),
            SpecError::UnknownFormat {
                format: "foo".into(),
            },
        ];
        let codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        let mut deduped = codes.clone();
        deduped.dedup();
        assert_eq!(codes, deduped);
        assert!(errors.iter().all(|e| e.category() == "spec"));
    }
}
