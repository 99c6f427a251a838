//! Error types for command execution and rendering.

use scadgen_spec::CodedError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for command execution.
pub type ExecResult<T> = Result<T, ExecError>;

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors raised by a [`crate::CommandExecutor`].
#[derive(Debug, Error)]
pub enum ExecError {
    /// The shell could not be started.
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading the command's output or waiting for it failed.
    #[error("I/O error while running `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command exited with a non-zero status.
    #[error("Command `{command}` exited with status {exit_code}: {output}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        output: String,
    },

    /// The command wrote more than the capture limit.
    #[error("Output of `{command}` exceeded {limit} bytes")]
    OutputTooLarge { command: String, limit: usize },

    /// The command ran longer than the configured timeout.
    #[error("Command `{command}` timed out after {timeout_secs} seconds")]
    Timeout { command: String, timeout_secs: u64 },
}

impl ExecError {
    /// The command line that failed.
    pub fn command(&self) -> &str {
        match self {
            ExecError::Spawn { command, .. }
            | ExecError::Io { command, .. }
            | ExecError::CommandFailed { command, .. }
            | ExecError::OutputTooLarge { command, .. }
            | ExecError::Timeout { command, .. } => command,
        }
    }
}

impl CodedError for ExecError {
    fn code(&self) -> &'static str {
        match self {
            ExecError::Spawn { .. } => "EXEC_001",
            ExecError::Io { .. } => "EXEC_002",
            ExecError::CommandFailed { .. } => "EXEC_003",
            ExecError::OutputTooLarge { .. } => "EXEC_004",
            ExecError::Timeout { .. } => "EXEC_005",
        }
    }

    fn category(&self) -> &'static str {
        "exec"
    }
}

/// Errors raised while rendering an artifact.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The engine executable could not be located.
    #[error("OpenSCAD executable '{name}' not found. Install OpenSCAD and add it to PATH, or set OPENSCAD_PATH")]
    ExecutableNotFound { name: String },

    /// The engine command failed.
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// An in-memory parameter set names a preset it does not contain.
    #[error("Parameter set '{name}' is not part of the inline parameter document")]
    PresetNotFound { name: String },

    /// Parameters or export options could not be serialized.
    #[error("Failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The temporary parameter file could not be written.
    #[error("Failed to write parameter file: {0}")]
    WriteParameters(#[source] std::io::Error),

    /// The engine's summary file exists but could not be read.
    #[error("Failed to read render summary from {path}: {source}")]
    ReadSummary {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The engine's summary file is malformed.
    #[error("Failed to parse render summary {path}: {source}")]
    ParseSummary {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The requested format cannot be produced by this operation.
    #[error("Format '{format}' is not supported by {operation}")]
    UnsupportedFormat {
        format: String,
        operation: &'static str,
    },
}

impl CodedError for RenderError {
    fn code(&self) -> &'static str {
        match self {
            RenderError::ExecutableNotFound { .. } => "RENDER_001",
            RenderError::Exec(inner) => inner.code(),
            RenderError::PresetNotFound { .. } => "RENDER_002",
            RenderError::Serialize { .. } => "RENDER_003",
            RenderError::WriteParameters(_) => "RENDER_004",
            RenderError::ReadSummary { .. } => "RENDER_005",
            RenderError::ParseSummary { .. } => "RENDER_006",
            RenderError::UnsupportedFormat { .. } => "RENDER_007",
        }
    }

    fn category(&self) -> &'static str {
        match self {
            RenderError::Exec(_) => "exec",
            _ => "render",
        }
    }
}
