//! Run report written as `generation_summary.json` in the output directory.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use scadgen_spec::CodedError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::pipeline::RunResult;

/// File name of the report.
pub const REPORT_FILE_NAME: &str = "generation_summary.json";

/// Result of one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Parameter set name
    pub preset: String,
    /// Requested format
    pub format: String,
    /// Whether the task succeeded
    pub success: bool,
    /// Produced artifact
    pub file: Option<PathBuf>,
    /// Error message if failed
    pub error: Option<String>,
    /// Stable error code if failed
    pub error_code: Option<String>,
    /// Task time in milliseconds
    pub duration_ms: u64,
}

/// Summary report for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    /// Timestamp of generation
    pub timestamp: String,
    /// Model source
    pub source: PathBuf,
    /// Output directory
    pub output_dir: PathBuf,
    /// Total tasks run
    pub total_tasks: usize,
    /// Successful tasks
    pub successful: usize,
    /// Failed tasks
    pub failed: usize,
    /// Total runtime in seconds
    pub runtime_seconds: f64,
    /// Mosaic file, if one was composed
    pub mosaic: Option<PathBuf>,
    /// Slideshow file, if one was composed
    pub slideshow: Option<PathBuf>,
    /// Results for each task, successes first
    pub tasks: Vec<TaskRecord>,
}

impl GenerationReport {
    pub fn from_run(source: &Path, output_dir: &Path, run: &RunResult) -> Self {
        let succeeded = run.outputs.iter().map(|done| TaskRecord {
            preset: done.preset.clone(),
            format: done.format.clone(),
            success: true,
            file: Some(done.summary.file.clone()),
            error: None,
            error_code: None,
            duration_ms: done.duration.as_millis() as u64,
        });
        let failed = run.failures.iter().map(|failure| TaskRecord {
            preset: failure.preset.clone(),
            format: failure.format.clone(),
            success: false,
            file: None,
            error: Some(failure.error.to_string()),
            error_code: Some(failure.error.code().to_string()),
            duration_ms: failure.duration.as_millis() as u64,
        });

        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            source: source.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            total_tasks: run.total_tasks(),
            successful: run.outputs.len(),
            failed: run.failures.len(),
            runtime_seconds: run.elapsed.as_secs_f64(),
            mosaic: run.mosaic.clone(),
            slideshow: run.slideshow.clone(),
            tasks: succeeded.chain(failed).collect(),
        }
    }

    /// Writes the report into `dir` and returns its path.
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(REPORT_FILE_NAME);
        let json = serde_json::to_string_pretty(self).context("Failed to serialize summary")?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write summary: {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{CompletedTask, DispatchError, TaskFailure};
    use pretty_assertions::assert_eq;
    use scadgen_spec::OutputSummary;
    use std::time::Duration;
    use tempfile::TempDir;

    fn run() -> RunResult {
        RunResult {
            outputs: vec![CompletedTask {
                preset: "small".into(),
                format: "png".into(),
                summary: OutputSummary::new("gen/w_small.png", "w.scad"),
                duration: Duration::from_millis(120),
            }],
            failures: vec![TaskFailure {
                preset: "small".into(),
                format: "foo".into(),
                error: DispatchError::UnknownFormat {
                    format: "foo".into(),
                    preset: "small".into(),
                },
                duration: Duration::from_millis(1),
            }],
            mosaic: None,
            slideshow: None,
            elapsed: Duration::from_millis(1500),
        }
    }

    #[test]
    fn test_report_counts_and_records() {
        let report = GenerationReport::from_run(Path::new("w.scad"), Path::new("gen"), &run());
        assert_eq!(report.total_tasks, 2);
        assert_eq!(report.successful, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.runtime_seconds, 1.5);
        assert!(report.timestamp.ends_with('Z'));

        assert_eq!(report.tasks[0].file, Some(PathBuf::from("gen/w_small.png")));
        assert_eq!(report.tasks[0].duration_ms, 120);
        let failure = &report.tasks[1];
        assert!(!failure.success);
        assert_eq!(failure.error_code.as_deref(), Some("DISPATCH_001"));
        assert!(failure.error.as_deref().unwrap_or_default().contains("foo"));
    }

    #[test]
    fn test_report_written_to_output_dir() {
        let dir = TempDir::new().unwrap();
        let report = GenerationReport::from_run(Path::new("w.scad"), dir.path(), &run());
        let path = report.write(dir.path()).unwrap();
        assert_eq!(path, dir.path().join("generation_summary.json"));

        let parsed: GenerationReport =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.tasks, report.tasks);
    }
}
