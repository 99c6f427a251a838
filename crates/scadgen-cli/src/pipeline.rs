//! Generation pipeline.
//!
//! Expands (preset x format) into tasks, runs them with at most
//! `parallelJobs` in flight and settles all of them before aggregating.

use colored::Colorize;
use futures_util::future::join_all;
use scadgen_backend_openscad::{CommandExecutor, Renderer};
use scadgen_spec::{GenerationOptions, ParameterFileSet, ParameterSet, SpecError};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::dispatch::{
    dispatch_task, CompletedTask, DispatchContext, GenerationTask, TaskFailure, TaskOutcome,
};
use crate::postprocess::{generate_mosaic, generate_slideshow, mosaic_path, slideshow_path};

/// Errors that abort a run before any task is scheduled.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error("Failed to create output directory {path}: {source}")]
    CreateOutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything a run produced.
#[derive(Debug)]
pub struct RunResult {
    pub outputs: Vec<CompletedTask>,
    pub failures: Vec<TaskFailure>,
    pub mosaic: Option<PathBuf>,
    pub slideshow: Option<PathBuf>,
    pub elapsed: Duration,
}

impl RunResult {
    pub fn total_tasks(&self) -> usize {
        self.outputs.len() + self.failures.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// One run over a model source.
pub struct Pipeline {
    options: GenerationOptions,
    context: DispatchContext,
}

impl Pipeline {
    pub fn new(
        options: GenerationOptions,
        renderer: Arc<dyn Renderer>,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        let context = DispatchContext::new(&options, renderer, executor);
        Self { options, context }
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    /// Builds the task list: presets in document order, then formats in
    /// request order.
    pub fn plan(&self) -> Result<Vec<GenerationTask>, PipelineError> {
        let document_path = ParameterSet::path_for_source(&self.options.file_name);
        let document = ParameterSet::load(&document_path)?;
        let presets = document.select_presets(self.options.preset_filter());
        if presets.is_empty() {
            return Err(SpecError::PresetNotFound {
                name: self.options.preset_filter().unwrap_or("*").to_string(),
                path: document_path,
            }
            .into());
        }

        let formats = self.options.requested_formats();
        let tasks = presets
            .iter()
            .flat_map(|preset| {
                formats.iter().map(|format| {
                    GenerationTask::new(
                        format.clone(),
                        ParameterFileSet::new(&document_path, &preset.name),
                        self.options.open_scad_options.clone(),
                    )
                    .with_values(preset.values.clone())
                })
            })
            .collect();
        Ok(tasks)
    }

    /// Runs every task and the requested compositions.
    ///
    /// Only setup errors are returned; task failures are collected in the
    /// result.
    pub async fn run(&self) -> Result<RunResult, PipelineError> {
        let start = Instant::now();
        self.options.validate()?;

        let output_dir = self.options.output_dir();
        std::fs::create_dir_all(output_dir).map_err(|source| PipelineError::CreateOutputDir {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let tasks = self.plan()?;
        println!(
            "{} {} tasks, {} in parallel",
            "Scheduling".cyan(),
            tasks.len(),
            self.options.parallel_jobs
        );

        let semaphore = Semaphore::new(self.options.parallel_jobs.min(Semaphore::MAX_PERMITS));
        let context = &self.context;
        let outcomes = join_all(tasks.into_iter().map(|task| {
            let semaphore = &semaphore;
            async move {
                // The semaphore is never closed.
                let _permit = semaphore.acquire().await.ok();
                dispatch_task(context, task).await
            }
        }))
        .await;

        let mut outputs = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                TaskOutcome::Completed(done) => outputs.push(done),
                TaskOutcome::Failed(failure) => failures.push(failure),
            }
        }

        let images = still_images(&outputs);
        let mosaic = if self.options.generate_mosaic {
            self.compose_mosaic(&images).await
        } else {
            None
        };
        let slideshow = if self.options.generate_slide_show.is_some() {
            self.compose_slideshow(&images).await
        } else {
            None
        };

        Ok(RunResult {
            outputs,
            failures,
            mosaic,
            slideshow,
            elapsed: start.elapsed(),
        })
    }

    async fn compose_mosaic(&self, images: &[PathBuf]) -> Option<PathBuf> {
        if images.is_empty() {
            eprintln!("{} no still images for the mosaic, skipping", "warning:".yellow());
            return None;
        }
        let output = mosaic_path(self.options.output_dir(), &self.options.base_file_name());
        match generate_mosaic(
            self.context.executor.as_ref(),
            images,
            &self.options.mosaic_options,
            output,
            self.options.open_scad_options.debug,
        )
        .await
        {
            Ok(path) => Some(path),
            Err(e) => {
                eprintln!("{} mosaic generation failed: {}", "error:".red(), e);
                None
            }
        }
    }

    async fn compose_slideshow(&self, images: &[PathBuf]) -> Option<PathBuf> {
        let format = self.options.generate_slide_show?;
        if images.is_empty() {
            eprintln!("{} no still images for the slideshow, skipping", "warning:".yellow());
            return None;
        }
        let output = slideshow_path(
            self.options.output_dir(),
            &self.options.base_file_name(),
            format,
        );
        match generate_slideshow(
            self.context.executor.as_ref(),
            images,
            format,
            self.options.slide_show_interval,
            output,
            self.options.open_scad_options.debug,
        )
        .await
        {
            Ok(path) => Some(path),
            Err(e) => {
                eprintln!("{} slideshow generation failed: {}", "error:".red(), e);
                None
            }
        }
    }
}

/// Files of the outputs that are still images.
pub fn still_images(outputs: &[CompletedTask]) -> Vec<PathBuf> {
    outputs
        .iter()
        .filter(|o| o.summary.is_still_image())
        .map(|o| o.summary.file.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scadgen_spec::OutputSummary;

    fn completed(file: &str) -> CompletedTask {
        CompletedTask {
            preset: "p".to_string(),
            format: "x".to_string(),
            summary: OutputSummary::new(file, "w.scad"),
            duration: Duration::ZERO,
        }
    }

    #[test]
    fn test_still_images_filters_png() {
        let outputs = vec![
            completed("gen/w_a.png"),
            completed("gen/w_a.webp"),
            completed("gen/w_a.3mf"),
            completed("gen/w_b.PNG"),
            completed("gen/w_a.pdf"),
            completed("gen/w_a_ascii.stl"),
        ];
        assert_eq!(
            still_images(&outputs),
            vec![PathBuf::from("gen/w_a.png"), PathBuf::from("gen/w_b.PNG")]
        );
    }
}
