//! Generate command implementation
//!
//! Resolves the run options, renders every (preset, format) pair through the
//! OpenSCAD backend and writes a summary report next to the outputs.

use anyhow::{Context, Result};
use colored::Colorize;
use scadgen_backend_openscad::{ExecutorConfig, OpenScad, ShellExecutor};
use scadgen_spec::GenerationOptions;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use crate::config::{resolve_options, CliOverrides};
use crate::pipeline::{Pipeline, RunResult};
use crate::report::GenerationReport;

/// Run the generate command
///
/// # Arguments
/// * `file` - Model source
/// * `config` - Explicit config document, auto-detected when `None`
/// * `overrides` - Values given on the command line
///
/// # Returns
/// Exit code: 0 success, 1 if any task failed
pub fn run(file: &Path, config: Option<&Path>, overrides: &CliOverrides) -> Result<ExitCode> {
    let options = resolve_options(file, config, overrides)?;

    println!("{}", "======================================".cyan());
    println!("{}", "  scadgen Batch Generator".cyan());
    println!("{}", "======================================".cyan());
    println!();
    println!("{} {}", "Model:".blue().bold(), options.file_name.display());
    println!(
        "{} {}",
        "Output directory:".blue().bold(),
        options.output_dir.display()
    );
    println!(
        "{} {}",
        "Formats:".blue().bold(),
        options.requested_formats().join(", ")
    );
    if let Some(preset) = options.preset_filter() {
        println!("{} {}", "Parameter set:".blue().bold(), preset);
    }
    println!("{} {}", "Parallel jobs:".blue().bold(), options.parallel_jobs);
    println!();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;
    let run = rt.block_on(run_pipeline(options.clone()))?;

    print_summary(&run);

    let report = GenerationReport::from_run(&options.file_name, &options.output_dir, &run);
    let report_path = report.write(&options.output_dir)?;
    println!(
        "{} {}",
        "Outputs saved to:".blue().bold(),
        options.output_dir.display()
    );
    println!("{} {}", "Summary report:".blue().bold(), report_path.display());

    if run.has_failures() {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

async fn run_pipeline(options: GenerationOptions) -> Result<RunResult> {
    let executor = Arc::new(ShellExecutor::with_config(
        ExecutorConfig::default().debug(options.open_scad_options.debug),
    ));
    let renderer = Arc::new(OpenScad::new(
        options.file_name.clone(),
        options.output_dir.clone(),
        executor.clone(),
    ));
    let pipeline = Pipeline::new(options, renderer, executor);
    pipeline
        .run()
        .await
        .with_context(|| format!("Failed to run {}", pipeline.options().file_name.display()))
}

fn print_summary(run: &RunResult) {
    println!();
    println!("{}", "======================================".cyan());
    println!("{}", "  Generation Summary".cyan());
    println!("{}", "======================================".cyan());
    println!();
    println!(
        "{} {}",
        "Total tasks processed:".blue().bold(),
        run.total_tasks()
    );
    println!("{} {}", "Successful:".green().bold(), run.outputs.len());
    println!("{} {}", "Failed:".red().bold(), run.failures.len());
    println!(
        "{} {:.2}s",
        "Total runtime:".blue().bold(),
        run.elapsed.as_secs_f64()
    );
    println!();

    if !run.outputs.is_empty() {
        println!("{}", "Generated files:".green().bold());
        for done in &run.outputs {
            println!(
                "  {}/{}: {} {}",
                done.preset,
                done.format,
                done.summary.file.display(),
                format!("({:.2}s)", done.duration.as_secs_f64()).dimmed()
            );
        }
        println!();
    }

    if !run.failures.is_empty() {
        println!("{}", "Failed tasks:".red().bold());
        for failure in &run.failures {
            println!("  - {}/{}: {}", failure.preset, failure.format, failure.error);
        }
        println!();
    }

    if let Some(mosaic) = &run.mosaic {
        println!("{} {}", "Mosaic:".blue().bold(), mosaic.display());
    }
    if let Some(slideshow) = &run.slideshow {
        println!("{} {}", "Slideshow:".blue().bold(), slideshow.display());
    }
}
