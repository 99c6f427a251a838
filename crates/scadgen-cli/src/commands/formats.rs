//! Formats command implementation
//!
//! Lists the output formats the dispatcher knows and how each is produced.

use anyhow::{Context, Result};
use colored::Colorize;
use scadgen_spec::{FormatKind, OutputFormat, DEFAULT_FORMATS};
use serde::Serialize;
use std::process::ExitCode;

/// One row of the listing
#[derive(Debug, Clone, Serialize)]
pub struct FormatInfo {
    pub name: &'static str,
    pub extension: &'static str,
    pub kind: FormatKind,
    pub default: bool,
}

/// Every known format in listing order.
pub fn format_infos() -> Vec<FormatInfo> {
    OutputFormat::ALL
        .iter()
        .map(|format| FormatInfo {
            name: format.as_str(),
            extension: format.extension(),
            kind: format.kind(),
            default: DEFAULT_FORMATS.contains(format),
        })
        .collect()
}

fn describe(kind: FormatKind) -> &'static str {
    match kind {
        FormatKind::StillImage => "still image",
        FormatKind::Document2d => "2D document",
        FormatKind::AnimationWebp => "animated WEBP (rotation)",
        FormatKind::AnimationGif => "animated GIF (rotation)",
        FormatKind::Package3d => "3MF package with metadata",
        FormatKind::Model => "3D model export",
    }
}

/// Run the formats command
///
/// # Returns
/// Exit code: 0 success
pub fn run(json: bool) -> Result<ExitCode> {
    let infos = format_infos();

    if json {
        let out = serde_json::to_string_pretty(&infos).context("Failed to serialize formats")?;
        println!("{}", out);
        return Ok(ExitCode::SUCCESS);
    }

    println!("{}", "Supported output formats:".blue().bold());
    for info in &infos {
        let marker = if info.default {
            " (default)".dimmed().to_string()
        } else {
            String::new()
        };
        println!(
            "  {:<9} {}{}",
            info.name.green(),
            describe(info.kind),
            marker
        );
    }
    Ok(ExitCode::SUCCESS)
}
