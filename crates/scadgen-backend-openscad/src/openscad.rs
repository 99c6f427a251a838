//! OpenSCAD command-line renderer.
//!
//! Each operation builds one `openscad` command line, runs it through the
//! shared [`CommandExecutor`] and reads back the engine's JSON summary file.

use async_trait::async_trait;
use scadgen_spec::{
    FormatKind, ImageOptions, InlineParameterSet, OutputFormat, OutputSummary, ParameterFileSet,
    RenderOptions, RenderSummary,
};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{RenderError, RenderResult};
use crate::executor::CommandExecutor;
use crate::renderer::{
    artifact_path, frame_pattern, frame_suffix, model_path, thumbnail_path, Renderer,
};
use crate::shell;

/// Environment variable overriding the engine location.
pub const OPENSCAD_PATH_ENV: &str = "OPENSCAD_PATH";

/// Renderer backed by the OpenSCAD CLI.
pub struct OpenScad {
    source: PathBuf,
    output_dir: PathBuf,
    executor: Arc<dyn CommandExecutor>,
    executable: Option<PathBuf>,
}

impl OpenScad {
    /// Creates a renderer for one model source.
    pub fn new(
        source: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self {
            source: source.into(),
            output_dir: output_dir.into(),
            executor,
            executable: None,
        }
    }

    /// Uses `path` as the engine executable without looking it up.
    pub fn executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Finds the engine executable.
    fn find_executable(&self, options: &RenderOptions) -> RenderResult<PathBuf> {
        if let Some(ref path) = self.executable {
            return Ok(path.clone());
        }

        let configured = PathBuf::from(&options.open_scad_executable);
        if configured.components().count() > 1 && configured.exists() {
            return Ok(configured);
        }

        if let Ok(path) = which::which(&options.open_scad_executable) {
            return Ok(path);
        }

        if let Ok(path) = std::env::var(OPENSCAD_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(path);
            }
        }

        let common_paths: &[&str] = if cfg!(windows) {
            &[
                "C:\\Program Files\\OpenSCAD\\openscad.exe",
                "C:\\Program Files (x86)\\OpenSCAD\\openscad.exe",
            ]
        } else if cfg!(target_os = "macos") {
            &["/Applications/OpenSCAD.app/Contents/MacOS/OpenSCAD"]
        } else {
            &[
                "/usr/bin/openscad",
                "/usr/local/bin/openscad",
                "/snap/bin/openscad",
            ]
        };

        common_paths
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
            .ok_or_else(|| RenderError::ExecutableNotFound {
                name: options.open_scad_executable.clone(),
            })
    }

    /// Engine path followed by the options shared by every operation.
    fn base_args(&self, options: &RenderOptions) -> RenderResult<Vec<String>> {
        let executable = self.find_executable(options)?;
        let mut args = vec![
            executable.display().to_string(),
            format!("--backend={}", options.backend.as_str()),
        ];
        args.extend(
            options
                .enabled_features()
                .map(|f| format!("--enable={}", f.replace('_', "-"))),
        );
        if options.check_parameters {
            args.push("--check-parameters=true".to_string());
        }
        if options.check_parameter_ranges {
            args.push("--check-parameter-ranges=true".to_string());
        }
        if options.hardwarnings {
            args.push("--hardwarnings".to_string());
        }
        if options.quiet {
            args.push("--quiet".to_string());
        }
        if options.trust_python {
            args.push("--trust-python".to_string());
        }
        if let Some(module) = &options.python_module {
            args.push(format!("--python-module={}", module));
        }
        Ok(args)
    }

    /// Runs the command and collects the summary file next to `output`.
    async fn render(
        &self,
        mut args: Vec<String>,
        output: &Path,
        options: &RenderOptions,
    ) -> RenderResult<(String, RenderSummary)> {
        let summary_path = summary_path(output);
        args.push("-o".to_string());
        args.push(output.display().to_string());
        args.push("--summary=all".to_string());
        args.push(format!("--summary-file={}", summary_path.display()));
        args.push(self.source.display().to_string());

        let log = self.executor.execute(&shell::join(&args)).await?;
        let summary = read_summary(&summary_path, !options.debug)?;
        Ok((log, summary))
    }

    fn finish(&self, file: PathBuf, log: String, summary: RenderSummary) -> OutputSummary {
        let mut out = OutputSummary::new(file, &self.source);
        out.append_output(&log);
        out.summary = summary;
        out
    }

    async fn render_image(
        &self,
        params: &ParameterFileSet,
        options: &RenderOptions,
        output: PathBuf,
    ) -> RenderResult<OutputSummary> {
        let mut args = self.base_args(options)?;
        push_parameter_file(&mut args, &params.parameter_file, &params.parameter_name);
        push_image_args(&mut args, &options.image_options);

        let (log, summary) = self.render(args, &output, options).await?;
        Ok(self.finish(output, log, summary))
    }
}

#[async_trait]
impl Renderer for OpenScad {
    async fn generate_image(
        &self,
        params: &ParameterFileSet,
        options: &RenderOptions,
    ) -> RenderResult<OutputSummary> {
        let output = artifact_path(
            &self.output_dir,
            &self.source,
            &params.parameter_name,
            "",
            "png",
        );
        self.render_image(params, options, output).await
    }

    async fn generate_thumbnail(
        &self,
        params: &ParameterFileSet,
        options: &RenderOptions,
    ) -> RenderResult<OutputSummary> {
        let output = thumbnail_path(&self.output_dir, &self.source, &params.parameter_name);
        self.render_image(params, options, output).await
    }

    async fn generate_2d(
        &self,
        params: &ParameterFileSet,
        format: OutputFormat,
        options: &RenderOptions,
    ) -> RenderResult<OutputSummary> {
        if format.kind() != FormatKind::Document2d {
            return Err(RenderError::UnsupportedFormat {
                format: format.to_string(),
                operation: "2D export",
            });
        }
        let output = model_path(&self.output_dir, &self.source, &params.parameter_name, format);

        let mut args = self.base_args(options)?;
        push_parameter_file(&mut args, &params.parameter_file, &params.parameter_name);
        args.push(format!("--export-format={}", format.as_str()));
        match format {
            OutputFormat::Pdf => push_export_options(&mut args, "export-pdf", &options.option_pdf)?,
            OutputFormat::Svg => push_export_options(&mut args, "export-svg", &options.option_svg)?,
            _ => {}
        }

        let (log, summary) = self.render(args, &output, options).await?;
        Ok(self.finish(output, log, summary))
    }

    async fn generate_animation_frames(
        &self,
        params: &InlineParameterSet,
        tag: &str,
        options: &RenderOptions,
    ) -> RenderResult<OutputSummary> {
        if params.parameter_set.preset(&params.parameter_name).is_none() {
            return Err(RenderError::PresetNotFound {
                name: params.parameter_name.clone(),
            });
        }

        let json = params
            .parameter_set
            .to_json_pretty()
            .map_err(|source| RenderError::Serialize {
                what: "parameter set",
                source,
            })?;
        let mut file = tempfile::Builder::new()
            .prefix("scadgen_params_")
            .suffix(".json")
            .tempfile()
            .map_err(RenderError::WriteParameters)?;
        file.write_all(json.as_bytes())
            .map_err(RenderError::WriteParameters)?;
        file.flush().map_err(RenderError::WriteParameters)?;

        let output = artifact_path(
            &self.output_dir,
            &self.source,
            &params.parameter_name,
            &frame_suffix(tag),
            "png",
        );
        let anim = &options.anim_options;

        let mut args = self.base_args(options)?;
        push_parameter_file(&mut args, file.path(), &params.parameter_name);
        push_image_args(&mut args, &anim.image);
        args.push(format!("--animate={}", anim.animate));
        if let Some(sharding) = &anim.animate_sharding {
            args.push(format!("--animate_sharding={}", sharding));
        }

        let (log, summary) = self.render(args, &output, options).await?;
        drop(file);

        let pattern = frame_pattern(&self.output_dir, &self.source, &params.parameter_name, tag);
        Ok(self.finish(pattern, log, summary))
    }

    async fn generate_model(
        &self,
        params: &ParameterFileSet,
        format: OutputFormat,
        options: &RenderOptions,
    ) -> RenderResult<OutputSummary> {
        if !matches!(format.kind(), FormatKind::Model | FormatKind::Package3d) {
            return Err(RenderError::UnsupportedFormat {
                format: format.to_string(),
                operation: "model export",
            });
        }
        let output = model_path(&self.output_dir, &self.source, &params.parameter_name, format);

        let mut args = self.base_args(options)?;
        push_parameter_file(&mut args, &params.parameter_file, &params.parameter_name);
        args.push(format!("--export-format={}", format.as_str()));
        if format == OutputFormat::ThreeMf {
            push_export_options(&mut args, "export-3mf", &options.option_3mf)?;
        }

        let (log, summary) = self.render(args, &output, options).await?;
        Ok(self.finish(output, log, summary))
    }
}

fn push_parameter_file(args: &mut Vec<String>, file: &Path, preset: &str) {
    args.push("-p".to_string());
    args.push(file.display().to_string());
    args.push("-P".to_string());
    args.push(preset.to_string());
}

fn push_image_args(args: &mut Vec<String>, image: &ImageOptions) {
    args.push(format!(
        "--imgsize={},{}",
        image.imgsize.width, image.imgsize.height
    ));
    if !image.colorscheme.is_empty() {
        args.push(format!("--colorscheme={}", image.colorscheme));
    }
    if image.autocenter {
        args.push("--autocenter".to_string());
    }
    if image.viewall {
        args.push("--viewall".to_string());
    }
    if image.render {
        args.push("--render".to_string());
    }
    let valued = [
        ("camera", &image.camera),
        ("projection", &image.projection),
        ("preview", &image.preview),
        ("view", &image.view),
    ];
    for (name, value) in valued {
        if let Some(value) = value {
            args.push(format!("--{}={}", name, value));
        }
    }
    if let Some(limit) = image.csglimit {
        args.push(format!("--csglimit={}", limit));
    }
}

/// Appends `-O <section>/<key>=<value>` for every non-empty field of `options`.
/// Field names are converted to the engine's kebab-case keys.
fn push_export_options<T: Serialize>(
    args: &mut Vec<String>,
    section: &str,
    options: &T,
) -> RenderResult<()> {
    let value = serde_json::to_value(options).map_err(|source| RenderError::Serialize {
        what: "export options",
        source,
    })?;
    let Value::Object(fields) = value else {
        return Ok(());
    };

    for (key, value) in fields {
        let value = match value {
            Value::String(s) if s.is_empty() => continue,
            Value::String(s) => s,
            Value::Null => continue,
            other => other.to_string(),
        };
        args.push("-O".to_string());
        args.push(format!("{}/{}={}", section, key.replace('_', "-"), value));
    }
    Ok(())
}

/// Summary file of one output: `gen/a_p1.png` uses `gen/a_p1.png.summary.json`.
fn summary_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".summary.json");
    PathBuf::from(name)
}

/// Reads the engine's summary. A missing file yields an empty summary.
fn read_summary(path: &Path, remove: bool) -> RenderResult<RenderSummary> {
    if !path.exists() {
        return Ok(RenderSummary::default());
    }
    let content = std::fs::read_to_string(path).map_err(|source| RenderError::ReadSummary {
        path: path.to_path_buf(),
        source,
    })?;
    let summary = serde_json::from_str(&content).map_err(|source| RenderError::ParseSummary {
        path: path.to_path_buf(),
        source,
    })?;
    if remove {
        let _ = std::fs::remove_file(path);
    }
    Ok(summary)
}
