//! Test harness: a model workspace on disk plus recording fakes for the
//! renderer and the command executor.

use async_trait::async_trait;
use scadgen_backend_openscad::{
    artifact_path, frame_pattern, frame_suffix, model_path, thumbnail_path, CommandExecutor,
    ExecError, ExecResult, RenderError, RenderResult, Renderer,
};
use scadgen_spec::{
    GenerationOptions, InlineParameterSet, OutputFormat, OutputSummary, ParameterFileSet,
    ParameterSet, ParameterValues, RenderOptions,
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Base name of the model used by every workspace.
pub const MODEL_BASE_NAME: &str = "widget";

/// Relationships document of a freshly exported package.
pub const MODEL_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Target="/3D/3dmodel.model" Id="rel0" Type="http://schemas.microsoft.com/3dmanufacturing/2013/01/3dmodel"/></Relationships>"#;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="model" ContentType="application/vnd.ms-package.3dmanufacturing-3dmodel+xml"/></Types>"#;

const MODEL_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<model unit="millimeter" xmlns="http://schemas.microsoft.com/3dmanufacturing/core/2015/02"><resources/><build/></model>"#;

/// Number of frames written per animation.
pub const FRAME_COUNT: usize = 3;

/// A model source and its parameter document in a temporary directory.
pub struct Workspace {
    dir: TempDir,
    source: PathBuf,
}

impl Workspace {
    /// Creates `widget.scad` and `widget.json` with the given presets.
    pub fn new(presets: &[(&str, &[(&str, &str)])]) -> Self {
        let dir = TempDir::new().expect("Failed to create work dir");
        let source = dir.path().join(format!("{}.scad", MODEL_BASE_NAME));
        fs::write(&source, "cube(size);\n").expect("Failed to write model source");

        let document = presets
            .iter()
            .fold(ParameterSet::new(), |doc, (name, values)| {
                doc.with_preset(*name, values.iter().map(|(k, v)| (*k, *v)))
            });
        let json = document.to_json_pretty().expect("Failed to serialize presets");
        fs::write(ParameterSet::path_for_source(&source), json)
            .expect("Failed to write parameter document");

        Self { dir, source }
    }

    /// Workspace with presets named `names`, each with a `size` value.
    pub fn with_presets(names: &[&str]) -> Self {
        let values: Vec<[(&str, &str); 1]> = names.iter().map(|_| [("size", "10")]).collect();
        let presets: Vec<(&str, &[(&str, &str)])> = names
            .iter()
            .zip(values.iter())
            .map(|(name, values)| (*name, values.as_slice()))
            .collect();
        Self::new(&presets)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn parameter_file(&self) -> PathBuf {
        ParameterSet::path_for_source(&self.source)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("gen")
    }

    /// Options for a run over this workspace with the given formats.
    pub fn options(&self, formats: &[&str]) -> GenerationOptions {
        let mut options = GenerationOptions::for_file(&self.source);
        options.output_dir = self.output_dir();
        options.out_formats = formats.iter().map(|f| f.to_string()).collect();
        options
    }

    /// Expected path of a still image or animation of `preset`.
    pub fn artifact(&self, preset: &str, ext: &str) -> PathBuf {
        artifact_path(&self.output_dir(), &self.source, preset, "", ext)
    }
}

/// Renderer operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Image,
    Thumbnail,
    TwoD,
    Frames,
    Model,
}

/// One call seen by [`FakeRenderer`].
#[derive(Debug, Clone)]
pub struct RenderCall {
    pub operation: Operation,
    pub preset: String,
    pub format: Option<OutputFormat>,
    pub options: RenderOptions,
    /// Preset values handed over inline (animation frames only).
    pub values: Option<ParameterValues>,
}

/// Renderer writing placeholder artifacts.
///
/// Every call sleeps for the configured delay so overlapping calls can be
/// observed through [`FakeRenderer::max_in_flight`].
pub struct FakeRenderer {
    source: PathBuf,
    output_dir: PathBuf,
    delay: Duration,
    failing_presets: Vec<String>,
    calls: Mutex<Vec<RenderCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeRenderer {
    pub fn new(workspace: &Workspace) -> Self {
        Self {
            source: workspace.source().to_path_buf(),
            output_dir: workspace.output_dir(),
            delay: Duration::from_millis(5),
            failing_presets: Vec::new(),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Time every call takes.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Makes every call for `preset` fail like an engine error would.
    pub fn failing_preset(mut self, preset: &str) -> Self {
        self.failing_presets.push(preset.to_string());
        self
    }

    /// Calls in the order they started.
    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }

    pub fn calls_for(&self, operation: Operation) -> Vec<RenderCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.operation == operation)
            .collect()
    }

    /// Highest number of calls that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(
        &self,
        operation: Operation,
        preset: &str,
        format: Option<OutputFormat>,
        options: &RenderOptions,
        values: Option<ParameterValues>,
    ) -> RenderResult<InFlight<'_>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);

        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push(RenderCall {
                operation,
                preset: preset.to_string(),
                format,
                options: options.clone(),
                values,
            });
        tokio::time::sleep(self.delay).await;

        if self.failing_presets.iter().any(|p| p == preset) {
            return Err(RenderError::Exec(ExecError::CommandFailed {
                command: format!("openscad -o {} {}", preset, self.source.display()),
                exit_code: 1,
                output: "ERROR: Parser error in file widget.scad, line 1".to_string(),
            }));
        }
        Ok(guard)
    }

    fn summary(&self, file: PathBuf) -> OutputSummary {
        OutputSummary::new(file, &self.source)
    }

    fn ensure_output_dir(&self) {
        fs::create_dir_all(&self.output_dir).expect("Failed to create output dir");
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn generate_image(
        &self,
        params: &ParameterFileSet,
        options: &RenderOptions,
    ) -> RenderResult<OutputSummary> {
        let preset = &params.parameter_name;
        let _guard = self.enter(Operation::Image, preset, None, options, None).await?;
        self.ensure_output_dir();
        let path = artifact_path(&self.output_dir, &self.source, preset, "", "png");
        fs::write(&path, b"\x89PNG\r\n\x1a\n").map_err(RenderError::WriteParameters)?;
        Ok(self.summary(path))
    }

    async fn generate_thumbnail(
        &self,
        params: &ParameterFileSet,
        options: &RenderOptions,
    ) -> RenderResult<OutputSummary> {
        let preset = &params.parameter_name;
        let _guard = self
            .enter(Operation::Thumbnail, preset, None, options, None)
            .await?;
        self.ensure_output_dir();
        let path = thumbnail_path(&self.output_dir, &self.source, preset);
        fs::write(&path, b"\x89PNG\r\n\x1a\nthumbnail")
            .map_err(RenderError::WriteParameters)?;
        Ok(self.summary(path))
    }

    async fn generate_2d(
        &self,
        params: &ParameterFileSet,
        format: OutputFormat,
        options: &RenderOptions,
    ) -> RenderResult<OutputSummary> {
        let preset = &params.parameter_name;
        let _guard = self
            .enter(Operation::TwoD, preset, Some(format), options, None)
            .await?;
        self.ensure_output_dir();
        let path = model_path(&self.output_dir, &self.source, preset, format);
        fs::write(&path, format.as_str()).map_err(RenderError::WriteParameters)?;
        Ok(self.summary(path))
    }

    async fn generate_animation_frames(
        &self,
        params: &InlineParameterSet,
        tag: &str,
        options: &RenderOptions,
    ) -> RenderResult<OutputSummary> {
        let preset = &params.parameter_name;
        let values = params
            .parameter_set
            .preset(preset)
            .map(|p| p.values.clone())
            .ok_or_else(|| RenderError::PresetNotFound {
                name: preset.clone(),
            })?;
        let _guard = self
            .enter(Operation::Frames, preset, None, options, Some(values))
            .await?;
        self.ensure_output_dir();

        let base = self
            .source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        for frame in 0..FRAME_COUNT {
            let path = self.output_dir.join(format!(
                "{}_{}{}{:05}.png",
                base,
                preset,
                frame_suffix(tag),
                frame
            ));
            fs::write(&path, b"\x89PNG\r\n\x1a\n").map_err(RenderError::WriteParameters)?;
        }
        Ok(self.summary(frame_pattern(&self.output_dir, &self.source, preset, tag)))
    }

    async fn generate_model(
        &self,
        params: &ParameterFileSet,
        format: OutputFormat,
        options: &RenderOptions,
    ) -> RenderResult<OutputSummary> {
        let preset = &params.parameter_name;
        let _guard = self
            .enter(Operation::Model, preset, Some(format), options, None)
            .await?;
        self.ensure_output_dir();
        let path = model_path(&self.output_dir, &self.source, preset, format);
        if format == OutputFormat::ThreeMf {
            write_3mf(&path).map_err(RenderError::WriteParameters)?;
        } else {
            fs::write(&path, format.as_str()).map_err(RenderError::WriteParameters)?;
        }
        Ok(self.summary(path))
    }
}

/// Writes a minimal 3MF package with one model relationship.
pub fn write_3mf(path: &Path) -> std::io::Result<()> {
    let file = fs::File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    for (name, content) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", MODEL_RELS),
        ("3D/3dmodel.model", MODEL_XML),
    ] {
        zip.start_file(name, options).map_err(std::io::Error::other)?;
        zip.write_all(content.as_bytes())?;
    }
    zip.finish().map_err(std::io::Error::other)?;
    Ok(())
}

/// Reads one entry of a zip package.
pub fn read_zip_bytes(path: &Path, name: &str) -> Option<Vec<u8>> {
    let file = fs::File::open(path).ok()?;
    let mut archive = zip::ZipArchive::new(file).ok()?;
    let mut entry = archive.by_name(name).ok()?;
    let mut content = Vec::new();
    std::io::Read::read_to_end(&mut entry, &mut content).ok()?;
    Some(content)
}

/// Reads one entry of a zip package as text.
pub fn read_zip_entry(path: &Path, name: &str) -> Option<String> {
    String::from_utf8(read_zip_bytes(path, name)?).ok()
}

/// Entry names of a zip package.
pub fn zip_entry_names(path: &Path) -> Vec<String> {
    fs::File::open(path)
        .ok()
        .and_then(|file| zip::ZipArchive::new(file).ok())
        .map(|archive| archive.file_names().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Executor recording command lines instead of running them.
///
/// With [`RecordingExecutor::with_frame_files`] it also acts on frame globs:
/// encoders wait, then fail when no frame matches; `rm` deletes the matches.
#[derive(Default)]
pub struct RecordingExecutor {
    commands: Mutex<Vec<String>>,
    failing_prefixes: Vec<String>,
    encode_delay: Option<Duration>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every command starting with `prefix` exit with status 1.
    pub fn failing_on(mut self, prefix: &str) -> Self {
        self.failing_prefixes.push(prefix.to_string());
        self
    }

    /// Makes encoders take `encode_delay` and check their input frames, and
    /// makes `rm` delete the frames it names.
    pub fn with_frame_files(mut self, encode_delay: Duration) -> Self {
        self.encode_delay = Some(encode_delay);
        self
    }

    /// Commands in the order they were run.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().expect("commands lock poisoned").clone()
    }

    pub fn commands_starting_with(&self, prefix: &str) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    /// Index of the first command starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.commands().iter().position(|c| c.starts_with(prefix))
    }
}

#[async_trait]
impl CommandExecutor for RecordingExecutor {
    async fn execute(&self, command: &str) -> ExecResult<String> {
        self.commands
            .lock()
            .expect("commands lock poisoned")
            .push(command.to_string());
        if self.failing_prefixes.iter().any(|p| command.starts_with(p.as_str())) {
            return Err(ExecError::CommandFailed {
                command: command.to_string(),
                exit_code: 1,
                output: "No such file or directory".to_string(),
            });
        }

        let (Some(delay), Some(pattern)) = (self.encode_delay, glob_argument(command)) else {
            return Ok(String::new());
        };
        if command.starts_with("rm ") {
            for frame in glob_matches(&pattern) {
                let _ = fs::remove_file(frame);
            }
        } else {
            tokio::time::sleep(delay).await;
            if glob_matches(&pattern).is_empty() {
                return Err(ExecError::CommandFailed {
                    command: command.to_string(),
                    exit_code: 1,
                    output: "no input frames".to_string(),
                });
            }
        }
        Ok(String::new())
    }
}

/// The `dir/prefix*suffix` argument of a command, unquoted.
fn glob_argument(command: &str) -> Option<String> {
    command
        .split_whitespace()
        .find(|arg| arg.contains('*'))
        .map(|arg| arg.replace('\'', ""))
}

/// Files matching a single-wildcard pattern.
pub fn glob_matches(pattern: &str) -> Vec<PathBuf> {
    let pattern = Path::new(pattern);
    let (Some(dir), Some(name)) = (pattern.parent(), pattern.file_name()) else {
        return Vec::new();
    };
    let name = name.to_string_lossy();
    let Some((prefix, suffix)) = name.split_once('*') else {
        return Vec::new();
    };
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut matches: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .map(|n| n.to_string_lossy())
                .is_some_and(|n| {
                    n.len() >= prefix.len() + suffix.len()
                        && n.starts_with(prefix)
                        && n.ends_with(suffix)
                })
        })
        .collect();
    matches.sort();
    matches
}
