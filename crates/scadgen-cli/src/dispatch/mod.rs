//! Format dispatch module
//!
//! Routes one (preset, format) task to the handler of its format kind and
//! turns every error into a [`TaskOutcome::Failed`] at the boundary.

mod animation;
mod document;
mod image;
mod model;
mod package;

use colored::Colorize;
use scadgen_backend_openscad::{CommandExecutor, ExecError, RenderError, Renderer};
use scadgen_spec::{
    CodedError, FormatKind, GenerationOptions, OutputFormat, OutputSummary, ParameterFileSet,
    ParameterValues, RenderOptions, SpecError,
};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::archive::ArchiveError;
use crate::postprocess::AnimationCodec;

/// Errors that can occur while running one task
#[derive(Debug)]
pub enum DispatchError {
    /// The requested format is not known
    UnknownFormat { format: String, preset: String },
    /// The parameter document could not be used
    Parameters(SpecError),
    /// The renderer failed
    Render(RenderError),
    /// A post-processing command failed
    Exec(ExecError),
    /// Package enrichment failed
    Archive(ArchiveError),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::UnknownFormat { format, preset } => {
                write!(f, "Unknown format '{}' for parameter set '{}'", format, preset)
            }
            DispatchError::Parameters(e) => write!(f, "{}", e),
            DispatchError::Render(e) => write!(f, "{}", e),
            DispatchError::Exec(e) => write!(f, "{}", e),
            DispatchError::Archive(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::UnknownFormat { .. } => None,
            DispatchError::Parameters(e) => Some(e),
            DispatchError::Render(e) => Some(e),
            DispatchError::Exec(e) => Some(e),
            DispatchError::Archive(e) => Some(e),
        }
    }
}

impl CodedError for DispatchError {
    fn code(&self) -> &'static str {
        match self {
            DispatchError::UnknownFormat { .. } => "DISPATCH_001",
            DispatchError::Parameters(e) => e.code(),
            DispatchError::Render(e) => e.code(),
            DispatchError::Exec(e) => e.code(),
            DispatchError::Archive(e) => e.code(),
        }
    }

    fn category(&self) -> &'static str {
        match self {
            DispatchError::UnknownFormat { .. } => "dispatch",
            DispatchError::Parameters(e) => e.category(),
            DispatchError::Render(e) => e.category(),
            DispatchError::Exec(e) => e.category(),
            DispatchError::Archive(e) => e.category(),
        }
    }
}

impl From<SpecError> for DispatchError {
    fn from(e: SpecError) -> Self {
        DispatchError::Parameters(e)
    }
}

impl From<RenderError> for DispatchError {
    fn from(e: RenderError) -> Self {
        DispatchError::Render(e)
    }
}

impl From<ExecError> for DispatchError {
    fn from(e: ExecError) -> Self {
        DispatchError::Exec(e)
    }
}

impl From<ArchiveError> for DispatchError {
    fn from(e: ArchiveError) -> Self {
        DispatchError::Archive(e)
    }
}

/// Collaborators and run-wide settings shared by all tasks.
pub struct DispatchContext {
    pub renderer: Arc<dyn Renderer>,
    pub executor: Arc<dyn CommandExecutor>,
    pub source: PathBuf,
    pub output_dir: PathBuf,
    /// Task permits of the run. Above one, sibling tasks may overlap.
    pub parallel_jobs: usize,
    pub embed_thumbnail_in_3mf: bool,
    pub embed_sources_in_3mf: bool,
}

impl DispatchContext {
    pub fn new(
        options: &GenerationOptions,
        renderer: Arc<dyn Renderer>,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self {
            renderer,
            executor,
            source: options.file_name.clone(),
            output_dir: options.output_dir.clone(),
            parallel_jobs: options.parallel_jobs,
            embed_thumbnail_in_3mf: options.embed_thumbnail_in_3mf,
            embed_sources_in_3mf: options.embed_sources_in_3mf,
        }
    }
}

/// One unit of work. The task owns its render options; handlers that
/// substitute metadata only ever change this copy.
#[derive(Debug, Clone)]
pub struct GenerationTask {
    pub format: String,
    pub params: ParameterFileSet,
    pub options: RenderOptions,
    /// Values of the active preset, used for `__PARAMETERS__`.
    pub values: ParameterValues,
}

impl GenerationTask {
    pub fn new(
        format: impl Into<String>,
        params: ParameterFileSet,
        options: RenderOptions,
    ) -> Self {
        Self {
            format: format.into(),
            params,
            options,
            values: ParameterValues::new(),
        }
    }

    pub fn with_values(mut self, values: ParameterValues) -> Self {
        self.values = values;
        self
    }

    pub fn preset(&self) -> &str {
        &self.params.parameter_name
    }
}

/// A task that produced its artifact.
#[derive(Debug, Clone)]
pub struct CompletedTask {
    pub preset: String,
    pub format: String,
    pub summary: OutputSummary,
    pub duration: Duration,
}

/// A task that failed. Siblings are unaffected.
#[derive(Debug)]
pub struct TaskFailure {
    pub preset: String,
    pub format: String,
    pub error: DispatchError,
    pub duration: Duration,
}

/// Settled result of one task.
#[derive(Debug)]
pub enum TaskOutcome {
    Completed(CompletedTask),
    Failed(TaskFailure),
}

impl TaskOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskOutcome::Completed(_))
    }

    pub fn preset(&self) -> &str {
        match self {
            TaskOutcome::Completed(t) => &t.preset,
            TaskOutcome::Failed(t) => &t.preset,
        }
    }

    pub fn format(&self) -> &str {
        match self {
            TaskOutcome::Completed(t) => &t.format,
            TaskOutcome::Failed(t) => &t.format,
        }
    }
}

/// Runs one task.
///
/// The format is resolved before anything else, so an unknown format never
/// reaches the renderer.
pub async fn dispatch(
    ctx: &DispatchContext,
    task: GenerationTask,
) -> Result<OutputSummary, DispatchError> {
    let format: OutputFormat = task
        .format
        .parse()
        .map_err(|_| DispatchError::UnknownFormat {
            format: task.format.clone(),
            preset: task.preset().to_string(),
        })?;

    match format.kind() {
        FormatKind::StillImage => image::generate(ctx, task).await,
        FormatKind::Document2d => document::generate(ctx, task, format).await,
        FormatKind::AnimationWebp => animation::generate(ctx, task, AnimationCodec::Webp).await,
        FormatKind::AnimationGif => animation::generate(ctx, task, AnimationCodec::Gif).await,
        FormatKind::Package3d => package::generate(ctx, task, format).await,
        FormatKind::Model => model::generate(ctx, task, format).await,
    }
}

/// Runs one task and settles it. Never fails.
pub async fn dispatch_task(ctx: &DispatchContext, task: GenerationTask) -> TaskOutcome {
    let preset = task.preset().to_string();
    let format = task.format.clone();
    let start = Instant::now();

    match dispatch(ctx, task).await {
        Ok(summary) => TaskOutcome::Completed(CompletedTask {
            preset,
            format,
            summary,
            duration: start.elapsed(),
        }),
        Err(error) => {
            eprintln!(
                "  {} generating parameter set {} in format {}: {}",
                "FAILED".red(),
                preset.bold(),
                format,
                error
            );
            TaskOutcome::Failed(TaskFailure {
                preset,
                format,
                error,
                duration: start.elapsed(),
            })
        }
    }
}

fn log_start(what: &str, preset: &str) {
    println!("  {} {} for parameter set {}", "Generating".cyan(), what, preset.bold());
}

fn log_success(what: &str, preset: &str, file: &Path) {
    println!(
        "  {} {} for parameter set {} -> {}",
        "SUCCESS".green(),
        what,
        preset.bold(),
        file.display()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use scadgen_backend_openscad::{
        artifact_path, frame_pattern, model_path, thumbnail_path, ExecResult, RenderResult,
    };
    use scadgen_spec::{InlineParameterSet, ParameterSet, ANIMATION_ROTATION};
    use std::sync::Mutex;

    const SOURCE: &str = "widget.scad";

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Image(String),
        Thumbnail(String),
        TwoD(String, OutputFormat, String),
        Frames(String, serde_json::Value),
        Model(String, OutputFormat, String, String),
    }

    /// Records calls and creates empty output files.
    #[derive(Default)]
    struct StubRenderer {
        output_dir: PathBuf,
        calls: Mutex<Vec<Call>>,
    }

    impl StubRenderer {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn touch(&self, path: &Path) -> OutputSummary {
            std::fs::write(path, b"").unwrap();
            OutputSummary::new(path, "widget.scad")
        }
    }

    #[async_trait]
    impl Renderer for StubRenderer {
        async fn generate_image(
            &self,
            params: &ParameterFileSet,
            _options: &RenderOptions,
        ) -> RenderResult<OutputSummary> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Image(params.parameter_name.clone()));
            let path = artifact_path(
                &self.output_dir,
                Path::new(SOURCE),
                &params.parameter_name,
                "",
                "png",
            );
            Ok(self.touch(&path))
        }

        async fn generate_thumbnail(
            &self,
            params: &ParameterFileSet,
            _options: &RenderOptions,
        ) -> RenderResult<OutputSummary> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Thumbnail(params.parameter_name.clone()));
            let path = thumbnail_path(&self.output_dir, Path::new(SOURCE), &params.parameter_name);
            Ok(self.touch(&path))
        }

        async fn generate_2d(
            &self,
            params: &ParameterFileSet,
            format: OutputFormat,
            options: &RenderOptions,
        ) -> RenderResult<OutputSummary> {
            self.calls.lock().unwrap().push(Call::TwoD(
                params.parameter_name.clone(),
                format,
                options.option_pdf.meta_data_title.clone(),
            ));
            let path = model_path(
                &self.output_dir,
                Path::new(SOURCE),
                &params.parameter_name,
                format,
            );
            Ok(self.touch(&path))
        }

        async fn generate_animation_frames(
            &self,
            params: &InlineParameterSet,
            tag: &str,
            _options: &RenderOptions,
        ) -> RenderResult<OutputSummary> {
            let values = params
                .parameter_set
                .preset(&params.parameter_name)
                .map(|p| serde_json::Value::Object(p.values.clone()))
                .unwrap_or_default();
            self.calls
                .lock()
                .unwrap()
                .push(Call::Frames(params.parameter_name.clone(), values));
            Ok(OutputSummary::new(
                frame_pattern(&self.output_dir, Path::new(SOURCE), &params.parameter_name, tag),
                "widget.scad",
            ))
        }

        async fn generate_model(
            &self,
            params: &ParameterFileSet,
            format: OutputFormat,
            options: &RenderOptions,
        ) -> RenderResult<OutputSummary> {
            self.calls.lock().unwrap().push(Call::Model(
                params.parameter_name.clone(),
                format,
                options.option_3mf.meta_data_title.clone(),
                options.option_3mf.meta_data_description.clone(),
            ));
            let path = model_path(
                &self.output_dir,
                Path::new(SOURCE),
                &params.parameter_name,
                format,
            );
            Ok(self.touch(&path))
        }
    }

    #[derive(Default)]
    struct RecordingExecutor {
        commands: Mutex<Vec<String>>,
        fail_prefix: Option<&'static str>,
    }

    #[async_trait]
    impl CommandExecutor for RecordingExecutor {
        async fn execute(&self, command: &str) -> ExecResult<String> {
            self.commands.lock().unwrap().push(command.to_string());
            match self.fail_prefix {
                Some(prefix) if command.starts_with(prefix) => Err(ExecError::CommandFailed {
                    command: command.to_string(),
                    exit_code: 1,
                    output: "No such file or directory".to_string(),
                }),
                _ => Ok(String::new()),
            }
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        renderer: Arc<StubRenderer>,
        executor: Arc<RecordingExecutor>,
        ctx: DispatchContext,
    }

    fn fixture(fail_prefix: Option<&'static str>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let gen = dir.path().join("gen");
        std::fs::create_dir_all(&gen).unwrap();
        std::fs::write(
            dir.path().join("widget.json"),
            r#"{"parameterSets":{"p1":{"size":"10"},"p2":{"size":"20"}},"fileFormatVersion":"1"}"#,
        )
        .unwrap();
        let renderer = Arc::new(StubRenderer {
            output_dir: gen.clone(),
            ..Default::default()
        });
        let executor = Arc::new(RecordingExecutor {
            fail_prefix,
            ..Default::default()
        });
        let ctx = DispatchContext {
            renderer: renderer.clone(),
            executor: executor.clone(),
            source: PathBuf::from("widget.scad"),
            output_dir: gen,
            parallel_jobs: 1,
            embed_thumbnail_in_3mf: false,
            embed_sources_in_3mf: false,
        };
        Fixture {
            dir,
            renderer,
            executor,
            ctx,
        }
    }

    fn task(f: &Fixture, format: &str, preset: &str) -> GenerationTask {
        let values = serde_json::json!({ "size": "10" });
        GenerationTask::new(
            format,
            ParameterFileSet::new(f.dir.path().join("widget.json"), preset),
            RenderOptions::default(),
        )
        .with_values(values.as_object().unwrap().clone())
    }

    #[tokio::test]
    async fn test_unknown_format_never_reaches_renderer() {
        let f = fixture(None);
        for format in ["jpg", "", "PNGX", "mosaic"] {
            let err = dispatch(&f.ctx, task(&f, format, "p1")).await.unwrap_err();
            match err {
                DispatchError::UnknownFormat { format: got, preset } => {
                    assert_eq!(got, format);
                    assert_eq!(preset, "p1");
                }
                other => panic!("unexpected error: {other}"),
            }
        }
        assert!(f.renderer.calls().is_empty());
        assert!(f.executor.commands.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_png_goes_to_image() {
        let f = fixture(None);
        let out = dispatch(&f.ctx, task(&f, "PNG", "p1")).await.unwrap();
        assert_eq!(f.renderer.calls(), vec![Call::Image("p1".to_string())]);
        assert!(out.is_still_image());
    }

    #[tokio::test]
    async fn test_document_substitutes_task_copy_only() {
        let f = fixture(None);
        let t = task(&f, "pdf", "p1");
        let base_title = t.options.option_pdf.meta_data_title.clone();
        dispatch(&f.ctx, t.clone()).await.unwrap();

        assert_eq!(
            f.renderer.calls(),
            vec![Call::TwoD(
                "p1".to_string(),
                OutputFormat::Pdf,
                "widget - p1".to_string()
            )]
        );
        assert_eq!(t.options.option_pdf.meta_data_title, base_title);
    }

    #[tokio::test]
    async fn test_3mf_substitutes_metadata() {
        let f = fixture(None);
        dispatch(&f.ctx, task(&f, "3mf", "p2")).await.unwrap();
        match &f.renderer.calls()[0] {
            Call::Model(preset, format, title, description) => {
                assert_eq!(preset, "p2");
                assert_eq!(*format, OutputFormat::ThreeMf);
                assert_eq!(title, "widget - p2");
                assert_eq!(
                    description,
                    "widget - p2 (made with OpenSCAD from \"file widget.scad\")"
                );
            }
            other => panic!("unexpected call: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_model_formats() {
        let f = fixture(None);
        let out = dispatch(&f.ctx, task(&f, "asciistl", "p1")).await.unwrap();
        assert!(out.file.ends_with("widget_p1_ascii.stl"));
        // plain models keep the untouched template
        match &f.renderer.calls()[0] {
            Call::Model(_, format, title, _) => {
                assert_eq!(*format, OutputFormat::AsciiStl);
                assert_eq!(title, "__BASE_FILE_NAME__ - __PARAMETER_SET__");
            }
            other => panic!("unexpected call: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_animation_sets_rotation_and_cleans_up_after_encode() {
        let f = fixture(None);
        let out = dispatch(&f.ctx, task(&f, "webp", "p1")).await.unwrap();

        assert!(out.file.ends_with("widget_p1.webp"));
        match &f.renderer.calls()[0] {
            Call::Frames(preset, values) => {
                assert_eq!(preset, "p1");
                assert_eq!(values[ANIMATION_ROTATION], "true");
                assert_eq!(values["size"], "10");
            }
            other => panic!("unexpected call: {other:?}"),
        }

        // the document on disk is untouched
        let doc = ParameterSet::load(&f.dir.path().join("widget.json")).unwrap();
        assert!(doc.preset("p1").unwrap().values.get(ANIMATION_ROTATION).is_none());

        let commands = f.executor.commands.lock().unwrap();
        assert_eq!(commands.len(), 2);
        assert!(commands[0].starts_with("img2webp "));
        assert!(commands[0].contains("-d 50"));
        assert!(commands[1].starts_with("rm "));
        assert!(commands[1].ends_with("widget_p1_animation_webp*.png"));
    }

    #[tokio::test]
    async fn test_animation_keeps_frames_in_debug_mode() {
        let f = fixture(None);
        let mut t = task(&f, "gif", "p1");
        t.options.debug = true;
        let out = dispatch(&f.ctx, t).await.unwrap();

        assert!(out.file.ends_with("widget_p1.gif"));
        let commands = f.executor.commands.lock().unwrap();
        assert_eq!(commands.len(), 1);
        assert!(commands[0].starts_with("convert -verbose "));
        assert!(commands.iter().all(|c| !c.starts_with("rm ")));
    }

    #[tokio::test]
    async fn test_animation_cleanup_failure_is_not_fatal() {
        let f = fixture(Some("rm "));
        let out = dispatch(&f.ctx, task(&f, "gif", "p1")).await.unwrap();
        assert!(out.file.ends_with("widget_p1.gif"));
        let commands = f.executor.commands.lock().unwrap();
        assert!(commands[0].starts_with("convert -delay 5 -loop 0 "));
    }

    #[tokio::test]
    async fn test_animation_encode_failure_fails_task() {
        let f = fixture(Some("img2webp"));
        let outcome = dispatch_task(&f.ctx, task(&f, "webp", "p1")).await;
        match outcome {
            TaskOutcome::Failed(failure) => {
                assert_eq!(failure.preset, "p1");
                assert_eq!(failure.format, "webp");
                assert_eq!(failure.error.code(), "EXEC_003");
            }
            TaskOutcome::Completed(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_dispatch_task_settles_unknown_format() {
        let f = fixture(None);
        let outcome = dispatch_task(&f.ctx, task(&f, "jpg", "p2")).await;
        assert!(!outcome.is_completed());
        assert_eq!(outcome.preset(), "p2");
        assert_eq!(outcome.format(), "jpg");
    }
}
