//! The renderer seam used by the dispatcher.

use async_trait::async_trait;
use scadgen_spec::{
    InlineParameterSet, OutputFormat, OutputSummary, ParameterFileSet, RenderOptions,
};
use std::path::{Path, PathBuf};

use crate::error::RenderResult;

/// Suffix of animation frame files, followed by the codec tag and the
/// engine's frame number.
pub const ANIMATION_FRAME_SUFFIX: &str = "_animation";
/// Suffix of the still image rendered for a 3MF package.
pub const THUMBNAIL_SUFFIX: &str = "_thumbnail";

/// Produces artifacts for one model source.
///
/// Implementations are shared by all tasks of a run, so every operation takes
/// its options by reference and must not keep state between calls.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Renders a PNG still image.
    async fn generate_image(
        &self,
        params: &ParameterFileSet,
        options: &RenderOptions,
    ) -> RenderResult<OutputSummary>;

    /// Exports a 2D document (`pdf`, `svg` or `dxf`).
    async fn generate_2d(
        &self,
        params: &ParameterFileSet,
        format: OutputFormat,
        options: &RenderOptions,
    ) -> RenderResult<OutputSummary>;

    /// Renders a PNG still image to the preset's thumbnail path, which no
    /// other operation writes.
    async fn generate_thumbnail(
        &self,
        params: &ParameterFileSet,
        options: &RenderOptions,
    ) -> RenderResult<OutputSummary>;

    /// Renders numbered PNG animation frames.
    ///
    /// `tag` names the consumer of the frames (`webp`, `gif`) so that two
    /// animations of one preset never share frame files. The returned
    /// summary's `file` is a glob pattern matching every frame.
    async fn generate_animation_frames(
        &self,
        params: &InlineParameterSet,
        tag: &str,
        options: &RenderOptions,
    ) -> RenderResult<OutputSummary>;

    /// Exports a 3D model or package.
    async fn generate_model(
        &self,
        params: &ParameterFileSet,
        format: OutputFormat,
        options: &RenderOptions,
    ) -> RenderResult<OutputSummary>;
}

/// Output path of one artifact: `{dir}/{base}_{preset}{suffix}.{ext}`.
pub fn artifact_path(
    output_dir: &Path,
    source: &Path,
    preset: &str,
    suffix: &str,
    extension: &str,
) -> PathBuf {
    let base = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_dir.join(format!("{}_{}{}.{}", base, preset, suffix, extension))
}

/// Output path of a model export, honoring the format's file suffix
/// (`_ascii`, `_binary`) and extension.
pub fn model_path(output_dir: &Path, source: &Path, preset: &str, format: OutputFormat) -> PathBuf {
    artifact_path(output_dir, source, preset, format.file_suffix(), format.extension())
}

/// Frame file suffix for animations tagged `tag`.
pub fn frame_suffix(tag: &str) -> String {
    format!("{}_{}", ANIMATION_FRAME_SUFFIX, tag)
}

/// Glob pattern matching the animation frames of one preset and tag.
pub fn frame_pattern(output_dir: &Path, source: &Path, preset: &str, tag: &str) -> PathBuf {
    artifact_path(output_dir, source, preset, &format!("{}*", frame_suffix(tag)), "png")
}

/// Path of the thumbnail rendered for a preset's 3MF package.
pub fn thumbnail_path(output_dir: &Path, source: &Path, preset: &str) -> PathBuf {
    artifact_path(output_dir, source, preset, THUMBNAIL_SUFFIX, "png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_naming() {
        let dir = Path::new("gen");
        let src = Path::new("models/widget.scad");
        assert_eq!(
            artifact_path(dir, src, "p1", "", "png"),
            PathBuf::from("gen/widget_p1.png")
        );
        assert_eq!(
            model_path(dir, src, "p1", OutputFormat::AsciiStl),
            PathBuf::from("gen/widget_p1_ascii.stl")
        );
        assert_eq!(
            model_path(dir, src, "p1", OutputFormat::ThreeMf),
            PathBuf::from("gen/widget_p1.3mf")
        );
        assert_eq!(
            thumbnail_path(dir, src, "p1"),
            PathBuf::from("gen/widget_p1_thumbnail.png")
        );
    }

    #[test]
    fn test_frame_patterns_are_tagged() {
        let dir = Path::new("gen");
        let src = Path::new("widget.scad");
        assert_eq!(
            frame_pattern(dir, src, "p1", "webp"),
            PathBuf::from("gen/widget_p1_animation_webp*.png")
        );
        assert_ne!(
            frame_pattern(dir, src, "p1", "webp"),
            frame_pattern(dir, src, "p1", "gif")
        );
    }
}
