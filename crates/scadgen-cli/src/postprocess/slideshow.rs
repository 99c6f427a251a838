//! Animated slideshow of still images.

use colored::Colorize;
use scadgen_backend_openscad::shell::join;
use scadgen_backend_openscad::{CommandExecutor, ExecResult};
use scadgen_spec::SlideShowFormat;
use std::path::{Path, PathBuf};

use super::animation::AnimationCodec;

/// Slideshow output path: `{dir}/slideShow_{base}.{ext}`.
pub fn slideshow_path(output_dir: &Path, base_file_name: &str, format: SlideShowFormat) -> PathBuf {
    output_dir.join(format!("slideShow_{}.{}", base_file_name, format.extension()))
}

pub fn slideshow_command(
    images: &[PathBuf],
    format: SlideShowFormat,
    interval_ms: u32,
    output: &Path,
    verbose: bool,
) -> String {
    let codec = match format {
        SlideShowFormat::Webp => AnimationCodec::Webp,
        SlideShowFormat::Gif => AnimationCodec::Gif,
    };
    let inputs = join(images.iter().map(|p| p.to_string_lossy()));
    codec.command(&inputs, output, interval_ms, verbose)
}

/// Encodes `images` into one animation showing each for `interval_ms`.
pub async fn generate_slideshow(
    executor: &dyn CommandExecutor,
    images: &[PathBuf],
    format: SlideShowFormat,
    interval_ms: u32,
    output: PathBuf,
    verbose: bool,
) -> ExecResult<PathBuf> {
    println!(
        "{} {} slideshow of {} images",
        "Generating".cyan(),
        format.extension(),
        images.len()
    );
    executor
        .execute(&slideshow_command(images, format, interval_ms, &output, verbose))
        .await?;
    println!("{} {}", "Slideshow:".green().bold(), output.display());
    Ok(output)
}
