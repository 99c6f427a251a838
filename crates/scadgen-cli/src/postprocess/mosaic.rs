//! Contact sheet of still images via ImageMagick `montage`.

use colored::Colorize;
use scadgen_backend_openscad::shell::{join, quote};
use scadgen_backend_openscad::{CommandExecutor, ExecResult};
use scadgen_spec::MosaicOptions;
use std::path::{Path, PathBuf};

/// Mosaic output path: `{dir}/mosaic_{base}.jpg`.
pub fn mosaic_path(output_dir: &Path, base_file_name: &str) -> PathBuf {
    output_dir.join(format!("mosaic_{}.jpg", base_file_name))
}

pub fn mosaic_command(
    images: &[PathBuf],
    options: &MosaicOptions,
    output: &Path,
    verbose: bool,
) -> String {
    let geometry = &options.geometry;
    let tiles = &options.tiles;
    format!(
        "montage{} -geometry {}x{}+{}+{} -tile {}x{} {} {}",
        if verbose { " -verbose" } else { "" },
        geometry.width,
        geometry.height,
        geometry.border,
        geometry.border,
        tiles.width,
        tiles.height,
        join(images.iter().map(|p| p.to_string_lossy())),
        quote(&output.to_string_lossy())
    )
}

/// Tiles `images` into one JPEG at `output`.
pub async fn generate_mosaic(
    executor: &dyn CommandExecutor,
    images: &[PathBuf],
    options: &MosaicOptions,
    output: PathBuf,
    verbose: bool,
) -> ExecResult<PathBuf> {
    println!(
        "{} mosaic of {} images",
        "Generating".cyan(),
        images.len()
    );
    executor
        .execute(&mosaic_command(images, options, &output, verbose))
        .await?;
    println!("{} {}", "Mosaic:".green().bold(), output.display());
    Ok(output)
}
