//! CLI argument definitions for the scadgen command-line interface.
//!
//! All `#[derive(Parser)]` and `#[derive(Subcommand)]` types are defined here,
//! keeping `main.rs` focused on dispatch logic.

use clap::{Parser, Subcommand};

/// scadgen - Batch artifact generation for parametric OpenSCAD models
#[derive(Parser)]
#[command(name = "scadgen")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Generate every requested format for every parameter set of a model
    Generate {
        /// Path to the model source (.scad); presets are read from <base>.json
        file: String,

        /// Only generate this parameter set
        #[arg(short, long)]
        preset: Option<String>,

        /// Output formats, comma separated (default: png,webp,3mf)
        #[arg(short = 'o', long, value_delimiter = ',')]
        formats: Option<Vec<String>>,

        /// Maximum number of tasks in flight
        #[arg(short = 'j', long)]
        jobs: Option<usize>,

        /// Path to a YAML or JSON config file (default: <base>.config.yaml next to the model)
        #[arg(short, long)]
        config: Option<String>,

        /// Output directory (default: ./gen)
        #[arg(short = 'O', long)]
        output_dir: Option<String>,

        /// Echo commands and their output, keep intermediate files
        #[arg(short = 'D', long)]
        debug: bool,

        /// Compose a mosaic of the generated still images
        #[arg(long)]
        mosaic: bool,

        /// Compose a slideshow of the generated still images
        #[arg(long, value_parser = ["webp", "gif"])]
        slideshow: Option<String>,

        /// Slideshow frame interval in milliseconds
        #[arg(long)]
        slideshow_interval: Option<u32>,

        /// Embed the PNG of the same parameter set as the 3MF thumbnail
        #[arg(long)]
        embed_thumbnail: bool,

        /// Embed the model source and parameter set in the 3MF package
        #[arg(long)]
        embed_sources: bool,
    },

    /// List the supported output formats
    Formats {
        /// Output machine-readable JSON
        #[arg(long)]
        json: bool,
    },
}
