//! scadgen CLI - Batch artifact generation for parametric OpenSCAD models
//!
//! This binary resolves the run configuration and hands it to the generation
//! pipeline.

mod cli_args;

use clap::Parser;
use cli_args::{Cli, Commands};
use std::path::Path;
use std::process::ExitCode;

use scadgen_cli::commands;
use scadgen_cli::config::CliOverrides;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate {
            file,
            preset,
            formats,
            jobs,
            config,
            output_dir,
            debug,
            mosaic,
            slideshow,
            slideshow_interval,
            embed_thumbnail,
            embed_sources,
        } => {
            let overrides = CliOverrides {
                output_dir,
                formats,
                preset,
                parallel_jobs: jobs,
                debug,
                mosaic,
                slideshow,
                slideshow_interval,
                embed_thumbnail,
                embed_sources,
            };
            commands::generate::run(
                Path::new(&file),
                config.as_deref().map(Path::new),
                &overrides,
            )
        }
        Commands::Formats { json } => commands::formats::run(json),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {}", colored::Colorize::red("error"), e);
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_generate_defaults() {
        let cli = Cli::try_parse_from(["scadgen", "generate", "widget.scad"]).unwrap();
        match cli.command {
            Commands::Generate {
                file,
                preset,
                formats,
                jobs,
                debug,
                slideshow,
                ..
            } => {
                assert_eq!(file, "widget.scad");
                assert!(preset.is_none());
                assert!(formats.is_none());
                assert!(jobs.is_none());
                assert!(!debug);
                assert!(slideshow.is_none());
            }
            _ => panic!("expected generate command"),
        }
    }

    #[test]
    fn test_cli_parses_generate_flags() {
        let cli = Cli::try_parse_from([
            "scadgen",
            "generate",
            "models/widget.scad",
            "-p",
            "small",
            "-o",
            "png,webp,3mf",
            "-j",
            "4",
            "-O",
            "out",
            "-D",
            "--mosaic",
            "--slideshow",
            "gif",
            "--embed-thumbnail",
        ])
        .unwrap();
        match cli.command {
            Commands::Generate {
                preset,
                formats,
                jobs,
                output_dir,
                debug,
                mosaic,
                slideshow,
                embed_thumbnail,
                embed_sources,
                ..
            } => {
                assert_eq!(preset.as_deref(), Some("small"));
                assert_eq!(
                    formats,
                    Some(vec!["png".to_string(), "webp".to_string(), "3mf".to_string()])
                );
                assert_eq!(jobs, Some(4));
                assert_eq!(output_dir.as_deref(), Some("out"));
                assert!(debug);
                assert!(mosaic);
                assert_eq!(slideshow.as_deref(), Some("gif"));
                assert!(embed_thumbnail);
                assert!(!embed_sources);
            }
            _ => panic!("expected generate command"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_slideshow_format() {
        let result = Cli::try_parse_from([
            "scadgen",
            "generate",
            "widget.scad",
            "--slideshow",
            "mp4",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parses_formats() {
        let cli = Cli::try_parse_from(["scadgen", "formats", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::Formats { json: true }));
    }
}
