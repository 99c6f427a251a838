//! 3MF branch: metadata substitution, export and package enrichment.

use colored::Colorize;
use scadgen_spec::{substitute, OutputFormat, OutputSummary, SubstitutionContext};

use super::{log_start, log_success, DispatchContext, DispatchError, GenerationTask};
use crate::archive::Enhance3mf;

pub(super) async fn generate(
    ctx: &DispatchContext,
    mut task: GenerationTask,
    format: OutputFormat,
) -> Result<OutputSummary, DispatchError> {
    let vars = SubstitutionContext::new(&ctx.source, task.preset(), &task.values);
    let opt = &mut task.options.option_3mf;
    opt.meta_data_title = substitute(&opt.meta_data_title, &vars);
    opt.meta_data_description = substitute(&opt.meta_data_description, &vars);

    log_start("model 3mf", task.preset());
    let summary = ctx
        .renderer
        .generate_model(&task.params, format, &task.options)
        .await?;
    log_success("model 3mf", task.preset(), &summary.file);

    if ctx.embed_thumbnail_in_3mf || ctx.embed_sources_in_3mf {
        enhance(ctx, &task, &summary).await?;
    }
    Ok(summary)
}

async fn enhance(
    ctx: &DispatchContext,
    task: &GenerationTask,
    summary: &OutputSummary,
) -> Result<(), DispatchError> {
    let mut package = Enhance3mf::open(&summary.file)?;

    if ctx.embed_thumbnail_in_3mf {
        add_thumbnail(ctx, task, &mut package).await?;
    }

    if ctx.embed_sources_in_3mf {
        package.add_source_file(&summary.model_file)?;
        package.add_parameter_set(&task.params)?;
        println!(
            "  {} added sources to {}",
            "INFO".blue().bold(),
            task.preset()
        );
    }

    package.save()?;
    Ok(())
}

/// Embeds the preset's thumbnail.
///
/// A sequential run reuses the companion PNG when it already exists. Otherwise
/// the thumbnail is rendered to its own path, which no other task writes, and
/// removed after embedding unless in debug mode.
async fn add_thumbnail(
    ctx: &DispatchContext,
    task: &GenerationTask,
    package: &mut Enhance3mf,
) -> Result<(), DispatchError> {
    let companion = package.thumbnail_source();
    if ctx.parallel_jobs <= 1 && companion.exists() {
        package.add_thumbnail(&companion)?;
    } else {
        println!(
            "  {} rendering thumbnail for {}",
            "INFO".blue().bold(),
            task.preset()
        );
        let thumbnail = ctx
            .renderer
            .generate_thumbnail(&task.params, &task.options)
            .await?;
        package.add_thumbnail(&thumbnail.file)?;
        if !task.options.debug {
            if let Err(e) = std::fs::remove_file(&thumbnail.file) {
                eprintln!(
                    "{} failed to remove thumbnail {}: {}",
                    "warning:".yellow(),
                    thumbnail.file.display(),
                    e
                );
            }
        }
    }

    println!(
        "  {} added thumbnail to {}",
        "INFO".blue().bold(),
        task.preset()
    );
    Ok(())
}
