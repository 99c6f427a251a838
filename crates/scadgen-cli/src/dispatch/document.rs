//! 2D document branch (`pdf`, `svg`, `dxf`).

use scadgen_spec::{substitute, OutputFormat, OutputSummary, SubstitutionContext};

use super::{log_start, log_success, DispatchContext, DispatchError, GenerationTask};

pub(super) async fn generate(
    ctx: &DispatchContext,
    mut task: GenerationTask,
    format: OutputFormat,
) -> Result<OutputSummary, DispatchError> {
    let vars = SubstitutionContext::new(&ctx.source, task.preset(), &task.values);
    let pdf = &mut task.options.option_pdf;
    pdf.meta_data_title = substitute(&pdf.meta_data_title, &vars);
    pdf.meta_data_subject = substitute(&pdf.meta_data_subject, &vars);

    log_start("document", task.preset());
    let summary = ctx
        .renderer
        .generate_2d(&task.params, format, &task.options)
        .await?;
    log_success("document", task.preset(), &summary.file);
    Ok(summary)
}
