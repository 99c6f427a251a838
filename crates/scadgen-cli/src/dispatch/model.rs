//! Plain 3D/2D export branch.

use scadgen_spec::{OutputFormat, OutputSummary};

use super::{log_start, log_success, DispatchContext, DispatchError, GenerationTask};

pub(super) async fn generate(
    ctx: &DispatchContext,
    task: GenerationTask,
    format: OutputFormat,
) -> Result<OutputSummary, DispatchError> {
    let what = format!("model {}", format);
    log_start(&what, task.preset());
    let summary = ctx
        .renderer
        .generate_model(&task.params, format, &task.options)
        .await?;
    log_success(&what, task.preset(), &summary.file);
    Ok(summary)
}
