//! Still image branch.

use scadgen_spec::OutputSummary;

use super::{log_start, log_success, DispatchContext, DispatchError, GenerationTask};

pub(super) async fn generate(
    ctx: &DispatchContext,
    task: GenerationTask,
) -> Result<OutputSummary, DispatchError> {
    log_start("image", task.preset());
    let summary = ctx
        .renderer
        .generate_image(&task.params, &task.options)
        .await?;
    log_success("image", task.preset(), &summary.file);
    Ok(summary)
}
