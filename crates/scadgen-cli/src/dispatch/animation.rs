//! Animation branch: frames with `animation_rotation` set, then encoding.

use scadgen_backend_openscad::artifact_path;
use scadgen_spec::{InlineParameterSet, OutputSummary, ParameterSet, SpecError, ANIMATION_ROTATION};

use super::{log_start, log_success, DispatchContext, DispatchError, GenerationTask};
use crate::postprocess::{encode_frames, AnimationCodec};

pub(super) async fn generate(
    ctx: &DispatchContext,
    task: GenerationTask,
    codec: AnimationCodec,
) -> Result<OutputSummary, DispatchError> {
    let preset = task.preset().to_string();
    let what = format!("animation {}", codec.extension());
    log_start(&what, &preset);

    // The rotation flag only exists in memory; the document on disk is
    // shared by every task.
    let document = ParameterSet::load(&task.params.parameter_file)?;
    let parameter_set = document
        .with_parameter(&preset, ANIMATION_ROTATION, "true")
        .ok_or_else(|| SpecError::PresetNotFound {
            name: preset.clone(),
            path: task.params.parameter_file.clone(),
        })?;
    let inline = InlineParameterSet {
        parameter_set,
        parameter_name: preset.clone(),
    };

    let frames = ctx
        .renderer
        .generate_animation_frames(&inline, codec.extension(), &task.options)
        .await?;

    let output = artifact_path(&ctx.output_dir, &ctx.source, &preset, "", codec.extension());
    let summary = encode_frames(
        ctx.executor.as_ref(),
        frames,
        codec,
        output,
        task.options.anim_options.anim_delay,
        task.options.debug,
    )
    .await?;

    log_success(&what, &preset, &summary.file);
    Ok(summary)
}
