//! Frame sequence to animated WEBP/GIF.

use colored::Colorize;
use scadgen_backend_openscad::shell::{quote, quote_glob};
use scadgen_backend_openscad::{CommandExecutor, ExecResult};
use scadgen_spec::{FormatKind, OutputSummary};
use std::path::{Path, PathBuf};

/// Target codec of an animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationCodec {
    Webp,
    Gif,
}

impl AnimationCodec {
    pub fn from_kind(kind: FormatKind) -> Option<Self> {
        match kind {
            FormatKind::AnimationWebp => Some(AnimationCodec::Webp),
            FormatKind::AnimationGif => Some(AnimationCodec::Gif),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AnimationCodec::Webp => "webp",
            AnimationCodec::Gif => "gif",
        }
    }

    /// Encoder command over already quoted inputs.
    pub(crate) fn command(
        &self,
        inputs: &str,
        output: &Path,
        delay_ms: u32,
        verbose: bool,
    ) -> String {
        let output = quote(&output.to_string_lossy());
        match self {
            AnimationCodec::Webp => format!(
                "img2webp{} -o {} -d {} {}",
                if verbose { " -v" } else { "" },
                output,
                delay_ms,
                inputs
            ),
            AnimationCodec::Gif => format!(
                "convert{} -delay {} -loop 0 {} {}",
                if verbose { " -verbose" } else { "" },
                gif_delay(delay_ms),
                inputs,
                output
            ),
        }
    }
}

/// GIF frame delay in centiseconds for a delay in milliseconds.
pub fn gif_delay(delay_ms: u32) -> u32 {
    (delay_ms / 10).max(1)
}

/// Encoder command for the frames matched by `pattern`.
pub fn encode_command(
    codec: AnimationCodec,
    pattern: &Path,
    output: &Path,
    delay_ms: u32,
    verbose: bool,
) -> String {
    codec.command(&quote_glob(&pattern.to_string_lossy()), output, delay_ms, verbose)
}

/// Command deleting the frames matched by `pattern`.
pub fn cleanup_command(pattern: &Path) -> String {
    format!("rm {}", quote_glob(&pattern.to_string_lossy()))
}

/// Encodes the frames of `frames` into `output`, then deletes the frames.
///
/// In debug mode the encoder runs verbose and the frames are kept. An encoder
/// failure fails the call. A cleanup failure is only logged.
pub async fn encode_frames(
    executor: &dyn CommandExecutor,
    mut frames: OutputSummary,
    codec: AnimationCodec,
    output: PathBuf,
    delay_ms: u32,
    debug: bool,
) -> ExecResult<OutputSummary> {
    let pattern = frames.file.clone();

    let log = executor
        .execute(&encode_command(codec, &pattern, &output, delay_ms, debug))
        .await?;
    frames.append_output(&log);
    frames.file = output;

    if debug {
        println!(
            "  {} keeping frames {}",
            "INFO".blue().bold(),
            pattern.display()
        );
        return Ok(frames);
    }

    match executor.execute_allow_failure(&cleanup_command(&pattern)).await {
        Ok(log) => frames.append_output(&log),
        Err(e) => eprintln!(
            "{} failed to remove frames {}: {}",
            "warning:".yellow(),
            pattern.display(),
            e
        ),
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_webp_command() {
        let cmd = encode_command(
            AnimationCodec::Webp,
            Path::new("gen/w_p1_animation_webp*.png"),
            Path::new("gen/w_p1.webp"),
            50,
            false,
        );
        assert_eq!(cmd, "img2webp -o gen/w_p1.webp -d 50 gen/w_p1_animation_webp*.png");
    }

    #[test]
    fn test_gif_command_uses_centiseconds() {
        let cmd = encode_command(
            AnimationCodec::Gif,
            Path::new("my gen/w_p1_animation_gif*.png"),
            Path::new("my gen/w_p1.gif"),
            50,
            true,
        );
        assert_eq!(
            cmd,
            "convert -verbose -delay 5 -loop 0 'my gen/w_p1_animation_gif'*.png 'my gen/w_p1.gif'"
        );
    }

    #[test]
    fn test_gif_delay_minimum() {
        assert_eq!(gif_delay(1000), 100);
        assert_eq!(gif_delay(5), 1);
        assert_eq!(gif_delay(0), 1);
    }

    #[test]
    fn test_cleanup_command() {
        assert_eq!(
            cleanup_command(Path::new("gen/w_p1_animation_gif*.png")),
            "rm gen/w_p1_animation_gif*.png"
        );
    }

    #[test]
    fn test_codec_from_kind() {
        assert_eq!(
            AnimationCodec::from_kind(FormatKind::AnimationGif),
            Some(AnimationCodec::Gif)
        );
        assert_eq!(AnimationCodec::from_kind(FormatKind::StillImage), None);
    }
}
