//! scadgen OpenSCAD backend
//!
//! Runs the OpenSCAD command line to produce images, 2D documents, animation
//! frames and 3D models for one preset at a time.
//!
//! # Architecture
//!
//! ```text
//! dispatcher -> Renderer (trait) -> OpenScad -> CommandExecutor (trait) -> sh -c
//!                                      |
//!                                      +-> <output>.summary.json -> RenderSummary
//! ```
//!
//! The [`CommandExecutor`] seam is also used by the post-processing steps
//! (frame encoding, mosaics) so that tests can record commands instead of
//! running external tools.

pub mod error;
pub mod executor;
pub mod openscad;
pub mod renderer;
pub mod shell;

pub use error::{ExecError, ExecResult, RenderError, RenderResult};
pub use executor::{CommandExecutor, ExecutorConfig, ShellExecutor, DEFAULT_MAX_OUTPUT_BYTES};
pub use openscad::{OpenScad, OPENSCAD_PATH_ENV};
pub use renderer::{
    artifact_path, frame_pattern, frame_suffix, model_path, thumbnail_path, Renderer,
    ANIMATION_FRAME_SUFFIX, THUMBNAIL_SUFFIX,
};
