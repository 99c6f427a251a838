//! scadgen spec library
//!
//! Types shared by the scadgen crates: run options, parameter set documents,
//! output format classification, task summaries and metadata templating.
//!
//! # Example
//!
//! ```
//! use scadgen_spec::{FormatKind, GenerationOptions, OutputFormat, ParameterSet};
//!
//! let options = GenerationOptions::for_file("models/widget.scad");
//! assert_eq!(options.requested_formats(), vec!["png", "webp", "3mf"]);
//!
//! let format: OutputFormat = "3mf".parse().unwrap();
//! assert_eq!(format.kind(), FormatKind::Package3d);
//!
//! let set = ParameterSet::new().with_preset("small", [("size", "10")]);
//! assert_eq!(set.select_presets(Some("small")).len(), 1);
//! ```
//!
//! # Modules
//!
//! - [`error`]: Setup-phase errors and the [`CodedError`] trait
//! - [`format`]: Output formats and their dispatch kind
//! - [`options`]: Run-wide and renderer options with built-in defaults
//! - [`parameter_set`]: Preset documents
//! - [`summary`]: Task results and renderer summaries
//! - [`vars`]: `__TOKEN__` substitution in metadata fields

pub mod error;
pub mod format;
pub mod options;
pub mod parameter_set;
pub mod summary;
pub mod vars;

pub use error::{CodedError, SpecError, SpecResult};
pub use format::{FormatKind, OutputFormat, DEFAULT_FORMATS};
pub use options::{
    AnimOptions, GenerationOptions, ImageOptions, ImageSize, MosaicGeometry, MosaicOptions,
    MosaicTiles, Option3mf, OptionPdf, OptionSvg, RenderBackend, RenderOptions, SlideShowFormat,
    DEFAULT_OUTPUT_DIR,
};
pub use parameter_set::{
    InlineParameterSet, ParameterFileSet, ParameterSet, ParameterValues, Preset,
    ANIMATION_ROTATION,
};
pub use summary::{OutputSummary, RenderSummary};
pub use vars::{substitute, SubstitutionContext};
