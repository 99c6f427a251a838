//! Run-wide generation options and renderer options.
//!
//! Field names follow the on-disk configuration document: camelCase for the
//! run-level keys, and the engine's own snake_case keys inside the per-format
//! option objects (those are forwarded to the engine as `-O section/key=value`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{SpecError, SpecResult};
use crate::format::DEFAULT_FORMATS;

/// Default output directory.
pub const DEFAULT_OUTPUT_DIR: &str = "./gen";

/// Run-wide configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationOptions {
    /// Model source file.
    pub file_name: PathBuf,
    /// Directory receiving every artifact of the run.
    pub output_dir: PathBuf,
    /// Requested formats, in request order. Unknown names are kept and fail at
    /// dispatch time for their own tasks only.
    pub out_formats: Vec<String>,
    /// Restrict the run to a single preset (empty means all).
    pub only_parameter_set: String,
    /// Maximum number of tasks in flight.
    pub parallel_jobs: usize,
    /// Compose a mosaic from the still images of the run.
    pub generate_mosaic: bool,
    /// Mosaic geometry.
    pub mosaic_options: MosaicOptions,
    /// Compose a slideshow from the still images of the run.
    pub generate_slide_show: Option<SlideShowFormat>,
    /// Slideshow frame interval in milliseconds.
    pub slide_show_interval: u32,
    /// Embed the companion PNG as the package thumbnail.
    pub embed_thumbnail_in_3mf: bool,
    /// Embed the model source and parameter set in the package.
    pub embed_sources_in_3mf: bool,
    /// Options forwarded to the renderer.
    pub open_scad_options: RenderOptions,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            file_name: PathBuf::new(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            out_formats: DEFAULT_FORMATS.iter().map(|f| f.as_str().to_string()).collect(),
            only_parameter_set: String::new(),
            parallel_jobs: 1,
            generate_mosaic: false,
            mosaic_options: MosaicOptions::default(),
            generate_slide_show: None,
            slide_show_interval: 1000,
            embed_thumbnail_in_3mf: false,
            embed_sources_in_3mf: false,
            open_scad_options: RenderOptions::default(),
        }
    }
}

impl GenerationOptions {
    /// Creates options for a source file with every other field defaulted.
    pub fn for_file(file_name: impl Into<PathBuf>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Default::default()
        }
    }

    /// Requested formats with duplicates removed (first occurrence wins),
    /// falling back to the default formats when the list is empty.
    pub fn requested_formats(&self) -> Vec<String> {
        let mut formats: Vec<String> = Vec::new();
        for format in &self.out_formats {
            let format = format.trim();
            if format.is_empty() || formats.iter().any(|f| f.eq_ignore_ascii_case(format)) {
                continue;
            }
            formats.push(format.to_string());
        }
        if formats.is_empty() {
            formats = DEFAULT_FORMATS.iter().map(|f| f.as_str().to_string()).collect();
        }
        formats
    }

    /// The preset filter, if one is set.
    pub fn preset_filter(&self) -> Option<&str> {
        let name = self.only_parameter_set.trim();
        (!name.is_empty()).then_some(name)
    }

    /// File name of the source without directory or extension.
    pub fn base_file_name(&self) -> String {
        self.file_name
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Checks the invariants that must hold before a run starts.
    pub fn validate(&self) -> SpecResult<()> {
        if self.file_name.as_os_str().is_empty() {
            return Err(SpecError::invalid_options("fileName must be set"));
        }
        if self.parallel_jobs == 0 {
            return Err(SpecError::invalid_options(
                "parallelJobs must be at least 1",
            ));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(SpecError::invalid_options("outputDir must be set"));
        }
        if self.generate_mosaic {
            let m = &self.mosaic_options;
            if m.tiles.width == 0 || m.tiles.height == 0 {
                return Err(SpecError::invalid_options(
                    "mosaicOptions.tiles must be at least 1x1",
                ));
            }
            if m.geometry.width == 0 || m.geometry.height == 0 {
                return Err(SpecError::invalid_options(
                    "mosaicOptions.geometry must have a positive size",
                ));
            }
        }
        Ok(())
    }

    /// Path of the output directory as given.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// Mosaic (contact sheet) layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MosaicOptions {
    /// Size of one tile and the border around it.
    pub geometry: MosaicGeometry,
    /// Number of tiles per row and column.
    pub tiles: MosaicTiles,
}

/// Tile pixel geometry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MosaicGeometry {
    pub width: u32,
    pub height: u32,
    pub border: u32,
}

impl Default for MosaicGeometry {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            border: 2,
        }
    }
}

/// Tile grid dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MosaicTiles {
    pub width: u32,
    pub height: u32,
}

impl Default for MosaicTiles {
    fn default() -> Self {
        Self {
            width: 2,
            height: 2,
        }
    }
}

/// Slideshow container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlideShowFormat {
    Webp,
    Gif,
}

impl SlideShowFormat {
    /// File extension of the slideshow.
    pub fn extension(&self) -> &'static str {
        match self {
            SlideShowFormat::Webp => "webp",
            SlideShowFormat::Gif => "gif",
        }
    }
}

/// Geometry backend of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RenderBackend {
    #[default]
    Manifold,
    #[serde(rename = "CGAL")]
    Cgal,
}

impl RenderBackend {
    /// Value passed to `--backend`.
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderBackend::Manifold => "Manifold",
            RenderBackend::Cgal => "CGAL",
        }
    }
}

/// Options forwarded to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Engine executable name or path (`openscad`, `openscad-nightly`, ...).
    #[serde(rename = "openScadExecutable")]
    pub open_scad_executable: String,
    pub backend: RenderBackend,
    pub check_parameters: bool,
    pub check_parameter_ranges: bool,
    pub hardwarnings: bool,
    pub quiet: bool,
    pub trust_python: bool,
    pub python_module: Option<String>,
    /// Echo commands and their output, keep intermediate files.
    pub debug: bool,
    #[serde(rename = "imageOptions")]
    pub image_options: ImageOptions,
    #[serde(rename = "animOptions")]
    pub anim_options: AnimOptions,
    #[serde(rename = "option3mf")]
    pub option_3mf: Option3mf,
    #[serde(rename = "optionPdf")]
    pub option_pdf: OptionPdf,
    #[serde(rename = "optionSvg")]
    pub option_svg: OptionSvg,
    /// Experimental engine features; enabled ones become `--enable=<name>`.
    #[serde(rename = "experimentalFeatures")]
    pub experimental_features: BTreeMap<String, bool>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        let experimental_features = [
            ("import_function", true),
            ("lazy_union", true),
            ("predictible_output", true),
            ("roof", true),
            ("textmetrics", true),
            ("object_function", true),
            ("input_driver_dbus", false),
            ("vertex_object_renderers_indexing", false),
            ("python_engine", false),
        ]
        .into_iter()
        .map(|(name, enabled)| (name.to_string(), enabled))
        .collect();

        Self {
            open_scad_executable: "openscad".to_string(),
            backend: RenderBackend::Manifold,
            check_parameters: false,
            check_parameter_ranges: false,
            hardwarnings: false,
            quiet: false,
            trust_python: false,
            python_module: None,
            debug: false,
            image_options: ImageOptions::default(),
            anim_options: AnimOptions::default(),
            option_3mf: Option3mf::default(),
            option_pdf: OptionPdf::default(),
            option_svg: OptionSvg::default(),
            experimental_features,
        }
    }
}

impl RenderOptions {
    /// Names of the enabled experimental features, sorted.
    pub fn enabled_features(&self) -> impl Iterator<Item = &str> {
        self.experimental_features
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(name, _)| name.as_str())
    }
}

/// Pixel size of a rendered image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// Still image rendering options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageOptions {
    pub colorscheme: String,
    pub imgsize: ImageSize,
    /// Adjust camera to look at the object's center.
    pub autocenter: bool,
    /// `translate_x,y,z,rot_x,y,z,dist` or `eye_x,y,z,center_x,y,z`.
    pub camera: Option<String>,
    /// `throwntogether` for the ThrownTogether preview.
    pub preview: Option<String>,
    /// `o` (ortho) or `p` (perspective).
    pub projection: Option<String>,
    /// Full geometry evaluation before rendering.
    pub render: bool,
    /// `axes`, `crosshairs`, `edges` or `scales`.
    pub view: Option<String>,
    /// Adjust camera to fit the object.
    pub viewall: bool,
    /// Stop rendering at n CSG elements.
    pub csglimit: Option<u32>,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            colorscheme: "Starnight".to_string(),
            imgsize: ImageSize {
                width: 1024,
                height: 1024,
            },
            autocenter: false,
            camera: None,
            preview: None,
            projection: None,
            render: false,
            view: None,
            viewall: false,
            csglimit: None,
        }
    }
}

/// Animation frame rendering options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimOptions {
    /// Delay between frames in milliseconds.
    #[serde(rename = "animDelay")]
    pub anim_delay: u32,
    /// Number of frames.
    pub animate: u32,
    /// `<shard>/<num_shards>` for distributed frame rendering.
    pub animate_sharding: Option<String>,
    #[serde(flatten)]
    pub image: ImageOptions,
}

impl Default for AnimOptions {
    fn default() -> Self {
        Self {
            anim_delay: 50,
            animate: 20,
            animate_sharding: None,
            image: ImageOptions {
                imgsize: ImageSize {
                    width: 100,
                    height: 100,
                },
                ..ImageOptions::default()
            },
        }
    }
}

/// 3MF export options (`-O export-3mf/...`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Option3mf {
    /// `model`, `none` or `selected_only`.
    pub color_mode: String,
    pub color: String,
    /// `color` or `basematerial`.
    pub material_type: String,
    pub unit: String,
    pub decimal_precision: String,
    pub add_meta_data: String,
    pub meta_data_copyright: String,
    pub meta_data_description: String,
    pub meta_data_designer: String,
    pub meta_data_license_terms: String,
    pub meta_data_rating: String,
    pub meta_data_title: String,
}

impl Default for Option3mf {
    fn default() -> Self {
        Self {
            color_mode: "model".to_string(),
            color: String::new(),
            material_type: "color".to_string(),
            unit: "millimeter".to_string(),
            decimal_precision: "6".to_string(),
            add_meta_data: "true".to_string(),
            meta_data_copyright: "me 2025".to_string(),
            meta_data_description:
                "__BASE_FILE_NAME__ - __PARAMETER_SET__ (made with OpenSCAD from \"file __FILE_NAME__\")"
                    .to_string(),
            meta_data_designer: "me".to_string(),
            meta_data_license_terms: "CC BY https://creativecommons.org/licenses/by/4.0/".to_string(),
            meta_data_rating: String::new(),
            meta_data_title: "__BASE_FILE_NAME__ - __PARAMETER_SET__".to_string(),
        }
    }
}

/// PDF export options (`-O export-pdf/...`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionPdf {
    pub paper_size: String,
    pub orientation: String,
    pub show_filename: String,
    pub show_scale: String,
    pub show_scale_message: String,
    pub show_grid: String,
    pub grid_size: f64,
    pub add_meta_data: String,
    pub meta_data_title: String,
    pub meta_data_author: String,
    pub meta_data_subject: String,
    pub meta_data_keywords: String,
    pub fill: String,
    pub fill_color: String,
    pub stroke: String,
    pub stroke_color: String,
    pub stroke_width: f64,
}

impl Default for OptionPdf {
    fn default() -> Self {
        Self {
            paper_size: "a4".to_string(),
            orientation: "portrait".to_string(),
            show_filename: "false".to_string(),
            show_scale: "true".to_string(),
            show_scale_message: "true".to_string(),
            show_grid: "false".to_string(),
            grid_size: 10.0,
            add_meta_data: "true".to_string(),
            meta_data_title: "__BASE_FILE_NAME__ - __PARAMETER_SET__".to_string(),
            meta_data_author: "me".to_string(),
            meta_data_subject:
                "__BASE_FILE_NAME__ - __PARAMETER_SET__ (made with OpenSCAD from \"file __FILE_NAME__\")"
                    .to_string(),
            meta_data_keywords: "OpenSCAD, 2D model".to_string(),
            fill: "false".to_string(),
            fill_color: "black".to_string(),
            stroke: "true".to_string(),
            stroke_color: "black".to_string(),
            stroke_width: 0.35,
        }
    }
}

/// SVG export options (`-O export-svg/...`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionSvg {
    pub fill: String,
    pub fill_color: String,
    pub stroke: String,
    pub stroke_color: String,
    pub stroke_width: f64,
}

impl Default for OptionSvg {
    fn default() -> Self {
        Self {
            fill: "false".to_string(),
            fill_color: "white".to_string(),
            stroke: "true".to_string(),
            stroke_color: "black".to_string(),
            stroke_width: 0.35,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_match_documented_values() {
        let options = GenerationOptions::default();
        assert_eq!(options.output_dir, PathBuf::from("./gen"));
        assert_eq!(options.out_formats, vec!["png", "webp", "3mf"]);
        assert_eq!(options.parallel_jobs, 1);
        assert_eq!(options.mosaic_options.geometry.width, 256);
        assert_eq!(options.mosaic_options.tiles.height, 2);
        assert_eq!(options.open_scad_options.anim_options.anim_delay, 50);
        assert_eq!(options.open_scad_options.anim_options.image.imgsize.width, 100);
        assert_eq!(options.open_scad_options.image_options.imgsize.width, 1024);
    }

    #[test]
    fn test_requested_formats_dedup_and_default() {
        let mut options = GenerationOptions::for_file("model.scad");
        options.out_formats = vec!["png".into(), "stl".into(), "PNG".into(), " ".into()];
        assert_eq!(options.requested_formats(), vec!["png", "stl"]);

        options.out_formats.clear();
        assert_eq!(options.requested_formats(), vec!["png", "webp", "3mf"]);
    }

    #[test]
    fn test_validate_rejects_zero_jobs() {
        let mut options = GenerationOptions::for_file("model.scad");
        assert!(options.validate().is_ok());
        options.parallel_jobs = 0;
        assert!(matches!(
            options.validate(),
            Err(SpecError::InvalidOptions { .. })
        ));
    }

    #[test]
    fn test_validate_requires_file_name() {
        let options = GenerationOptions::default();
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_camel_case_keys() {
        let json = serde_json::to_value(GenerationOptions::default()).unwrap();
        assert!(json.get("embedThumbnailIn3mf").is_some());
        assert!(json.get("openScadOptions").is_some());
        let render = &json["openScadOptions"];
        assert!(render.get("openScadExecutable").is_some());
        assert!(render["option3mf"].get("meta_data_title").is_some());
        assert_eq!(render["animOptions"]["animDelay"], 50);
        assert_eq!(render["backend"], "Manifold");
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let options: GenerationOptions = serde_json::from_str(
            r#"{"fileName": "cube.scad", "parallelJobs": 4, "openScadOptions": {"backend": "CGAL"}}"#,
        )
        .unwrap();
        assert_eq!(options.parallel_jobs, 4);
        assert_eq!(options.open_scad_options.backend, RenderBackend::Cgal);
        assert_eq!(options.open_scad_options.open_scad_executable, "openscad");
        assert_eq!(options.base_file_name(), "cube");
    }

    #[test]
    fn test_enabled_features() {
        let options = RenderOptions::default();
        let enabled: Vec<_> = options.enabled_features().collect();
        assert!(enabled.contains(&"roof"));
        assert!(!enabled.contains(&"python_engine"));
    }
}
