//! Output format classification.
//!
//! Every requested format string maps to exactly one [`OutputFormat`], and every
//! format belongs to exactly one [`FormatKind`]. The generation dispatcher
//! matches on the kind, so adding a format is a new variant plus one arm in
//! [`OutputFormat::kind`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SpecError;

/// How a format is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    /// Raster still image rendered directly by the engine.
    StillImage,
    /// Vector or paginated 2D document with metadata.
    Document2d,
    /// Frame sequence encoded to animated WEBP.
    AnimationWebp,
    /// Frame sequence encoded to looping GIF.
    AnimationGif,
    /// Structured 3D package carrying embedded metadata.
    Package3d,
    /// Plain 3D mesh or 2D/debug export.
    Model,
}

impl FormatKind {
    /// Returns true for both animation variants.
    pub fn is_animation(&self) -> bool {
        matches!(self, FormatKind::AnimationWebp | FormatKind::AnimationGif)
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FormatKind::StillImage => "image",
            FormatKind::Document2d => "document",
            FormatKind::AnimationWebp => "animation (webp)",
            FormatKind::AnimationGif => "animation (gif)",
            FormatKind::Package3d => "package",
            FormatKind::Model => "model",
        };
        write!(f, "{}", s)
    }
}

/// A requested output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OutputFormat {
    /// PNG image.
    Png,
    /// PDF document.
    Pdf,
    /// SVG drawing.
    Svg,
    /// DXF drawing.
    Dxf,
    /// Animated WEBP.
    Webp,
    /// Animated GIF.
    Gif,
    /// 3D Manufacturing Format package.
    ThreeMf,
    /// STL (engine default encoding).
    Stl,
    /// ASCII STL.
    AsciiStl,
    /// Binary STL.
    BinStl,
    /// Object File Format.
    Off,
    /// VRML.
    Wrl,
    /// Additive Manufacturing File.
    Amf,
    /// Wavefront OBJ.
    Obj,
    /// POV-Ray scene.
    Pov,
    /// Flattened CSG tree.
    Csg,
    /// Abstract syntax tree dump.
    Ast,
}

/// Formats generated when none are requested.
pub const DEFAULT_FORMATS: &[OutputFormat] =
    &[OutputFormat::Png, OutputFormat::Webp, OutputFormat::ThreeMf];

impl OutputFormat {
    /// Every known format, in the order they are listed to users.
    pub const ALL: &'static [OutputFormat] = &[
        OutputFormat::Png,
        OutputFormat::Pdf,
        OutputFormat::Svg,
        OutputFormat::Dxf,
        OutputFormat::Webp,
        OutputFormat::Gif,
        OutputFormat::ThreeMf,
        OutputFormat::Stl,
        OutputFormat::AsciiStl,
        OutputFormat::BinStl,
        OutputFormat::Off,
        OutputFormat::Wrl,
        OutputFormat::Amf,
        OutputFormat::Obj,
        OutputFormat::Pov,
        OutputFormat::Csg,
        OutputFormat::Ast,
    ];

    /// Name used in configuration, on the command line and as the engine's
    /// `--export-format` value.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Svg => "svg",
            OutputFormat::Dxf => "dxf",
            OutputFormat::Webp => "webp",
            OutputFormat::Gif => "gif",
            OutputFormat::ThreeMf => "3mf",
            OutputFormat::Stl => "stl",
            OutputFormat::AsciiStl => "asciistl",
            OutputFormat::BinStl => "binstl",
            OutputFormat::Off => "off",
            OutputFormat::Wrl => "wrl",
            OutputFormat::Amf => "amf",
            OutputFormat::Obj => "obj",
            OutputFormat::Pov => "pov",
            OutputFormat::Csg => "csg",
            OutputFormat::Ast => "ast",
        }
    }

    /// File extension of the produced artifact.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::AsciiStl | OutputFormat::BinStl => "stl",
            other => other.as_str(),
        }
    }

    /// Extra file name suffix keeping STL encodings apart on disk.
    pub fn file_suffix(&self) -> &'static str {
        match self {
            OutputFormat::AsciiStl => "_ascii",
            OutputFormat::BinStl => "_binary",
            _ => "",
        }
    }

    /// Classifies the format. First match wins: `3mf` is a 3D export but is
    /// dispatched as a package.
    pub fn kind(&self) -> FormatKind {
        match self {
            OutputFormat::Png => FormatKind::StillImage,
            OutputFormat::Pdf | OutputFormat::Svg | OutputFormat::Dxf => FormatKind::Document2d,
            OutputFormat::Webp => FormatKind::AnimationWebp,
            OutputFormat::Gif => FormatKind::AnimationGif,
            OutputFormat::ThreeMf => FormatKind::Package3d,
            OutputFormat::Stl
            | OutputFormat::AsciiStl
            | OutputFormat::BinStl
            | OutputFormat::Off
            | OutputFormat::Wrl
            | OutputFormat::Amf
            | OutputFormat::Obj
            | OutputFormat::Pov
            | OutputFormat::Csg
            | OutputFormat::Ast => FormatKind::Model,
        }
    }

    /// Returns true if files with this path's extension are still images.
    pub fn is_still_image_path(path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(OutputFormat::Png.extension()))
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        OutputFormat::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == wanted)
            .ok_or_else(|| SpecError::UnknownFormat {
                format: s.to_string(),
            })
    }
}

impl TryFrom<String> for OutputFormat {
    type Error = SpecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OutputFormat> for String {
    fn from(value: OutputFormat) -> Self {
        value.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_parse_known_formats() {
        for format in OutputFormat::ALL {
            assert_eq!(format.as_str().parse::<OutputFormat>().unwrap(), *format);
        }
        assert_eq!(" PNG ".parse::<OutputFormat>().unwrap(), OutputFormat::Png);
    }

    #[test]
    fn test_parse_unknown_format() {
        let err = "jpeg".parse::<OutputFormat>().unwrap_err();
        assert!(matches!(err, SpecError::UnknownFormat { ref format } if format == "jpeg"));
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(OutputFormat::Png.kind(), FormatKind::StillImage);
        assert_eq!(OutputFormat::Pdf.kind(), FormatKind::Document2d);
        assert_eq!(OutputFormat::Svg.kind(), FormatKind::Document2d);
        assert_eq!(OutputFormat::Webp.kind(), FormatKind::AnimationWebp);
        assert_eq!(OutputFormat::Gif.kind(), FormatKind::AnimationGif);
        assert_eq!(OutputFormat::ThreeMf.kind(), FormatKind::Package3d);
        assert_eq!(OutputFormat::Stl.kind(), FormatKind::Model);
        assert_eq!(OutputFormat::Csg.kind(), FormatKind::Model);
        assert!(FormatKind::AnimationGif.is_animation());
        assert!(!FormatKind::Package3d.is_animation());
    }

    #[test]
    fn test_stl_variants_do_not_collide() {
        let names: Vec<String> = [OutputFormat::Stl, OutputFormat::AsciiStl, OutputFormat::BinStl]
            .iter()
            .map(|f| format!("{}.{}", f.file_suffix(), f.extension()))
            .collect();
        assert_eq!(names, vec![".stl", "_ascii.stl", "_binary.stl"]);
    }

    #[test]
    fn test_still_image_path() {
        assert!(OutputFormat::is_still_image_path(Path::new("gen/a_p1.png")));
        assert!(OutputFormat::is_still_image_path(Path::new("gen/A.PNG")));
        assert!(!OutputFormat::is_still_image_path(Path::new("gen/a_p1.webp")));
        assert!(!OutputFormat::is_still_image_path(Path::new("gen/a_p1")));
    }

    #[test]
    fn test_serde_roundtrip_as_string() {
        let json = serde_json::to_string(&OutputFormat::ThreeMf).unwrap();
        assert_eq!(json, "\"3mf\"");
        let parsed: OutputFormat = serde_json::from_str("\"binstl\"").unwrap();
        assert_eq!(parsed, OutputFormat::BinStl);
    }
}
