//! Task results and the renderer's machine-readable summary.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Result of one successful task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSummary {
    /// Produced artifact. For animation frames this is a glob pattern.
    pub file: PathBuf,
    /// Model source the artifact was produced from.
    pub model_file: PathBuf,
    /// Captured output of every command run for this task.
    pub output: String,
    /// Statistics reported by the renderer.
    pub summary: RenderSummary,
}

impl OutputSummary {
    pub fn new(file: impl Into<PathBuf>, model_file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            model_file: model_file.into(),
            output: String::new(),
            summary: RenderSummary::default(),
        }
    }

    /// Appends captured command output to the log.
    pub fn append_output(&mut self, output: &str) {
        self.output.push_str(output);
    }

    /// Returns true if the artifact is a still image.
    pub fn is_still_image(&self) -> bool {
        crate::format::OutputFormat::is_still_image_path(&self.file)
    }
}

/// Summary file written by the renderer (`--summary all --summary-file`).
///
/// Every section is optional: older engines omit some of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RenderSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera: Option<CameraSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<GeometrySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CacheSummary {
    pub cgal_cache: CacheStats,
    pub geometry_cache: CacheStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CacheStats {
    pub bytes: u64,
    pub entries: u64,
    pub max_size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CameraSummary {
    pub distance: f64,
    pub fov: f64,
    pub rotation: [f64; 3],
    pub translation: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GeometrySummary {
    pub bounding_box: BoundingBox,
    pub dimensions: u32,
    pub facets: u64,
    pub simple: bool,
    pub vertices: u64,
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BoundingBox {
    pub max: [f64; 3],
    pub min: [f64; 3],
    pub size: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TimeSummary {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    pub milliseconds: u64,
    /// Human readable duration, e.g. `0:00:01.250`.
    pub time: String,
    /// Total duration in milliseconds.
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_engine_summary() {
        let json = r#"{
            "geometry": {
                "dimensions": 3,
                "simple": true,
                "vertices": 8,
                "facets": 6,
                "bounding_box": { "min": [0, 0, 0], "max": [10, 10, 10], "size": [10, 10, 10] }
            },
            "time": { "hours": 0, "minutes": 0, "seconds": 1, "milliseconds": 250, "time": "0:00:01.250", "total": 1250 }
        }"#;
        let summary: RenderSummary = serde_json::from_str(json).unwrap();
        let geometry = summary.geometry.unwrap();
        assert_eq!(geometry.vertices, 8);
        assert_eq!(geometry.bounding_box.size, [10.0, 10.0, 10.0]);
        assert_eq!(summary.time.unwrap().total, 1250);
        assert!(summary.camera.is_none());
        assert!(summary.cache.is_none());
    }

    #[test]
    fn test_is_still_image() {
        assert!(OutputSummary::new("gen/a_p1.png", "a.scad").is_still_image());
        assert!(!OutputSummary::new("gen/a_p1.3mf", "a.scad").is_still_image());
    }

    #[test]
    fn test_append_output() {
        let mut out = OutputSummary::new("x.png", "x.scad");
        out.append_output("one\n");
        out.append_output("two\n");
        assert_eq!(out.output, "one\ntwo\n");
    }
}
