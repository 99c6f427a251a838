//! Parameter set documents (named presets of customizer values).
//!
//! The document lives next to the model source and shares its base name:
//!
//! ```json
//! {
//!   "parameterSets": {
//!     "ball_50": { "part": "ball", "size": "50" }
//!   },
//!   "fileFormatVersion": "1"
//! }
//! ```
//!
//! Preset order is the order of the document.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{SpecError, SpecResult};

/// Customizer values of one preset, in document order.
pub type ParameterValues = Map<String, Value>;

/// Parameter name switching the model into its rotating-animation pose.
pub const ANIMATION_ROTATION: &str = "animation_rotation";

/// One named preset.
#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    pub name: String,
    pub values: ParameterValues,
}

/// A parameter set document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSet {
    #[serde(
        serialize_with = "serialize_presets",
        deserialize_with = "deserialize_presets"
    )]
    pub parameter_sets: Vec<Preset>,
    #[serde(default = "default_format_version")]
    pub file_format_version: String,
}

fn default_format_version() -> String {
    "1".to_string()
}

fn serialize_presets<S: Serializer>(presets: &[Preset], serializer: S) -> Result<S::Ok, S::Error> {
    let map: Map<String, Value> = presets
        .iter()
        .map(|p| (p.name.clone(), Value::Object(p.values.clone())))
        .collect();
    map.serialize(serializer)
}

fn deserialize_presets<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<Preset>, D::Error> {
    let map = Map::<String, Value>::deserialize(deserializer)?;
    map.into_iter()
        .map(|(name, value)| match value {
            Value::Object(values) => Ok(Preset { name, values }),
            other => Err(D::Error::custom(format!(
                "parameter set '{}' must be an object, found {}",
                name, other
            ))),
        })
        .collect()
}

impl ParameterSet {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self {
            parameter_sets: Vec::new(),
            file_format_version: default_format_version(),
        }
    }

    /// Appends a preset (builder style).
    pub fn with_preset<I, K, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.parameter_sets.push(Preset {
            name: name.into(),
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        });
        self
    }

    /// Path of the document co-located with a model source:
    /// `dir/model.scad` becomes `dir/model.json`.
    pub fn path_for_source(source: &Path) -> PathBuf {
        source.with_extension("json")
    }

    /// Loads a document from disk.
    pub fn load(path: &Path) -> SpecResult<Self> {
        if !path.exists() {
            return Err(SpecError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path).map_err(|source| SpecError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content).map_err(|e| SpecError::parse(path, e.to_string()))
    }

    /// Parses a document from JSON text.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serializes the document to pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Looks up a preset by name.
    pub fn preset(&self, name: &str) -> Option<&Preset> {
        self.parameter_sets.iter().find(|p| p.name == name)
    }

    /// Preset names in document order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parameter_sets.iter().map(|p| p.name.as_str())
    }

    /// Selects the presets of a run.
    ///
    /// With no filter every preset is returned in document order. With a filter
    /// the result holds the single matching preset, or nothing; callers treat
    /// an empty selection as [`SpecError::PresetNotFound`].
    pub fn select_presets(&self, only: Option<&str>) -> Vec<&Preset> {
        match only.map(str::trim).filter(|s| !s.is_empty()) {
            None => self.parameter_sets.iter().collect(),
            Some(name) => self.preset(name).into_iter().collect(),
        }
    }

    /// Returns a copy where one preset has `key` set to `value`. Other presets
    /// are untouched. Returns `None` if the preset does not exist.
    pub fn with_parameter(&self, preset: &str, key: &str, value: impl Into<Value>) -> Option<Self> {
        let mut copy = self.clone();
        let target = copy.parameter_sets.iter_mut().find(|p| p.name == preset)?;
        target.values.insert(key.to_string(), value.into());
        Some(copy)
    }
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self::new()
    }
}

/// The input of one task: a parameter document on disk and the preset to use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterFileSet {
    pub parameter_file: PathBuf,
    pub parameter_name: String,
}

impl ParameterFileSet {
    pub fn new(parameter_file: impl Into<PathBuf>, parameter_name: impl Into<String>) -> Self {
        Self {
            parameter_file: parameter_file.into(),
            parameter_name: parameter_name.into(),
        }
    }
}

/// A preset held in memory rather than read from disk by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineParameterSet {
    pub parameter_set: ParameterSet,
    pub parameter_name: String,
}
