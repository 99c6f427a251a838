//! Configuration resolution.
//!
//! Options are resolved as built-in defaults, then the config document, then
//! command-line flags. Documents may be YAML or JSON; both are read into a
//! JSON value and merged key by key, so a config file only needs the keys it
//! changes.

use anyhow::{Context, Result};
use scadgen_spec::{GenerationOptions, SpecError};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Extensions probed when looking for `<base>.config.<ext>` next to a source.
const CONFIG_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Values given on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub output_dir: Option<String>,
    pub formats: Option<Vec<String>>,
    pub preset: Option<String>,
    pub parallel_jobs: Option<usize>,
    pub debug: bool,
    pub mosaic: bool,
    pub slideshow: Option<String>,
    pub slideshow_interval: Option<u32>,
    pub embed_thumbnail: bool,
    pub embed_sources: bool,
}

impl CliOverrides {
    /// Writes the overrides into an options document.
    ///
    /// Boolean flags only ever switch a feature on.
    pub fn apply(&self, doc: &mut Value) {
        let mut patch = Map::new();
        if let Some(dir) = &self.output_dir {
            patch.insert("outputDir".into(), json!(dir));
        }
        if let Some(formats) = &self.formats {
            patch.insert("outFormats".into(), json!(formats));
        }
        if let Some(preset) = &self.preset {
            patch.insert("onlyParameterSet".into(), json!(preset));
        }
        if let Some(jobs) = self.parallel_jobs {
            patch.insert("parallelJobs".into(), json!(jobs));
        }
        if self.mosaic {
            patch.insert("generateMosaic".into(), json!(true));
        }
        if let Some(format) = &self.slideshow {
            patch.insert("generateSlideShow".into(), json!(format));
        }
        if let Some(interval) = self.slideshow_interval {
            patch.insert("slideShowInterval".into(), json!(interval));
        }
        if self.embed_thumbnail {
            patch.insert("embedThumbnailIn3mf".into(), json!(true));
        }
        if self.embed_sources {
            patch.insert("embedSourcesIn3mf".into(), json!(true));
        }
        if self.debug {
            patch.insert("openScadOptions".into(), json!({ "debug": true }));
        }
        merge(doc, Value::Object(patch));
    }
}

/// Looks for `<dir>/<base>.config.{yaml,yml,json}` next to `source`.
pub fn find_config_file(source: &Path) -> Option<PathBuf> {
    let stem = source.file_stem()?.to_string_lossy();
    let dir = source.parent().unwrap_or_else(|| Path::new(""));
    CONFIG_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.config.{}", stem, ext)))
        .find(|candidate| candidate.is_file())
}

/// Reads a YAML or JSON document into a JSON value.
pub fn load_config_value(path: &Path) -> Result<Value, SpecError> {
    let content = fs::read_to_string(path).map_err(|source| SpecError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    // YAML is a superset of JSON, one parser covers both.
    let value: Value =
        serde_yaml::from_str(&content).map_err(|e| SpecError::parse(path, e.to_string()))?;
    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        _ => Err(SpecError::parse(path, "expected a mapping at the top level")),
    }
}

/// Merges `overlay` into `base`. Objects merge key by key; anything else,
/// arrays included, replaces the base value.
pub fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Resolves the options of a run over `source`.
///
/// An explicit `config` that does not exist is an error; without one the
/// document next to the source is used if present.
pub fn resolve_options(
    source: &Path,
    config: Option<&Path>,
    overrides: &CliOverrides,
) -> Result<GenerationOptions> {
    let mut doc = serde_json::to_value(GenerationOptions::default())
        .context("Failed to serialize default options")?;

    let config_path = match config {
        Some(path) if !path.exists() => {
            return Err(SpecError::ConfigNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file(source),
    };
    if let Some(path) = &config_path {
        let value = load_config_value(path)?;
        merge(&mut doc, value);
    }

    merge(&mut doc, json!({ "fileName": source }));
    overrides.apply(&mut doc);

    let options: GenerationOptions = serde_json::from_value(doc).map_err(|e| {
        SpecError::parse(
            config_path.as_deref().unwrap_or(source),
            format!("invalid options: {}", e),
        )
    })?;
    options.validate()?;
    Ok(options)
}
