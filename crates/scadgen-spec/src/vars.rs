//! Variable substitution in metadata templates.
//!
//! Templates may contain these tokens:
//!
//! | Token | Value |
//! |-------|-------|
//! | `__FILE_NAME__` | source file name with extension |
//! | `__BASE_FILE_NAME__` | source file name without extension |
//! | `__PARAMETER_SET__` | active preset name |
//! | `__GENERATION_DATE__` | ISO-8601 UTC timestamp taken when substituting |
//! | `__PARAMETERS__` | compact JSON of the active preset's values |
//!
//! Replacement is a single left-to-right scan: substituted values are never
//! rescanned, and unknown `__WORDS__` are left as they are.

use chrono::{SecondsFormat, Utc};
use regex::{Captures, Regex};
use std::path::Path;
use std::sync::OnceLock;

use crate::parameter_set::ParameterValues;

const TOKEN_PATTERN: &str =
    r"__(BASE_FILE_NAME|FILE_NAME|PARAMETER_SET|PARAMETERS|GENERATION_DATE)__";

static TOKEN_REGEX: OnceLock<Regex> = OnceLock::new();

fn token_regex() -> &'static Regex {
    TOKEN_REGEX.get_or_init(|| Regex::new(TOKEN_PATTERN).expect("invalid regex pattern"))
}

/// Values available to a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionContext {
    pub file_name: String,
    pub base_file_name: String,
    pub parameter_set: String,
    pub parameters: String,
}

impl SubstitutionContext {
    /// Builds the context of one task.
    pub fn new(source: &Path, preset_name: &str, values: &ParameterValues) -> Self {
        let file_name = source
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let base_file_name = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        // Serializing a map of JSON values cannot fail.
        let parameters = serde_json::to_string(values).unwrap_or_default();
        Self {
            file_name,
            base_file_name,
            parameter_set: preset_name.to_string(),
            parameters,
        }
    }
}

/// Current time in the `__GENERATION_DATE__` format.
pub fn generation_date() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Expands the known tokens of `template`.
pub fn substitute(template: &str, ctx: &SubstitutionContext) -> String {
    let mut date: Option<String> = None;
    token_regex()
        .replace_all(template, |caps: &Captures| match &caps[1] {
            "BASE_FILE_NAME" => ctx.base_file_name.clone(),
            "FILE_NAME" => ctx.file_name.clone(),
            "PARAMETER_SET" => ctx.parameter_set.clone(),
            "PARAMETERS" => ctx.parameters.clone(),
            _ => date.get_or_insert_with(generation_date).clone(),
        })
        .into_owned()
}
