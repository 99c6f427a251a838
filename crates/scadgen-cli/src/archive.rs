//! 3MF package enrichment.
//!
//! A 3MF file is an OPC zip container. [`Enhance3mf`] loads every entry in
//! memory, adds files under `Metadata/`, registers the thumbnail in the
//! package relationships and rewrites the archive on [`Enhance3mf::save`].

use regex::Regex;
use scadgen_spec::{CodedError, ParameterFileSet};
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Directory receiving embedded files.
pub const METADATA_DIR: &str = "Metadata";
/// Package relationships part.
pub const RELS_ENTRY: &str = "_rels/.rels";
/// Content types part.
pub const CONTENT_TYPES_ENTRY: &str = "[Content_Types].xml";
/// Relationship id reserved for the thumbnail.
pub const THUMBNAIL_REL_ID: &str = "rel999";
/// OPC thumbnail relationship type.
pub const THUMBNAIL_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/thumbnail";

/// Result type for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors raised while enriching a package.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to open package {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid package {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// The package has no `_rels/.rels` part.
    #[error("No rels found in {path}")]
    MissingRelationships { path: PathBuf },

    #[error("Malformed relationships in {path}: {message}")]
    InvalidRelationships { path: PathBuf, message: String },

    #[error("Failed to read {path} for embedding: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write package {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CodedError for ArchiveError {
    fn code(&self) -> &'static str {
        match self {
            ArchiveError::Open { .. } => "ARCHIVE_001",
            ArchiveError::Zip { .. } => "ARCHIVE_002",
            ArchiveError::MissingRelationships { .. } => "ARCHIVE_003",
            ArchiveError::InvalidRelationships { .. } => "ARCHIVE_004",
            ArchiveError::ReadFile { .. } => "ARCHIVE_005",
            ArchiveError::Write { .. } => "ARCHIVE_006",
        }
    }

    fn category(&self) -> &'static str {
        "archive"
    }
}

struct Entry {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    is_dir: bool,
}

/// An opened 3MF package.
pub struct Enhance3mf {
    path: PathBuf,
    entries: Vec<Entry>,
}

impl Enhance3mf {
    /// Loads every entry of the package at `path`.
    pub fn open(path: impl Into<PathBuf>) -> ArchiveResult<Self> {
        let path = path.into();
        let file = fs::File::open(&path).map_err(|source| ArchiveError::Open {
            path: path.clone(),
            source,
        })?;
        let zip_err = |source| ArchiveError::Zip {
            path: path.clone(),
            source,
        };
        let mut archive = ZipArchive::new(file).map_err(zip_err)?;

        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(zip_err)?;
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut data)
                .map_err(|source| ArchiveError::Open {
                    path: path.clone(),
                    source,
                })?;
            entries.push(Entry {
                name: entry.name().to_string(),
                data,
                compression: entry.compression(),
                is_dir: entry.is_dir(),
            });
        }

        Ok(Self { path, entries })
    }

    /// Path of the package on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entry names in archive order.
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Content of one entry.
    pub fn entry(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.data.as_slice())
    }

    /// Companion image of the package: `x.3mf` uses `x.png`.
    pub fn thumbnail_source(&self) -> PathBuf {
        self.path.with_extension("png")
    }

    /// Entry name of the thumbnail: `x.3mf` stores `Metadata/x.png`.
    pub fn thumbnail_entry(&self) -> String {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}/{}.png", METADATA_DIR, stem)
    }

    /// Embeds `png` as [`Self::thumbnail_entry`] and registers it as the
    /// package thumbnail.
    ///
    /// Existing relationships are kept; a previous thumbnail relationship
    /// with the reserved id is replaced.
    pub fn add_thumbnail(&mut self, png: &Path) -> ArchiveResult<()> {
        let rels = self
            .entry(RELS_ENTRY)
            .ok_or_else(|| ArchiveError::MissingRelationships {
                path: self.path.clone(),
            })?;
        let rels = String::from_utf8(rels.to_vec()).map_err(|e| {
            ArchiveError::InvalidRelationships {
                path: self.path.clone(),
                message: e.to_string(),
            }
        })?;

        let name = self.thumbnail_entry();
        self.put(&name, read_embedded(png)?);
        let target = format!("/{}", name);
        let rels = insert_thumbnail_relationship(&rels, &target).ok_or_else(|| {
            ArchiveError::InvalidRelationships {
                path: self.path.clone(),
                message: "missing <Relationships> element".to_string(),
            }
        })?;
        self.put(RELS_ENTRY, rels.into_bytes());

        if let Some(types) = self.entry(CONTENT_TYPES_ENTRY) {
            let types = String::from_utf8_lossy(types).into_owned();
            if let Some(updated) = ensure_png_content_type(&types) {
                self.put(CONTENT_TYPES_ENTRY, updated.into_bytes());
            }
        }
        Ok(())
    }

    /// Copies the model source into the package.
    pub fn add_source_file(&mut self, path: &Path) -> ArchiveResult<()> {
        self.add_file(path).map(|_| ())
    }

    /// Copies the parameter document into the package.
    pub fn add_parameter_set(&mut self, params: &ParameterFileSet) -> ArchiveResult<()> {
        self.add_file(&params.parameter_file).map(|_| ())
    }

    /// Rewrites the package with all changes.
    pub fn save(&self) -> ArchiveResult<()> {
        let write_err = |source| ArchiveError::Write {
            path: self.path.clone(),
            source,
        };
        let zip_err = |source| ArchiveError::Zip {
            path: self.path.clone(),
            source,
        };

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for entry in &self.entries {
            let options = SimpleFileOptions::default().compression_method(entry.compression);
            if entry.is_dir {
                writer
                    .add_directory(entry.name.as_str(), options)
                    .map_err(zip_err)?;
            } else {
                writer
                    .start_file(entry.name.as_str(), options)
                    .map_err(zip_err)?;
                writer.write_all(&entry.data).map_err(write_err)?;
            }
        }
        let buffer = writer.finish().map_err(zip_err)?.into_inner();
        fs::write(&self.path, buffer).map_err(write_err)
    }

    /// Stores `path` under `Metadata/` and returns the entry name.
    fn add_file(&mut self, path: &Path) -> ArchiveResult<String> {
        let data = read_embedded(path)?;
        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = format!("{}/{}", METADATA_DIR, file_name);
        self.put(&name, data);
        Ok(name)
    }

    fn put(&mut self, name: &str, data: Vec<u8>) {
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.data = data,
            None => self.entries.push(Entry {
                name: name.to_string(),
                data,
                compression: CompressionMethod::Deflated,
                is_dir: false,
            }),
        }
    }
}

fn read_embedded(path: &Path) -> ArchiveResult<Vec<u8>> {
    fs::read(path).map_err(|source| ArchiveError::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Appends the thumbnail relationship to a `_rels/.rels` document.
/// Returns `None` if the document has no `Relationships` element.
fn insert_thumbnail_relationship(rels: &str, target: &str) -> Option<String> {
    let previous = Regex::new(&format!(
        r#"<Relationship\b[^>]*\bId\s*=\s*["']{}["'][^>]*(?:/>|>\s*</Relationship\s*>)\s*"#,
        THUMBNAIL_REL_ID
    ))
    .ok()?;
    let mut rels = previous.replace_all(rels, "").into_owned();

    let empty = Regex::new(r"<Relationships\b([^>]*?)\s*/>").ok()?;
    if !rels.contains("</Relationships>") {
        if !empty.is_match(&rels) {
            return None;
        }
        rels = empty
            .replace(&rels, "<Relationships$1></Relationships>")
            .into_owned();
    }

    let relationship = format!(
        r#"<Relationship Target="{}" Id="{}" Type="{}"/>"#,
        xml_escape(target),
        THUMBNAIL_REL_ID,
        THUMBNAIL_REL_TYPE
    );
    let close = rels.rfind("</Relationships>")?;
    rels.insert_str(close, &relationship);
    Some(rels)
}

/// Adds a `png` default content type. Returns `None` if already present or
/// the document has no `Types` element.
fn ensure_png_content_type(types: &str) -> Option<String> {
    let has_png = Regex::new(r#"(?i)<Default\b[^>]*\bExtension="png""#).ok()?;
    if has_png.is_match(types) {
        return None;
    }
    let close = types.rfind("</Types>")?;
    let mut updated = types.to_string();
    updated.insert_str(close, r#"<Default Extension="png" ContentType="image/png"/>"#);
    Some(updated)
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Target="/3D/3dmodel.model" Id="rel0" Type="http://schemas.microsoft.com/3dmanufacturing/2013/01/3dmodel"/></Relationships>"#;

    const TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="model" ContentType="application/vnd.ms-package.3dmanufacturing-3dmodel+xml"/></Types>"#;

    fn write_package(path: &Path, with_rels: bool) {
        let mut writer = ZipWriter::new(fs::File::create(path).unwrap());
        let options = SimpleFileOptions::default();
        writer.start_file(CONTENT_TYPES_ENTRY, options).unwrap();
        writer.write_all(TYPES.as_bytes()).unwrap();
        if with_rels {
            writer.start_file(RELS_ENTRY, options).unwrap();
            writer.write_all(RELS.as_bytes()).unwrap();
        }
        writer.start_file("3D/3dmodel.model", options).unwrap();
        writer.write_all(b"<model/>").unwrap();
        writer.finish().unwrap();
    }

    fn relationship_count(xml: &str) -> usize {
        xml.matches("<Relationship ").count()
    }

    #[test]
    fn test_add_thumbnail_keeps_existing_relationship() {
        let dir = tempfile::tempdir().unwrap();
        let package = dir.path().join("widget_p1.3mf");
        write_package(&package, true);
        fs::write(dir.path().join("widget_p1.png"), b"\x89PNG fake").unwrap();

        let mut enhance = Enhance3mf::open(&package).unwrap();
        let png = enhance.thumbnail_source();
        enhance.add_thumbnail(&png).unwrap();
        enhance.save().unwrap();

        let reopened = Enhance3mf::open(&package).unwrap();
        let rels = String::from_utf8(reopened.entry(RELS_ENTRY).unwrap().to_vec()).unwrap();
        assert_eq!(relationship_count(&rels), 2);
        assert!(rels.contains(r#"Id="rel0""#));
        assert!(rels.contains(r#"Target="/Metadata/widget_p1.png" Id="rel999""#));
        assert!(rels.contains(THUMBNAIL_REL_TYPE));
        assert_eq!(
            reopened.entry("Metadata/widget_p1.png").unwrap(),
            b"\x89PNG fake"
        );
        assert_eq!(reopened.entry("3D/3dmodel.model").unwrap(), b"<model/>");

        let types = String::from_utf8_lossy(reopened.entry(CONTENT_TYPES_ENTRY).unwrap());
        assert!(types.contains(r#"<Default Extension="png" ContentType="image/png"/>"#));
    }

    #[test]
    fn test_add_thumbnail_twice_replaces_reserved_id() {
        let dir = tempfile::tempdir().unwrap();
        let package = dir.path().join("widget_p1.3mf");
        write_package(&package, true);
        fs::write(dir.path().join("widget_p1.png"), b"png").unwrap();

        let mut enhance = Enhance3mf::open(&package).unwrap();
        let png = enhance.thumbnail_source();
        enhance.add_thumbnail(&png).unwrap();
        enhance.add_thumbnail(&png).unwrap();

        let rels = String::from_utf8(enhance.entry(RELS_ENTRY).unwrap().to_vec()).unwrap();
        assert_eq!(relationship_count(&rels), 2);
        let types = String::from_utf8_lossy(enhance.entry(CONTENT_TYPES_ENTRY).unwrap());
        assert_eq!(types.matches(r#"Extension="png""#).count(), 1);
    }

    #[test]
    fn test_missing_relationships() {
        let dir = tempfile::tempdir().unwrap();
        let package = dir.path().join("widget_p1.3mf");
        write_package(&package, false);
        fs::write(dir.path().join("widget_p1.png"), b"png").unwrap();

        let mut enhance = Enhance3mf::open(&package).unwrap();
        let png = enhance.thumbnail_source();
        let err = enhance.add_thumbnail(&png).unwrap_err();
        assert!(matches!(err, ArchiveError::MissingRelationships { .. }));
        assert_eq!(err.to_string(), format!("No rels found in {}", package.display()));
        assert_eq!(err.code(), "ARCHIVE_003");
    }

    #[test]
    fn test_add_sources() {
        let dir = tempfile::tempdir().unwrap();
        let package = dir.path().join("widget_p1.3mf");
        write_package(&package, true);
        let source = dir.path().join("widget.scad");
        let params = dir.path().join("widget.json");
        fs::write(&source, "cube(10);").unwrap();
        fs::write(&params, r#"{"parameterSets":{}}"#).unwrap();

        let mut enhance = Enhance3mf::open(&package).unwrap();
        enhance.add_source_file(&source).unwrap();
        enhance
            .add_parameter_set(&ParameterFileSet::new(&params, "p1"))
            .unwrap();
        enhance.save().unwrap();

        let reopened = Enhance3mf::open(&package).unwrap();
        assert_eq!(reopened.entry("Metadata/widget.scad").unwrap(), b"cube(10);");
        assert!(reopened.entry("Metadata/widget.json").is_some());
        // relationships untouched
        assert_eq!(reopened.entry(RELS_ENTRY).unwrap(), RELS.as_bytes());
    }

    #[test]
    fn test_missing_companion_png() {
        let dir = tempfile::tempdir().unwrap();
        let package = dir.path().join("widget_p1.3mf");
        write_package(&package, true);

        let mut enhance = Enhance3mf::open(&package).unwrap();
        let png = enhance.thumbnail_source();
        assert!(matches!(
            enhance.add_thumbnail(&png),
            Err(ArchiveError::ReadFile { .. })
        ));
    }

    #[test]
    fn test_thumbnail_is_stored_under_package_name() {
        let dir = tempfile::tempdir().unwrap();
        let package = dir.path().join("widget_p1.3mf");
        write_package(&package, true);
        let png = dir.path().join("widget_p1_thumbnail.png");
        fs::write(&png, b"thumb").unwrap();

        let mut enhance = Enhance3mf::open(&package).unwrap();
        enhance.add_thumbnail(&png).unwrap();

        assert_eq!(enhance.thumbnail_entry(), "Metadata/widget_p1.png");
        assert_eq!(enhance.entry("Metadata/widget_p1.png").unwrap(), b"thumb");
        assert!(enhance.entry("Metadata/widget_p1_thumbnail.png").is_none());
    }

    #[test]
    fn test_previous_thumbnail_in_any_form_is_replaced() {
        let forms = [
            r#"<Relationship Target="/Metadata/old.png" Id='rel999' Type="t"/>"#,
            r#"<Relationship Target="/Metadata/old.png" Id="rel999" Type="t"></Relationship>"#,
            r#"<Relationship Id = 'rel999' Target="/Metadata/old.png" Type="t" >
  </Relationship>"#,
        ];
        for old in forms {
            let rels = format!(
                r#"<Relationships xmlns="x"><Relationship Target="/3D/3dmodel.model" Id="rel0" Type="m"/>{}</Relationships>"#,
                old
            );
            let out = insert_thumbnail_relationship(&rels, "/Metadata/new.png").unwrap();
            assert_eq!(out.matches("rel999").count(), 1, "{out}");
            assert!(!out.contains("old.png"), "{out}");
            assert!(out.contains(r#"Id="rel0""#));
            assert!(out.ends_with(
                r#"<Relationship Target="/Metadata/new.png" Id="rel999" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/thumbnail"/></Relationships>"#
            ));
        }
    }

    #[test]
    fn test_insert_into_empty_relationships() {
        let rels = r#"<Relationships xmlns="x"/>"#;
        let out = insert_thumbnail_relationship(rels, "/Metadata/a.png").unwrap();
        assert!(out.starts_with(r#"<Relationships xmlns="x"><Relationship "#));
        assert!(out.ends_with("</Relationships>"));
        assert!(insert_thumbnail_relationship("<Other/>", "/x").is_none());
    }
}
