//! Input-source resolution for model runs.
//!
//! A run can be fed from loose shapefile parts, a single zip archive, or a
//! named database table. Selections arrive as an unordered pile of files;
//! [`resolve_files`] turns that pile into exactly one well-formed
//! [`DataSource`] or a [`SourceRejection`] explaining why it cannot.

use thiserror::Error;

/// A file chosen by the user, held in memory until upload.
///
/// Only the name is inspected locally (extension sniffing); the bytes are
/// forwarded verbatim to the compute service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl PickedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Classification of this file by extension.
    pub fn kind(&self) -> FileKind {
        classify(&self.name)
    }
}

/// Extension classes recognized in a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// A zip archive expected to contain a complete shapefile set.
    Archive,
    /// One loose shapefile component (`.shp`, `.dbf`, `.shx`, `.prj`).
    ShapePart,
    /// A previously trained model (`.pkl`, `.joblib`).
    ModelArtifact,
    /// Anything else; never accepted.
    Unsupported,
}

/// Classify a file name by its extension, case-insensitively.
pub fn classify(name: &str) -> FileKind {
    let lower = name.to_ascii_lowercase();
    let Some(ext) = lower.rsplit_once('.').map(|(_, ext)| ext) else {
        return FileKind::Unsupported;
    };
    match ext {
        "zip" => FileKind::Archive,
        "shp" | "dbf" | "shx" | "prj" => FileKind::ShapePart,
        "pkl" | "joblib" => FileKind::ModelArtifact,
        _ => FileKind::Unsupported,
    }
}

/// The resolved input for one model run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DataSource {
    /// Loose shapefile parts uploaded individually.
    LocalParts { files: Vec<PickedFile> },
    /// One zip archive uploaded as-is.
    LocalArchive { file: PickedFile },
    /// A table already present in the backend database.
    DatabaseTable { name: String },
    /// Nothing selected yet.
    #[default]
    None,
}

/// Coarse source kind used for routing; `DataSource::None` has none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    LocalParts,
    LocalArchive,
    DatabaseTable,
}

impl DataSource {
    /// Routing kind of this source, if one is selected.
    pub fn kind(&self) -> Option<SourceKind> {
        match self {
            DataSource::LocalParts { .. } => Some(SourceKind::LocalParts),
            DataSource::LocalArchive { .. } => Some(SourceKind::LocalArchive),
            DataSource::DatabaseTable { .. } => Some(SourceKind::DatabaseTable),
            DataSource::None => None,
        }
    }

    /// Short human-readable summary for logs and CLI output.
    pub fn describe(&self) -> String {
        match self {
            DataSource::LocalParts { files } => format!("{} shapefile part(s)", files.len()),
            DataSource::LocalArchive { file } => format!("archive {}", file.name),
            DataSource::DatabaseTable { name } => format!("table {name}"),
            DataSource::None => "no source".to_string(),
        }
    }

    /// Total bytes this source would upload; zero for tables and `None`.
    pub fn total_bytes(&self) -> u64 {
        match self {
            DataSource::LocalParts { files } => {
                files.iter().map(|file| file.bytes.len() as u64).sum()
            }
            DataSource::LocalArchive { file } => file.bytes.len() as u64,
            DataSource::DatabaseTable { .. } | DataSource::None => 0,
        }
    }
}

/// Why a selection could not become a [`DataSource`].
///
/// Checks run in a fixed order so the user always sees the most structural
/// problem first: mixing beats counting beats unknown extensions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceRejection {
    /// Selection contains both an archive and loose shapefile parts.
    #[error("Select either one zip archive or loose shapefile parts, not both")]
    MixedSelection,
    /// Selection contains more than one archive.
    #[error("Select a single zip archive; {count} were chosen")]
    MultipleArchives { count: usize },
    /// Selection contains a file of an unrecognized type.
    #[error("Unsupported file in selection: {name}")]
    UnsupportedFile { name: String },
    /// Nothing usable was selected.
    #[error("No data source selected")]
    NoSource,
}

/// Resolve a file selection into a data source.
///
/// Rejection order is part of the contract: (1) archive mixed with parts,
/// (2) more than one archive, (3) any unrecognized file, (4) empty
/// selection. Model artifacts are not data and fall under (3).
pub fn resolve_files(files: Vec<PickedFile>) -> Result<DataSource, SourceRejection> {
    let archives = files
        .iter()
        .filter(|file| file.kind() == FileKind::Archive)
        .count();
    let parts = files
        .iter()
        .filter(|file| file.kind() == FileKind::ShapePart)
        .count();

    if archives > 0 && parts > 0 {
        return Err(SourceRejection::MixedSelection);
    }
    if archives > 1 {
        return Err(SourceRejection::MultipleArchives { count: archives });
    }
    if let Some(other) = files
        .iter()
        .find(|file| !matches!(file.kind(), FileKind::Archive | FileKind::ShapePart))
    {
        return Err(SourceRejection::UnsupportedFile {
            name: other.name.clone(),
        });
    }
    if files.is_empty() {
        return Err(SourceRejection::NoSource);
    }

    if archives == 1 {
        let file = files
            .into_iter()
            .find(|file| file.kind() == FileKind::Archive)
            .ok_or(SourceRejection::NoSource)?;
        Ok(DataSource::LocalArchive { file })
    } else {
        Ok(DataSource::LocalParts { files })
    }
}

/// Resolve a backend table name into a data source.
///
/// Blank names count as no selection. Choosing a table is exclusive with
/// file selections; the workflow controller enforces the supersede.
pub fn resolve_table(name: &str) -> Result<DataSource, SourceRejection> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(SourceRejection::NoSource);
    }
    Ok(DataSource::DatabaseTable {
        name: trimmed.to_string(),
    })
}
