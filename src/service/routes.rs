//! Static routing table from (tool, mode, source kind) to service paths.
//!
//! Every supported combination is written out; there is no fallback row.
//! A combination missing from the table is a typed error, not a guess, so
//! adding a tool or source kind forces this table to say what it routes to.

use thiserror::Error;
use url::Url;

use crate::model::{ModelTool, RunMode};
use crate::source::SourceKind;

/// Listing of backend tables available as sources.
pub const LIST_TABLES_PATH: &str = "api/tables";
/// GeoJSON preview of a predicted output artifact.
pub const PREVIEW_PATH: &str = "api/preview";
/// Persist a predicted output artifact into a named table.
pub const SAVE_PREDICTIONS_PATH: &str = "api/predictions/save";

/// One resolvable backend operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub path: &'static str,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path)
    }
}

/// How field discovery reaches the backend for a given source kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldsOperation {
    /// Upload the selected files and read the columns back.
    Upload(Operation),
    /// Ask for the columns of an existing table by name.
    Table,
}

/// A combination the service does not implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{tool} does not support this source in {} mode", mode.label())]
pub struct RouteError {
    pub tool: ModelTool,
    pub mode: RunMode,
    pub kind: SourceKind,
}

/// Resolve the submit operation for a run.
pub fn submit_route(
    tool: ModelTool,
    mode: RunMode,
    kind: SourceKind,
) -> Result<Operation, RouteError> {
    use ModelTool::*;
    use RunMode::*;
    use SourceKind::*;

    let path = match (tool, mode, kind) {
        (LinearRegression, Train, LocalParts | LocalArchive) => "api/linear/train-upload",
        (LinearRegression, Train, DatabaseTable) => "api/linear/train-table",
        (LinearRegression, RunSaved, LocalParts | LocalArchive) => "api/linear/run-upload",
        (LinearRegression, RunSaved, DatabaseTable) => "api/linear/run-table",
        (Gwr, Train, LocalParts | LocalArchive) => "api/gwr/train-upload",
        (Gwr, RunSaved, LocalParts | LocalArchive) => "api/gwr/run-upload",
        (Xgboost, Train, LocalParts | LocalArchive) => "api/xgboost/train-upload",
        (Xgboost, RunSaved, LocalParts | LocalArchive) => "api/xgboost/run-upload",
        (Gwr | Xgboost, _, DatabaseTable) => {
            return Err(RouteError { tool, mode, kind });
        }
    };
    Ok(Operation { path })
}

/// Resolve the field-discovery operation for a source kind.
pub fn fields_route(
    tool: ModelTool,
    mode: RunMode,
    kind: SourceKind,
) -> Result<FieldsOperation, RouteError> {
    use ModelTool::*;
    use SourceKind::*;

    match (tool, kind) {
        (LinearRegression, LocalParts | LocalArchive) => Ok(FieldsOperation::Upload(Operation {
            path: "api/linear/fields-upload",
        })),
        (Gwr, LocalParts | LocalArchive) => Ok(FieldsOperation::Upload(Operation {
            path: "api/gwr/fields-upload",
        })),
        (Xgboost, LocalParts | LocalArchive) => Ok(FieldsOperation::Upload(Operation {
            path: "api/xgboost/fields-upload",
        })),
        (LinearRegression, DatabaseTable) => Ok(FieldsOperation::Table),
        (Gwr | Xgboost, DatabaseTable) => Err(RouteError { tool, mode, kind }),
    }
}

/// Path listing the fields of one backend table.
pub fn table_fields_path(table: &str) -> String {
    format!("{LIST_TABLES_PATH}/{table}/fields")
}

/// Compose the preview operation with a predicted-output artifact URL.
///
/// Used when a run outcome names its predicted artifact but the service
/// did not hand back a ready-made preview link.
pub fn preview_url_for(base: &Url, artifact_url: &str) -> Result<Url, url::ParseError> {
    let mut url = base.join(PREVIEW_PATH)?;
    url.query_pairs_mut().append_pair("artifact", artifact_url);
    Ok(url)
}
