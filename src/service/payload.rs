//! Multipart payload assembly for model-run submissions.
//!
//! The field layout is built as plain data first and only converted into a
//! multipart form at the edge, so every operation speaks the same wire
//! dialect and the layout itself stays testable: independent variables ride
//! as one ordered JSON list, scalars as individual text fields, and the
//! data source contributes either file parts or a table name, never both.

use reqwest::blocking::multipart::{Form, Part};

use crate::model::ValidatedRequest;
use crate::source::DataSource;

/// Field carrying the ordered JSON list of independent variables.
pub const FIELD_INDEPENDENT_VARS: &str = "independent_vars";
/// Field carrying the dependent variable name.
pub const FIELD_DEPENDENT_VAR: &str = "dependent_var";
/// Field carrying the backend table name for database sources.
pub const FIELD_TABLE: &str = "table";
/// Field carrying the scaler choice for XGBoost runs.
pub const FIELD_SCALER: &str = "scaler";
/// Part name for uploaded data files (repeated per file).
pub const FIELD_FILES: &str = "files";
/// Part name for the saved-model artifact in run mode.
pub const FIELD_MODEL: &str = "model";

/// One entry of a multipart payload before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FormField {
    Text {
        name: &'static str,
        value: String,
    },
    File {
        name: &'static str,
        file_name: String,
        bytes: Vec<u8>,
    },
}

/// Lay out the submission payload for a validated request.
///
/// Serializing the variable list can only fail on pathological names, but
/// the error is still propagated rather than swallowed.
pub(crate) fn submit_fields(
    validated: &ValidatedRequest<'_>,
) -> Result<Vec<FormField>, serde_json::Error> {
    let request = validated.request;
    let mut fields = vec![FormField::Text {
        name: FIELD_INDEPENDENT_VARS,
        value: serde_json::to_string(&request.independent_vars)?,
    }];
    if let Some(dependent) = &request.dependent_var {
        if !dependent.trim().is_empty() {
            fields.push(FormField::Text {
                name: FIELD_DEPENDENT_VAR,
                value: dependent.clone(),
            });
        }
    }
    if let Some(scaler) = request.scaler {
        fields.push(FormField::Text {
            name: FIELD_SCALER,
            value: scaler.wire_value().to_string(),
        });
    }
    attach_source(&mut fields, &request.source);
    if let Some(artifact) = &request.model_artifact {
        fields.push(FormField::File {
            name: FIELD_MODEL,
            file_name: artifact.name.clone(),
            bytes: artifact.bytes.clone(),
        });
    }
    Ok(fields)
}

/// Lay out the discovery payload: just the data files, no variables yet.
pub(crate) fn fields_discovery(source: &DataSource) -> Vec<FormField> {
    let mut fields = Vec::new();
    attach_source(&mut fields, source);
    fields
}

/// Encode a field layout into a multipart form.
pub(crate) fn into_form(fields: Vec<FormField>) -> Form {
    let mut form = Form::new();
    for field in fields {
        form = match field {
            FormField::Text { name, value } => form.text(name, value),
            FormField::File {
                name,
                file_name,
                bytes,
            } => form.part(name, Part::bytes(bytes).file_name(file_name)),
        };
    }
    form
}

fn attach_source(fields: &mut Vec<FormField>, source: &DataSource) {
    match source {
        DataSource::LocalParts { files } => {
            for file in files {
                fields.push(FormField::File {
                    name: FIELD_FILES,
                    file_name: file.name.clone(),
                    bytes: file.bytes.clone(),
                });
            }
        }
        DataSource::LocalArchive { file } => {
            fields.push(FormField::File {
                name: FIELD_FILES,
                file_name: file.name.clone(),
                bytes: file.bytes.clone(),
            });
        }
        DataSource::DatabaseTable { name } => {
            fields.push(FormField::Text {
                name: FIELD_TABLE,
                value: name.clone(),
            });
        }
        DataSource::None => {}
    }
}
