//! Blocking client for the compute-service operations.
//!
//! Thin and stateless: every method resolves a URL against the configured
//! base, sends one request through the shared HTTP client, and hands the
//! status and bounded body to the classifier. Request ids only exist for
//! log correlation; the service itself is stateless per request.

use std::io::{self, Write};
use std::time::Duration;

use serde::Deserialize;
use url::Url;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::http_client;
use crate::model::ValidatedRequest;
use crate::predictions::PredictionCollection;
use crate::source::DataSource;

use super::outcome::{self, ApiError, ArtifactKind, RunOutcome};
use super::payload;
use super::routes::{self, Operation};

const MAX_FIELDS_RESPONSE_BYTES: usize = 256 * 1024;
const MAX_RESULT_RESPONSE_BYTES: usize = 4 * 1024 * 1024;
const MAX_PREVIEW_RESPONSE_BYTES: usize = 32 * 1024 * 1024;
const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;
const MAX_ARTIFACT_DOWNLOAD_BYTES: usize = 256 * 1024 * 1024;

/// Client for one configured compute service.
#[derive(Debug, Clone)]
pub struct ComputeClient {
    base: Url,
    timeout: Duration,
}

impl ComputeClient {
    /// Build a client for the given base URL and request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        // A trailing slash keeps Url::join from eating the last path segment.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base = Url::parse(&normalized).map_err(|err| ApiError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: err.to_string(),
        })?;
        Ok(Self { base, timeout })
    }

    /// Build a client from the persisted settings.
    pub fn from_config(config: &AppConfig) -> Result<Self, ApiError> {
        Self::new(
            &config.service.base_url,
            Duration::from_secs(config.service.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Discover field names by uploading the selected files.
    pub fn fields_by_upload(
        &self,
        op: Operation,
        source: &DataSource,
    ) -> Result<Vec<String>, ApiError> {
        let request_id = Uuid::new_v4();
        tracing::debug!(%request_id, op = %op, source = %source.describe(), "discovering fields");
        let form = payload::into_form(payload::fields_discovery(source));
        let (status, body) = self.post_multipart(self.endpoint(op.path)?, form, MAX_FIELDS_RESPONSE_BYTES)?;
        let fields = parse_fields(status, &body)?;
        tracing::debug!(%request_id, count = fields.len(), "fields discovered");
        Ok(fields)
    }

    /// List the tables available as database sources.
    pub fn list_tables(&self) -> Result<Vec<String>, ApiError> {
        let (status, body) = self.get(
            self.endpoint(routes::LIST_TABLES_PATH)?,
            MAX_FIELDS_RESPONSE_BYTES,
        )?;
        parse_tables(status, &body)
    }

    /// Field names of one backend table.
    pub fn table_fields(&self, table: &str) -> Result<Vec<String>, ApiError> {
        let (status, body) = self.get(
            self.endpoint(&routes::table_fields_path(table))?,
            MAX_FIELDS_RESPONSE_BYTES,
        )?;
        parse_fields(status, &body)
    }

    /// Submit a validated run to its routed operation and classify the
    /// response.
    ///
    /// A run outcome that names a predicted-output artifact but no preview
    /// gets one derived here, so callers never branch on backend vintage.
    pub fn submit(
        &self,
        op: Operation,
        validated: &ValidatedRequest<'_>,
    ) -> Result<RunOutcome, ApiError> {
        let request_id = Uuid::new_v4();
        tracing::info!(
            %request_id,
            op = %op,
            tool = %validated.tool,
            mode = validated.request.mode.label(),
            "submitting model run"
        );
        let fields = payload::submit_fields(validated)
            .map_err(|err| ApiError::Transport(format!("could not encode request body: {err}")))?;
        let form = payload::into_form(fields);
        let (status, body) =
            self.post_multipart(self.endpoint(op.path)?, form, MAX_RESULT_RESPONSE_BYTES)?;
        let mut outcome = outcome::classify_response(status, &body)?;
        if let RunOutcome::Run(report) = &mut outcome {
            if report.preview_url.is_none() {
                if let Some(artifact) = report.downloads.get(&ArtifactKind::Predictions) {
                    report.preview_url = routes::preview_url_for(&self.base, artifact)
                        .ok()
                        .map(Url::into);
                }
            }
        }
        tracing::info!(%request_id, "model run classified");
        Ok(outcome)
    }

    /// Fetch and parse a GeoJSON prediction preview.
    pub fn fetch_preview(&self, preview_url: &str) -> Result<PredictionCollection, ApiError> {
        let url = self.resolve(preview_url)?;
        let (status, body) = self.get(url, MAX_PREVIEW_RESPONSE_BYTES)?;
        if !(200..300).contains(&status) {
            return Err(outcome::failure_from(status, &body));
        }
        PredictionCollection::parse(&body)
            .map_err(|err| ApiError::Malformed(format!("preview: {err}")))
    }

    /// Persist a predicted-output artifact into a named backend table.
    pub fn save_predictions(&self, artifact_url: &str, table: &str) -> Result<(), ApiError> {
        let request_id = Uuid::new_v4();
        tracing::info!(%request_id, table, "saving predictions to table");
        let url = self.endpoint(routes::SAVE_PREDICTIONS_PATH)?;
        let client = http_client::client().map_err(transport)?;
        let response = client
            .post(url)
            .timeout(self.timeout)
            .json(&serde_json::json!({
                "artifact": artifact_url,
                "table": table,
            }))
            .send()
            .map_err(transport)?;
        let status = response.status().as_u16();
        let body = read_limited(response, MAX_ERROR_BODY_BYTES)?;
        if !(200..300).contains(&status) {
            return Err(outcome::failure_from(status, &body));
        }
        Ok(())
    }

    /// Stream a named artifact to a writer, within the download ceiling.
    pub fn download_artifact(
        &self,
        artifact_url: &str,
        writer: &mut impl Write,
    ) -> Result<u64, ApiError> {
        let url = self.resolve(artifact_url)?;
        let client = http_client::client().map_err(transport)?;
        let response = client
            .get(url)
            .timeout(self.timeout)
            .send()
            .map_err(transport)?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = read_limited(response, MAX_ERROR_BODY_BYTES)?;
            return Err(outcome::failure_from(status, &body));
        }
        http_client::copy_response_to_writer(response, writer, MAX_ARTIFACT_DOWNLOAD_BYTES)
            .map_err(map_io)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base.join(path).map_err(|err| ApiError::InvalidBaseUrl {
            url: self.base.to_string(),
            reason: err.to_string(),
        })
    }

    /// Resolve a possibly relative service URL against the base.
    fn resolve(&self, raw: &str) -> Result<Url, ApiError> {
        self.base.join(raw).map_err(|err| ApiError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: err.to_string(),
        })
    }

    fn post_multipart(
        &self,
        url: Url,
        form: reqwest::blocking::multipart::Form,
        max_bytes: usize,
    ) -> Result<(u16, Vec<u8>), ApiError> {
        let client = http_client::client().map_err(transport)?;
        let response = client
            .post(url)
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .map_err(transport)?;
        let status = response.status().as_u16();
        let body = read_limited(response, max_bytes)?;
        Ok((status, body))
    }

    fn get(&self, url: Url, max_bytes: usize) -> Result<(u16, Vec<u8>), ApiError> {
        let client = http_client::client().map_err(transport)?;
        let response = client
            .get(url)
            .timeout(self.timeout)
            .send()
            .map_err(transport)?;
        let status = response.status().as_u16();
        let body = read_limited(response, max_bytes)?;
        Ok((status, body))
    }
}

fn transport(err: reqwest::Error) -> ApiError {
    ApiError::Transport(err.to_string())
}

fn map_io(err: io::Error) -> ApiError {
    match err.kind() {
        io::ErrorKind::InvalidData => ApiError::Malformed(err.to_string()),
        _ => ApiError::Transport(err.to_string()),
    }
}

fn read_limited(
    response: reqwest::blocking::Response,
    max_bytes: usize,
) -> Result<Vec<u8>, ApiError> {
    http_client::read_response_bytes(response, max_bytes).map_err(map_io)
}

#[derive(Debug, Deserialize)]
struct FieldsWire {
    fields: Option<Vec<String>>,
    /// Older backends used `columns`.
    columns: Option<Vec<String>>,
    error: Option<String>,
    message: Option<String>,
}

fn parse_fields(status: u16, body: &[u8]) -> Result<Vec<String>, ApiError> {
    if !(200..300).contains(&status) {
        return Err(outcome::failure_from(status, body));
    }
    let text = std::str::from_utf8(body)
        .map_err(|_| ApiError::Malformed("field list is not UTF-8".to_string()))?;
    let wire: FieldsWire = serde_json::from_str(text.trim())
        .map_err(|err| ApiError::Malformed(format!("field list: {err}")))?;
    wire.fields.or(wire.columns).ok_or_else(|| {
        let message = wire
            .error
            .or(wire.message)
            .unwrap_or_else(|| "no field list in response".to_string());
        ApiError::Malformed(message)
    })
}

#[derive(Debug, Deserialize)]
struct TablesWire {
    tables: Option<Vec<String>>,
    error: Option<String>,
    message: Option<String>,
}

fn parse_tables(status: u16, body: &[u8]) -> Result<Vec<String>, ApiError> {
    if !(200..300).contains(&status) {
        return Err(outcome::failure_from(status, body));
    }
    let text = std::str::from_utf8(body)
        .map_err(|_| ApiError::Malformed("table list is not UTF-8".to_string()))?;
    let wire: TablesWire = serde_json::from_str(text.trim())
        .map_err(|err| ApiError::Malformed(format!("table list: {err}")))?;
    wire.tables.ok_or_else(|| {
        let message = wire
            .error
            .or(wire.message)
            .unwrap_or_else(|| "no table list in response".to_string());
        ApiError::Malformed(message)
    })
}
