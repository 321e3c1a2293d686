//! Classification of compute-service responses into run outcomes.
//!
//! The service grew across several backend generations and its response
//! bodies are structurally heterogeneous: newer ones carry an explicit
//! `kind` tag, older ones must be inferred from which blocks are present,
//! and database-trained legacy models omit diagnostics entirely. Everything
//! a 2xx can carry is normalized here into [`RunOutcome`]; everything else
//! becomes a typed [`ApiError`].

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

/// Errors surfaced by compute-service calls.
///
/// `Service` carries the server's own message for a non-2xx status;
/// `Malformed` means a 2xx body that could not be classified. Validation
/// failures never reach this type; they are rejected before any request.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The request never completed (connect, send, or read failure).
    #[error("Could not reach the compute service: {0}")]
    Transport(String),
    /// The service answered with a failure status.
    #[error("{message}")]
    Service { status: u16, message: String },
    /// The service answered 2xx with a body this client cannot interpret.
    #[error("Unrecognized response from the compute service: {0}")]
    Malformed(String),
    /// The configured base URL is not a valid URL.
    #[error("Invalid service base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

/// A successfully classified service response.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// A training run: metrics, coefficients, diagnostics, downloads.
    Train(TrainReport),
    /// A saved-model run: downloads and an optional preview.
    Run(RunReport),
}

/// Everything a training run reports back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainReport {
    /// Named fit metrics (r², RMSE, AIC, ...).
    pub metrics: BTreeMap<String, f64>,
    /// Coefficients or importances, largest magnitude first.
    pub coefficients: Vec<(String, f64)>,
    pub diagnostics: DiagnosticsBlock,
    pub downloads: BTreeMap<ArtifactKind, String>,
}

/// Result of applying a saved model to new data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub downloads: BTreeMap<ArtifactKind, String>,
    /// Where to fetch the GeoJSON preview, if the service provided or the
    /// client derived one.
    pub preview_url: Option<String>,
}

/// Raw arrays behind the four diagnostic charts.
///
/// Always present on a classified training outcome; legacy responses that
/// omit the block get an all-empty one so chart projection stays total.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagnosticsBlock {
    pub residuals: Vec<f64>,
    pub residual_bins: Vec<f64>,
    pub residual_counts: Vec<f64>,
    pub actual_values: Vec<f64>,
    pub predicted_values: Vec<f64>,
}

impl DiagnosticsBlock {
    pub fn is_empty(&self) -> bool {
        self.residuals.is_empty()
            && self.residual_bins.is_empty()
            && self.residual_counts.is_empty()
            && self.actual_values.is_empty()
            && self.predicted_values.is_empty()
    }
}

/// Downloadable artifacts a run can produce.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ArtifactKind {
    /// The trained model file.
    Model,
    /// The rendered PDF report.
    Report,
    /// The predicted feature archive.
    Predictions,
    /// Tabular CSV export.
    Csv,
    /// Anything the server names that this client does not know.
    Other(String),
}

impl ArtifactKind {
    fn from_key(key: &str) -> Self {
        match key.to_ascii_lowercase().as_str() {
            "model" | "model_file" | "trained_model" => ArtifactKind::Model,
            "report" | "pdf" | "report_pdf" => ArtifactKind::Report,
            "predictions" | "predicted" | "output" | "shapefile" => ArtifactKind::Predictions,
            "csv" | "table_csv" => ArtifactKind::Csv,
            _ => ArtifactKind::Other(key.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ArtifactKind::Model => "trained model",
            ArtifactKind::Report => "report",
            ArtifactKind::Predictions => "predictions",
            ArtifactKind::Csv => "csv export",
            ArtifactKind::Other(name) => name,
        }
    }
}

const KIND_TRAIN: &str = "train";
const KIND_RUN: &str = "run";

#[derive(Debug, Deserialize)]
struct ResponseWire {
    /// Explicit discriminant; newer backends always send it.
    kind: Option<String>,
    metrics: Option<BTreeMap<String, f64>>,
    coefficients: Option<BTreeMap<String, f64>>,
    diagnostics: Option<DiagnosticsWire>,
    downloads: Option<BTreeMap<String, String>>,
    preview_url: Option<String>,
    error: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DiagnosticsWire {
    #[serde(default)]
    residuals: Option<Vec<f64>>,
    #[serde(default)]
    residual_bins: Option<Vec<f64>>,
    #[serde(default)]
    residual_counts: Option<Vec<f64>>,
    #[serde(default)]
    actual_values: Option<Vec<f64>>,
    #[serde(default)]
    predicted_values: Option<Vec<f64>>,
}

/// Classify one complete HTTP exchange into an outcome or error.
///
/// Order of decisions: failure statuses first (server message wins over a
/// generic one), then the explicit `kind` tag, then presence-based
/// inference for tagless legacy bodies.
pub fn classify_response(status: u16, body: &[u8]) -> Result<RunOutcome, ApiError> {
    if !(200..300).contains(&status) {
        return Err(ApiError::Service {
            status,
            message: service_message(status, body),
        });
    }

    let text = std::str::from_utf8(body)
        .map_err(|_| ApiError::Malformed("response body is not UTF-8".to_string()))?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Malformed("empty response body".to_string()));
    }
    let wire: ResponseWire = serde_json::from_str(trimmed)
        .map_err(|err| ApiError::Malformed(format!("{err}: {}", excerpt(trimmed))))?;

    match wire.kind.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some(KIND_TRAIN) => Ok(RunOutcome::Train(build_train(wire))),
        Some(KIND_RUN) => Ok(RunOutcome::Run(build_run(wire))),
        Some(other) => Err(ApiError::Malformed(format!(
            "unknown result kind '{other}'"
        ))),
        None => classify_untagged(wire),
    }
}

/// Legacy bodies carry no tag; a present metrics or diagnostics block means
/// a training outcome, their absence means a saved-model run.
fn classify_untagged(wire: ResponseWire) -> Result<RunOutcome, ApiError> {
    if wire.metrics.is_some() || wire.diagnostics.is_some() {
        return Ok(RunOutcome::Train(build_train(wire)));
    }
    if wire.downloads.is_some() || wire.preview_url.is_some() {
        return Ok(RunOutcome::Run(build_run(wire)));
    }
    let message = wire
        .error
        .or(wire.message)
        .unwrap_or_else(|| "no recognizable result blocks".to_string());
    Err(ApiError::Malformed(message))
}

fn build_train(wire: ResponseWire) -> TrainReport {
    TrainReport {
        metrics: wire.metrics.unwrap_or_default(),
        coefficients: order_coefficients(wire.coefficients.unwrap_or_default()),
        diagnostics: wire.diagnostics.map(build_diagnostics).unwrap_or_default(),
        downloads: map_downloads(wire.downloads),
    }
}

fn build_run(wire: ResponseWire) -> RunReport {
    RunReport {
        downloads: map_downloads(wire.downloads),
        preview_url: wire.preview_url,
    }
}

fn build_diagnostics(wire: DiagnosticsWire) -> DiagnosticsBlock {
    DiagnosticsBlock {
        residuals: wire.residuals.unwrap_or_default(),
        residual_bins: wire.residual_bins.unwrap_or_default(),
        residual_counts: wire.residual_counts.unwrap_or_default(),
        actual_values: wire.actual_values.unwrap_or_default(),
        predicted_values: wire.predicted_values.unwrap_or_default(),
    }
}

fn map_downloads(downloads: Option<BTreeMap<String, String>>) -> BTreeMap<ArtifactKind, String> {
    downloads
        .unwrap_or_default()
        .into_iter()
        .map(|(key, url)| (ArtifactKind::from_key(&key), url))
        .collect()
}

fn order_coefficients(coefficients: BTreeMap<String, f64>) -> Vec<(String, f64)> {
    let mut ordered: Vec<(String, f64)> = coefficients.into_iter().collect();
    ordered.sort_by(|(a_name, a), (b_name, b)| {
        b.abs()
            .partial_cmp(&a.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a_name.cmp(b_name))
    });
    ordered
}

/// Typed failure for a non-2xx exchange, used by every operation that does
/// not go through [`classify_response`].
pub(crate) fn failure_from(status: u16, body: &[u8]) -> ApiError {
    ApiError::Service {
        status,
        message: service_message(status, body),
    }
}

/// Best error message for a failure status: the server's own `error` or
/// `message` field when the body carries one, a generic line otherwise.
fn service_message(status: u16, body: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(body) {
        let trimmed = text.trim();
        if let Ok(wire) = serde_json::from_str::<ResponseWire>(trimmed) {
            if let Some(message) = wire.error.or(wire.message) {
                if !message.trim().is_empty() {
                    return message;
                }
            }
        }
    }
    format!("request failed: {status}")
}

fn excerpt(text: &str) -> String {
    const MAX: usize = 120;
    if text.len() <= MAX {
        return text.to_string();
    }
    let mut cut = MAX;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(status: u16, body: &str) -> Result<RunOutcome, ApiError> {
        classify_response(status, body.as_bytes())
    }

    #[test]
    fn explicit_train_kind_wins() {
        let body = r#"{
            "kind": "train",
            "metrics": {"r2": 0.81, "rmse": 120.5},
            "coefficients": {"area": 0.3, "zone": -0.7},
            "diagnostics": {
                "residuals": [1.0, -2.0],
                "residual_bins": [-5.0, 0.0, 5.0],
                "residual_counts": [1.0, 1.0, 0.0],
                "actual_values": [10.0, 20.0],
                "predicted_values": [11.0, 18.0]
            },
            "downloads": {"model": "/dl/model.pkl", "report": "/dl/report.pdf"}
        }"#;
        let outcome = classify(200, body).unwrap();
        let RunOutcome::Train(report) = outcome else {
            panic!("expected a training outcome");
        };
        assert_eq!(report.metrics["r2"], 0.81);
        assert_eq!(report.coefficients[0], ("zone".to_string(), -0.7));
        assert_eq!(report.diagnostics.residuals, vec![1.0, -2.0]);
        assert_eq!(report.downloads[&ArtifactKind::Model], "/dl/model.pkl");
    }

    #[test]
    fn explicit_run_kind_wins_even_with_odd_extras() {
        let body = r#"{
            "kind": "run",
            "downloads": {"predictions": "/dl/out.zip"},
            "preview_url": "/preview?id=7"
        }"#;
        let outcome = classify(200, body).unwrap();
        let RunOutcome::Run(report) = outcome else {
            panic!("expected a run outcome");
        };
        assert_eq!(report.preview_url.as_deref(), Some("/preview?id=7"));
        assert_eq!(report.downloads[&ArtifactKind::Predictions], "/dl/out.zip");
    }

    #[test]
    fn unknown_kind_is_malformed() {
        let err = classify(200, r#"{"kind": "mystery"}"#).unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)));
        assert!(err.to_string().contains("mystery"));
    }

    #[test]
    fn untagged_body_with_metrics_is_train() {
        let body = r#"{"metrics": {"r2": 0.5}, "downloads": {"model": "/m.pkl"}}"#;
        let outcome = classify(200, body).unwrap();
        assert!(matches!(outcome, RunOutcome::Train(_)));
    }

    #[test]
    fn untagged_body_with_downloads_only_is_run() {
        let body = r#"{"downloads": {"predictions": "/p.zip"}}"#;
        let outcome = classify(200, body).unwrap();
        assert!(matches!(outcome, RunOutcome::Run(_)));
    }

    #[test]
    fn legacy_train_without_diagnostics_gets_an_empty_block() {
        let body = r#"{"kind": "train", "metrics": {"aic": 812.0}}"#;
        let RunOutcome::Train(report) = classify(200, body).unwrap() else {
            panic!("expected a training outcome");
        };
        assert!(report.diagnostics.is_empty());
        assert!(report.coefficients.is_empty());
    }

    #[test]
    fn partial_diagnostics_fill_missing_arrays() {
        let body = r#"{
            "kind": "train",
            "metrics": {},
            "diagnostics": {"residuals": [0.5]}
        }"#;
        let RunOutcome::Train(report) = classify(200, body).unwrap() else {
            panic!("expected a training outcome");
        };
        assert_eq!(report.diagnostics.residuals, vec![0.5]);
        assert!(report.diagnostics.residual_bins.is_empty());
    }

    #[test]
    fn failure_status_carries_server_message() {
        let err = classify(422, r#"{"error": "field 'value' not numeric"}"#).unwrap_err();
        let ApiError::Service { status, message } = err else {
            panic!("expected a service error");
        };
        assert_eq!(status, 422);
        assert_eq!(message, "field 'value' not numeric");
    }

    #[test]
    fn failure_status_without_message_gets_a_generic_one() {
        let err = classify(500, "<html>boom</html>").unwrap_err();
        let ApiError::Service { message, .. } = err else {
            panic!("expected a service error");
        };
        assert_eq!(message, "request failed: 500");
    }

    #[test]
    fn ok_status_with_unparseable_body_is_malformed() {
        let err = classify(200, "not json at all").unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)));
    }

    #[test]
    fn ok_status_with_only_an_error_field_is_malformed_with_that_message() {
        let err = classify(200, r#"{"error": "backend exploded quietly"}"#).unwrap_err();
        let ApiError::Malformed(message) = err else {
            panic!("expected malformed");
        };
        assert_eq!(message, "backend exploded quietly");
    }

    #[test]
    fn empty_body_is_malformed() {
        let err = classify(200, "   ").unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)));
    }

    #[test]
    fn unknown_download_keys_are_preserved() {
        let body = r#"{"kind": "run", "downloads": {"geodatabase": "/g.gdb"}}"#;
        let RunOutcome::Run(report) = classify(200, body).unwrap() else {
            panic!("expected a run outcome");
        };
        assert_eq!(
            report.downloads[&ArtifactKind::Other("geodatabase".to_string())],
            "/g.gdb"
        );
    }

    #[test]
    fn coefficients_sort_by_magnitude_then_name() {
        let body = r#"{
            "kind": "train",
            "metrics": {},
            "coefficients": {"a": 0.5, "b": -0.5, "c": 2.0}
        }"#;
        let RunOutcome::Train(report) = classify(200, body).unwrap() else {
            panic!("expected a training outcome");
        };
        let names: Vec<&str> = report
            .coefficients
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }
}
