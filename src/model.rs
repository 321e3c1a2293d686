//! Model run requests and the local guards that gate submission.
//!
//! A [`ModelRequest`] is assembled incrementally by the workflow controller
//! and validated as a whole right before submission. Validation failures are
//! local: they never reach the network and never change workflow phase.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::source::{DataSource, FileKind, PickedFile};

/// Predictive tool a run executes on the compute service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelTool {
    LinearRegression,
    Gwr,
    Xgboost,
}

impl ModelTool {
    /// Display name for CLI output and logs.
    pub fn label(self) -> &'static str {
        match self {
            ModelTool::LinearRegression => "Linear regression",
            ModelTool::Gwr => "Geographically weighted regression",
            ModelTool::Xgboost => "XGBoost",
        }
    }

    /// Whether this tool accepts a backend database table as its source.
    ///
    /// Only the baseline regression is wired for table inputs; the spatial
    /// and tree tools require uploaded geometry.
    pub fn supports_database_source(self) -> bool {
        matches!(self, ModelTool::LinearRegression)
    }

    /// Whether this tool exposes a feature-scaler choice.
    pub fn has_scaler_option(self) -> bool {
        matches!(self, ModelTool::Xgboost)
    }
}

impl std::str::FromStr for ModelTool {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "linreg" | "linear" | "linear-regression" => Ok(ModelTool::LinearRegression),
            "gwr" => Ok(ModelTool::Gwr),
            "xgboost" | "xgb" => Ok(ModelTool::Xgboost),
            other => Err(format!(
                "Unknown tool '{other}' (expected linreg, gwr, or xgboost)"
            )),
        }
    }
}

impl std::fmt::Display for ModelTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether a run trains a new model or applies a saved one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunMode {
    #[default]
    Train,
    RunSaved,
}

impl RunMode {
    pub fn label(self) -> &'static str {
        match self {
            RunMode::Train => "train",
            RunMode::RunSaved => "run saved model",
        }
    }
}

/// Feature scaler applied before boosting; XGBoost only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalerKind {
    #[default]
    Standard,
    MinMax,
    Robust,
}

impl ScalerKind {
    /// Value sent in the request payload.
    pub fn wire_value(self) -> &'static str {
        match self {
            ScalerKind::Standard => "standard",
            ScalerKind::MinMax => "minmax",
            ScalerKind::Robust => "robust",
        }
    }
}

impl std::str::FromStr for ScalerKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "standard" => Ok(ScalerKind::Standard),
            "minmax" => Ok(ScalerKind::MinMax),
            "robust" => Ok(ScalerKind::Robust),
            other => Err(format!(
                "Unknown scaler '{other}' (expected standard, minmax, or robust)"
            )),
        }
    }
}

/// One fully specified model run, ready to be routed and submitted.
#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    pub tool: Option<ModelTool>,
    pub mode: RunMode,
    pub source: DataSource,
    /// Ordered, deduplicated field names; order is preserved on the wire.
    pub independent_vars: Vec<String>,
    pub dependent_var: Option<String>,
    /// Trained model file, required when `mode` is [`RunMode::RunSaved`].
    pub model_artifact: Option<PickedFile>,
    /// Scaler choice, meaningful for XGBoost only.
    pub scaler: Option<ScalerKind>,
}

/// Local rejection of a request before any network traffic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No data source selected")]
    NoSource,
    #[error("No tool selected")]
    NoTool,
    #[error("Choose at least one independent variable")]
    NoIndependentVars,
    #[error("Choose a dependent variable")]
    NoDependentVar,
    #[error("'{name}' cannot be both dependent and independent")]
    DependentAmongIndependents { name: String },
    #[error("Field '{name}' is not part of the current source")]
    UnknownField { name: String },
    #[error("Attach a trained model file to run a saved model")]
    MissingArtifact,
    #[error("'{name}' is not a trained model file")]
    NotAModelArtifact { name: String },
    #[error("Scaler options apply to XGBoost only")]
    ScalerNotApplicable,
}

impl ModelRequest {
    /// Check every local invariant against the currently loaded field set.
    ///
    /// Passing here is the precondition for submission; a failure is surfaced
    /// as a validation message and causes no transition and no request.
    pub fn validate(&self, fields: &[String]) -> Result<ValidatedRequest<'_>, ValidationError> {
        let tool = self.tool.ok_or(ValidationError::NoTool)?;
        if self.source == DataSource::None {
            return Err(ValidationError::NoSource);
        }
        if self.independent_vars.is_empty() {
            return Err(ValidationError::NoIndependentVars);
        }
        let dependent = match self.mode {
            RunMode::Train => Some(
                self.dependent_var
                    .as_deref()
                    .filter(|name| !name.trim().is_empty())
                    .ok_or(ValidationError::NoDependentVar)?,
            ),
            RunMode::RunSaved => self
                .dependent_var
                .as_deref()
                .filter(|name| !name.trim().is_empty()),
        };
        if let Some(dependent) = dependent {
            if self
                .independent_vars
                .iter()
                .any(|name| name == dependent)
            {
                return Err(ValidationError::DependentAmongIndependents {
                    name: dependent.to_string(),
                });
            }
            if !fields.iter().any(|field| field == dependent) {
                return Err(ValidationError::UnknownField {
                    name: dependent.to_string(),
                });
            }
        }
        for name in &self.independent_vars {
            if !fields.contains(name) {
                return Err(ValidationError::UnknownField { name: name.clone() });
            }
        }
        if self.mode == RunMode::RunSaved {
            let artifact = self
                .model_artifact
                .as_ref()
                .ok_or(ValidationError::MissingArtifact)?;
            if artifact.kind() != FileKind::ModelArtifact {
                return Err(ValidationError::NotAModelArtifact {
                    name: artifact.name.clone(),
                });
            }
        }
        if self.scaler.is_some() && !tool.has_scaler_option() {
            return Err(ValidationError::ScalerNotApplicable);
        }
        Ok(ValidatedRequest {
            request: self,
            tool,
        })
    }

    /// Drop selections that no longer exist in the given field set.
    ///
    /// Called after field discovery so stale picks from a previous source
    /// cannot linger into a submit.
    pub fn retain_known_fields(&mut self, fields: &[String]) {
        self.independent_vars.retain(|name| fields.contains(name));
        if let Some(dependent) = &self.dependent_var {
            if !fields.contains(dependent) {
                self.dependent_var = None;
            }
        }
    }

    /// Reset everything tied to the current source: variables, artifact, and
    /// the source itself.
    pub fn clear_source(&mut self) {
        self.source = DataSource::None;
        self.independent_vars.clear();
        self.dependent_var = None;
        self.model_artifact = None;
    }
}

/// Proof that a request passed [`ModelRequest::validate`].
///
/// Borrows the request so the validated view cannot outlive edits.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedRequest<'a> {
    pub request: &'a ModelRequest,
    pub tool: ModelTool,
}

/// Deduplicate field names in place, keeping first-seen order.
pub fn dedup_fields(names: &mut Vec<String>) {
    let mut seen = Vec::with_capacity(names.len());
    names.retain(|name| {
        if seen.contains(name) {
            false
        } else {
            seen.push(name.clone());
            true
        }
    });
}
