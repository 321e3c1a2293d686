//! Per-panel run workflow: source selection, field discovery, submission,
//! and result delivery as an explicit phase machine.
//!
//! One controller owns one [`ModelRequest`] and talks to one compute
//! service. Service calls run on background threads (see [`jobs`]); the
//! owner pumps [`WorkflowController::poll`] to apply finished work. Local
//! guard failures surface as a status message and never change phase; only
//! service outcomes do.

mod jobs;

use crate::config::AppConfig;
use crate::model::{self, ModelRequest, ModelTool, RunMode, ScalerKind};
use crate::service::{ComputeClient, RunOutcome, routes};
use crate::source::{self, DataSource, FileKind, PickedFile};

use jobs::{FieldsJob, FieldsResult, JobMessage, RunJob, RunResult, WorkflowJobs};

/// Where a panel's run workflow currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowPhase {
    /// No usable source yet.
    Idle,
    /// A source was adopted; field discovery is in flight.
    FieldsLoading,
    /// Fields are loaded; the request can be edited and submitted.
    FieldsReady,
    /// A run was submitted and awaits its outcome.
    Submitting,
    /// The latest submission produced a [`RunOutcome`].
    ResultReady,
    /// Discovery or submission failed; see
    /// [`error_message`](WorkflowController::error_message).
    Error,
}

pub struct WorkflowController {
    client: ComputeClient,
    tool: ModelTool,
    upload_limit_bytes: u64,
    request: ModelRequest,
    fields: Vec<String>,
    outcome: Option<RunOutcome>,
    phase: WorkflowPhase,
    /// Latest local refusal (rejected selection, failed guard). Cleared on
    /// the next user action.
    status: Option<String>,
    /// Message behind the `Error` phase.
    error: Option<String>,
    jobs: WorkflowJobs,
}

impl WorkflowController {
    pub fn new(tool: ModelTool, client: ComputeClient, config: &AppConfig) -> Self {
        let request = ModelRequest {
            tool: Some(tool),
            ..ModelRequest::default()
        };
        Self {
            client,
            tool,
            upload_limit_bytes: config.upload_limit_bytes(),
            request,
            fields: Vec::new(),
            outcome: None,
            phase: WorkflowPhase::Idle,
            status: None,
            error: None,
            jobs: WorkflowJobs::new(),
        }
    }

    pub fn tool(&self) -> ModelTool {
        self.tool
    }

    pub fn phase(&self) -> WorkflowPhase {
        self.phase
    }

    /// Field names discovered for the current source.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Latest completed outcome; kept until the next completed run or a
    /// source change replaces it.
    pub fn outcome(&self) -> Option<&RunOutcome> {
        self.outcome.as_ref()
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn request(&self) -> &ModelRequest {
        &self.request
    }

    /// Switch between training and running a saved model.
    ///
    /// The source, loaded fields, and selections all belong to the previous
    /// mode's request and reset with it.
    pub fn set_mode(&mut self, mode: RunMode) {
        if self.request.mode == mode {
            return;
        }
        self.jobs.cancel_all();
        self.request.mode = mode;
        self.request.clear_source();
        self.fields.clear();
        self.outcome = None;
        self.status = None;
        self.error = None;
        self.phase = WorkflowPhase::Idle;
    }

    /// Resolve a file selection into the panel's source.
    ///
    /// A rejected selection only surfaces its message; whatever source was
    /// in place before stays untouched. A successful one supersedes it and
    /// starts field discovery.
    pub fn select_files(&mut self, files: Vec<PickedFile>) {
        self.status = None;
        match source::resolve_files(files) {
            Ok(resolved) => self.adopt_source(resolved),
            Err(rejection) => self.status = Some(rejection.to_string()),
        }
    }

    /// Pick a backend database table as the source.
    pub fn select_table(&mut self, name: &str) {
        self.status = None;
        match source::resolve_table(name) {
            Ok(resolved) => self.adopt_source(resolved),
            Err(rejection) => self.status = Some(rejection.to_string()),
        }
    }

    fn adopt_source(&mut self, resolved: DataSource) {
        let Some(kind) = resolved.kind() else {
            return;
        };
        let op = match routes::fields_route(self.tool, self.request.mode, kind) {
            Ok(op) => op,
            Err(err) => {
                self.status = Some(err.to_string());
                return;
            }
        };
        // The new source supersedes everything tied to the old one,
        // including any discovery or run still in flight.
        self.jobs.cancel_all();
        self.request.clear_source();
        self.request.source = resolved;
        self.fields.clear();
        self.outcome = None;
        self.error = None;
        if let Some(job) = FieldsJob::for_source(self.client.clone(), op, &self.request.source) {
            self.phase = WorkflowPhase::FieldsLoading;
            self.jobs.begin_fields_load(job);
        }
    }

    /// Add or remove one independent variable. Names outside the loaded
    /// field set are ignored.
    pub fn toggle_independent_var(&mut self, name: &str) {
        if !self.fields.iter().any(|field| field == name) {
            return;
        }
        if let Some(index) = self
            .request
            .independent_vars
            .iter()
            .position(|picked| picked == name)
        {
            self.request.independent_vars.remove(index);
        } else {
            self.request.independent_vars.push(name.to_string());
            model::dedup_fields(&mut self.request.independent_vars);
        }
    }

    pub fn set_dependent_var(&mut self, name: Option<String>) {
        self.request.dependent_var = name.filter(|name| !name.trim().is_empty());
    }

    pub fn set_scaler(&mut self, scaler: Option<ScalerKind>) {
        self.request.scaler = scaler;
    }

    /// Attach the trained model file for a saved-model run. Files that are
    /// not model artifacts are refused with a message.
    pub fn attach_model_artifact(&mut self, file: PickedFile) {
        if file.kind() != FileKind::ModelArtifact {
            self.status = Some(format!("'{}' is not a trained model file", file.name));
            return;
        }
        self.status = None;
        self.request.model_artifact = Some(file);
    }

    pub fn clear_model_artifact(&mut self) {
        self.request.model_artifact = None;
    }

    /// Submit the current request.
    ///
    /// Every refusal — a run already in flight, a failing local guard, an
    /// oversized upload, an unroutable combination — sets a status message
    /// and leaves the phase alone. Only an accepted submission transitions
    /// to `Submitting`.
    pub fn submit(&mut self) {
        self.status = None;
        if self.jobs.submit_in_progress() {
            self.status = Some("A run is already in progress".to_string());
            return;
        }
        if self.jobs.fields_in_progress() {
            self.status = Some("Field discovery has not finished yet".to_string());
            return;
        }
        let tool = match self.request.validate(&self.fields) {
            Ok(validated) => validated.tool,
            Err(err) => {
                self.status = Some(err.to_string());
                return;
            }
        };
        let upload = self.request.source.total_bytes();
        if upload > self.upload_limit_bytes {
            self.status = Some(format!(
                "Selection exceeds the {} MiB upload limit",
                self.upload_limit_bytes / (1024 * 1024)
            ));
            return;
        }
        let Some(kind) = self.request.source.kind() else {
            return;
        };
        let op = match routes::submit_route(tool, self.request.mode, kind) {
            Ok(op) => op,
            Err(err) => {
                self.status = Some(err.to_string());
                return;
            }
        };
        let job = RunJob {
            client: self.client.clone(),
            op,
            request: self.request.clone(),
            fields: self.fields.clone(),
        };
        self.error = None;
        self.phase = WorkflowPhase::Submitting;
        self.jobs.begin_submit(job);
    }

    /// Apply every finished background job. Call once per update tick.
    pub fn poll(&mut self) {
        while let Ok(message) = self.jobs.try_recv_message() {
            match message {
                JobMessage::FieldsLoaded(loaded) => self.on_fields_loaded(loaded),
                JobMessage::RunFinished(finished) => self.on_run_finished(finished),
            }
        }
    }

    /// Leave the `Error` phase, back to wherever the loaded state allows.
    pub fn acknowledge_error(&mut self) {
        if self.phase != WorkflowPhase::Error {
            return;
        }
        self.error = None;
        self.phase = if self.fields.is_empty() {
            WorkflowPhase::Idle
        } else {
            WorkflowPhase::FieldsReady
        };
    }

    fn on_fields_loaded(&mut self, loaded: FieldsResult) {
        if !self.jobs.accepts_fields(loaded.request_id) {
            // A newer source superseded this discovery.
            return;
        }
        self.jobs.clear_fields_load();
        match loaded.result {
            Ok(mut fields) => {
                model::dedup_fields(&mut fields);
                self.request.retain_known_fields(&fields);
                self.fields = fields;
                self.phase = WorkflowPhase::FieldsReady;
            }
            Err(message) => {
                self.fields.clear();
                self.error = Some(message);
                self.phase = WorkflowPhase::Error;
            }
        }
    }

    fn on_run_finished(&mut self, finished: RunResult) {
        if !self.jobs.accepts_submit(finished.request_id) {
            return;
        }
        self.jobs.clear_submit();
        match finished.result {
            Ok(outcome) => {
                self.outcome = Some(outcome);
                self.phase = WorkflowPhase::ResultReady;
            }
            Err(message) => {
                self.error = Some(message);
                self.phase = WorkflowPhase::Error;
            }
        }
    }
}
