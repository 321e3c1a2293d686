//! Background jobs for one workflow controller.
//!
//! Service calls run on plain threads and report back over an mpsc channel
//! the controller drains in [`poll`](super::WorkflowController::poll). Each
//! job carries a request id; results whose id no longer matches the active
//! request are stale (the source changed underneath them) and get dropped.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
    mpsc::{Receiver, Sender, TryRecvError},
};
use std::thread;

use uuid::Uuid;

use crate::service::{ComputeClient, FieldsOperation, Operation, RunOutcome};
use crate::source::DataSource;

pub(crate) enum JobMessage {
    FieldsLoaded(FieldsResult),
    RunFinished(RunResult),
}

pub(crate) struct FieldsResult {
    pub(crate) request_id: Uuid,
    pub(crate) result: Result<Vec<String>, String>,
}

pub(crate) struct RunResult {
    pub(crate) request_id: Uuid,
    pub(crate) result: Result<RunOutcome, String>,
}

/// One field-discovery call, shaped by how the source reaches the backend.
pub(crate) enum FieldsJob {
    Upload {
        client: ComputeClient,
        op: Operation,
        source: DataSource,
    },
    Table {
        client: ComputeClient,
        name: String,
    },
}

impl FieldsJob {
    pub(crate) fn for_source(
        client: ComputeClient,
        op: FieldsOperation,
        source: &DataSource,
    ) -> Option<Self> {
        match (op, source) {
            (FieldsOperation::Upload(op), source) => Some(FieldsJob::Upload {
                client,
                op,
                source: source.clone(),
            }),
            (FieldsOperation::Table, DataSource::DatabaseTable { name }) => {
                Some(FieldsJob::Table {
                    client,
                    name: name.clone(),
                })
            }
            (FieldsOperation::Table, _) => None,
        }
    }

    fn run(self) -> Result<Vec<String>, String> {
        match self {
            FieldsJob::Upload { client, op, source } => client
                .fields_by_upload(op, &source)
                .map_err(|err| err.to_string()),
            FieldsJob::Table { client, name } => {
                client.table_fields(&name).map_err(|err| err.to_string())
            }
        }
    }
}

/// One run submission; the request was validated before the job was built.
pub(crate) struct RunJob {
    pub(crate) client: ComputeClient,
    pub(crate) op: Operation,
    pub(crate) request: crate::model::ModelRequest,
    pub(crate) fields: Vec<String>,
}

impl RunJob {
    fn run(self) -> Result<RunOutcome, String> {
        let validated = self
            .request
            .validate(&self.fields)
            .map_err(|err| err.to_string())?;
        self.client
            .submit(self.op, &validated)
            .map_err(|err| err.to_string())
    }
}

pub(crate) struct WorkflowJobs {
    message_tx: Sender<JobMessage>,
    message_rx: Receiver<JobMessage>,
    fields_in_progress: bool,
    submit_in_progress: bool,
    active_fields: Option<Uuid>,
    active_submit: Option<Uuid>,
    cancel: Option<Arc<AtomicBool>>,
}

impl WorkflowJobs {
    pub(crate) fn new() -> Self {
        let (message_tx, message_rx) = std::sync::mpsc::channel::<JobMessage>();
        Self {
            message_tx,
            message_rx,
            fields_in_progress: false,
            submit_in_progress: false,
            active_fields: None,
            active_submit: None,
            cancel: None,
        }
    }

    pub(crate) fn try_recv_message(&self) -> Result<JobMessage, TryRecvError> {
        self.message_rx.try_recv()
    }

    pub(crate) fn fields_in_progress(&self) -> bool {
        self.fields_in_progress
    }

    pub(crate) fn submit_in_progress(&self) -> bool {
        self.submit_in_progress
    }

    /// Whether this fields result belongs to the active discovery.
    pub(crate) fn accepts_fields(&self, request_id: Uuid) -> bool {
        self.active_fields == Some(request_id)
    }

    /// Whether this run result belongs to the active submission.
    pub(crate) fn accepts_submit(&self, request_id: Uuid) -> bool {
        self.active_submit == Some(request_id)
    }

    pub(crate) fn begin_fields_load(&mut self, job: FieldsJob) -> Option<Uuid> {
        if self.fields_in_progress {
            return None;
        }
        self.fields_in_progress = true;
        let request_id = Uuid::new_v4();
        self.active_fields = Some(request_id);
        let cancel = self.fresh_cancel();
        let tx = self.message_tx.clone();
        thread::spawn(move || {
            let result = job.run();
            if cancel.load(Ordering::Relaxed) {
                return;
            }
            let _ = tx.send(JobMessage::FieldsLoaded(FieldsResult { request_id, result }));
        });
        Some(request_id)
    }

    pub(crate) fn begin_submit(&mut self, job: RunJob) -> Option<Uuid> {
        if self.submit_in_progress {
            return None;
        }
        self.submit_in_progress = true;
        let request_id = Uuid::new_v4();
        self.active_submit = Some(request_id);
        let cancel = self.fresh_cancel();
        let tx = self.message_tx.clone();
        thread::spawn(move || {
            let result = job.run();
            if cancel.load(Ordering::Relaxed) {
                return;
            }
            let _ = tx.send(JobMessage::RunFinished(RunResult { request_id, result }));
        });
        Some(request_id)
    }

    pub(crate) fn clear_fields_load(&mut self) {
        self.fields_in_progress = false;
        self.active_fields = None;
    }

    pub(crate) fn clear_submit(&mut self) {
        self.submit_in_progress = false;
        self.active_submit = None;
    }

    /// Abandon every in-flight job: flip the cancel token and forget the
    /// active ids so late results can no longer match.
    pub(crate) fn cancel_all(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.store(true, Ordering::Relaxed);
        }
        self.fields_in_progress = false;
        self.submit_in_progress = false;
        self.active_fields = None;
        self.active_submit = None;
    }

    fn fresh_cancel(&mut self) -> Arc<AtomicBool> {
        let cancel = Arc::new(AtomicBool::new(false));
        self.cancel = Some(cancel.clone());
        cancel
    }
}

impl Drop for WorkflowJobs {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
