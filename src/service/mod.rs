//! Everything that talks to the compute service: routing, payloads, the
//! blocking client, and response classification.

mod api;
mod outcome;
mod payload;
pub mod routes;

pub use api::ComputeClient;
pub use outcome::{
    ApiError, ArtifactKind, DiagnosticsBlock, RunOutcome, RunReport, TrainReport,
    classify_response,
};
pub use routes::{FieldsOperation, Operation, RouteError};
