//! Library exports for reuse in the CLI binaries, benchmarks, and tests.
/// Per-user directories for config, logs, and downloads.
pub mod app_dirs;
/// Chart descriptors projected from run diagnostics.
pub mod charts;
/// Choropleth color scale and legend buckets.
pub mod choropleth;
/// Persisted application settings.
pub mod config;
/// Number formatting shared by charts, legends, and CLI output.
pub mod format;
mod http_client;
/// Log file management.
pub mod logging;
/// Model run requests and their local guards.
pub mod model;
/// GeoJSON prediction previews.
pub mod predictions;
/// Compute service client: routing, payloads, outcome classification.
pub mod service;
/// Data source selection and resolution.
pub mod source;
/// Run workflow state machines.
pub mod workflow;
