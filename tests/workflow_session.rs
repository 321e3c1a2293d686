mod support;

use support::stub_service::{StubService, json_ok};

use parcelscope::charts::ChartSet;
use parcelscope::choropleth;
use parcelscope::config::AppConfig;
use parcelscope::model::{ModelTool, RunMode};
use parcelscope::service::{ComputeClient, RunOutcome};
use parcelscope::source::PickedFile;
use parcelscope::workflow::{WorkflowController, WorkflowPhase};

use std::thread;
use std::time::{Duration, Instant};

const FIELDS_BODY: &str = r#"{"fields": ["area", "zone", "value"]}"#;

const TRAIN_BODY: &str = r#"{
    "kind": "train",
    "metrics": {"r2": 0.81, "rmse": 241.3},
    "coefficients": {"zone": -0.4, "area": 1.5},
    "diagnostics": {
        "residuals": [12.0, -7.5, 3.1],
        "residual_bins": [-20.0, 0.0, 20.0],
        "residual_counts": [1.0, 2.0, 0.0],
        "actual_values": [100.0, 220.0, 310.0],
        "predicted_values": [112.0, 212.5, 313.1]
    },
    "downloads": {"model": "/dl/train/9/model.pkl", "report": "/dl/train/9/report.pdf"}
}"#;

const RUN_BODY: &str = r#"{
    "kind": "run",
    "downloads": {"predictions": "/dl/run/7/predictions.zip"}
}"#;

const PREVIEW_BODY: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {"type": "Feature", "geometry": null, "properties": {"prediction": 120.0}},
        {"type": "Feature", "geometry": null, "properties": {}},
        {"type": "Feature", "geometry": null, "properties": {"prediction": 1380.0}}
    ]
}"#;

fn controller_for(service: &StubService, tool: ModelTool) -> (WorkflowController, ComputeClient) {
    let client = ComputeClient::new(&service.base_url, Duration::from_secs(5))
        .expect("client for stub service");
    let controller = WorkflowController::new(tool, client.clone(), &AppConfig::default());
    (controller, client)
}

fn pump_to(controller: &mut WorkflowController, target: WorkflowPhase) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        controller.poll();
        if controller.phase() == target {
            return;
        }
        if controller.phase() == WorkflowPhase::Error {
            panic!(
                "workflow failed: {}",
                controller.error_message().unwrap_or("no message")
            );
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("workflow never reached {target:?}");
}

#[test]
fn training_session_from_files_to_charts() {
    let service = StubService::start(vec![json_ok(FIELDS_BODY), json_ok(TRAIN_BODY)]);
    let (mut controller, _client) = controller_for(&service, ModelTool::LinearRegression);

    controller.select_files(vec![
        PickedFile::new("parcels.shp", b"shp-bytes".to_vec()),
        PickedFile::new("parcels.dbf", b"dbf-bytes".to_vec()),
    ]);
    pump_to(&mut controller, WorkflowPhase::FieldsReady);
    assert_eq!(controller.fields(), ["area", "zone", "value"]);

    let discovery = service.recorded_request();
    assert!(discovery.starts_with("POST /api/linear/fields-upload"));
    assert!(discovery.contains("filename=\"parcels.shp\""));
    assert!(discovery.contains("filename=\"parcels.dbf\""));

    controller.toggle_independent_var("area");
    controller.toggle_independent_var("zone");
    controller.set_dependent_var(Some("value".to_string()));
    controller.submit();
    assert_eq!(controller.phase(), WorkflowPhase::Submitting);
    pump_to(&mut controller, WorkflowPhase::ResultReady);

    let submit = service.recorded_request();
    assert!(submit.starts_with("POST /api/linear/train-upload"));
    assert!(submit.contains("name=\"independent_vars\""));
    assert!(submit.contains(r#"["area","zone"]"#));
    assert!(submit.contains("name=\"dependent_var\""));

    let Some(RunOutcome::Train(report)) = controller.outcome() else {
        panic!("expected a train outcome");
    };
    assert_eq!(report.metrics.get("r2"), Some(&0.81));
    // Largest magnitude first, regardless of response order.
    assert_eq!(report.coefficients[0].0, "area");
    assert_eq!(report.coefficients[1].0, "zone");

    let charts = ChartSet::project(&report.coefficients, &report.diagnostics);
    assert_eq!(charts.importance.bars.len(), 2);
    assert_eq!(charts.residual_histogram.bars.len(), 3);
    // Bins span 40 across 3 bars: 0.6 * (40 / 3).
    assert!((charts.residual_histogram.bar_width - 8.0).abs() < 1e-9);
    assert_eq!(charts.actual_vs_predicted.points.len(), 3);
    assert_eq!(charts.residual_vs_predicted.points.len(), 3);
    assert_eq!(report.downloads.len(), 2);
}

#[test]
fn saved_model_session_colors_the_preview() {
    let service = StubService::start(vec![
        json_ok(FIELDS_BODY),
        json_ok(RUN_BODY),
        json_ok(PREVIEW_BODY),
    ]);
    let (mut controller, client) = controller_for(&service, ModelTool::LinearRegression);
    controller.set_mode(RunMode::RunSaved);

    controller.select_files(vec![PickedFile::new("parcels.zip", b"zip-bytes".to_vec())]);
    pump_to(&mut controller, WorkflowPhase::FieldsReady);

    let discovery = service.recorded_request();
    assert!(discovery.starts_with("POST /api/linear/fields-upload"));

    controller.toggle_independent_var("area");
    controller.attach_model_artifact(PickedFile::new("model.pkl", b"pickle".to_vec()));
    controller.submit();
    assert_eq!(controller.phase(), WorkflowPhase::Submitting, "{:?}", controller.status_message());
    pump_to(&mut controller, WorkflowPhase::ResultReady);

    let submit = service.recorded_request();
    assert!(submit.starts_with("POST /api/linear/run-upload"));
    assert!(submit.contains("filename=\"model.pkl\""));

    let Some(RunOutcome::Run(report)) = controller.outcome() else {
        panic!("expected a run outcome");
    };
    // No preview in the response; the client derives one from the
    // predictions artifact.
    let preview_url = report.preview_url.clone().expect("derived preview url");
    assert!(preview_url.contains("/api/preview?artifact="));

    let collection = client.fetch_preview(&preview_url).expect("preview fetch");
    let preview_request = service.recorded_request();
    assert!(preview_request.starts_with("GET /api/preview?artifact="));

    assert_eq!(collection.len(), 3);
    let colors = collection.fill_colors();
    assert_eq!(colors[0], choropleth::color(120.0, 120.0, 1380.0));
    assert_eq!(colors[1], choropleth::MISSING_VALUE_COLOR);
    assert_eq!(colors[2], choropleth::color(1380.0, 120.0, 1380.0));

    let range = collection.prediction_range().expect("prediction range");
    let buckets = choropleth::buckets(range.min, range.max);
    let labels: Vec<&str> = buckets
        .iter()
        .map(|bucket| bucket.label.as_str())
        .collect();
    assert_eq!(labels, ["0 - 500", "500 - 1,000", "1,000 - 1,500"]);
    assert_eq!(buckets[0].swatch, choropleth::color(0.0, 120.0, 1380.0));
}
