//! Launch a model run against the compute service and print its results.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use parcelscope::charts::ChartSet;
use parcelscope::choropleth;
use parcelscope::config::{self, AppConfig};
use parcelscope::format;
use parcelscope::logging;
use parcelscope::model::{ModelTool, RunMode, ScalerKind};
use parcelscope::service::{ArtifactKind, ComputeClient, RunOutcome, TrainReport};
use parcelscope::source::PickedFile;
use parcelscope::workflow::{WorkflowController, WorkflowPhase};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let Some(options) = parse_args(std::env::args().skip(1).collect())? else {
        return Ok(());
    };
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }
    let config = match config::load_or_default() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Using default settings: {err}");
            AppConfig::default()
        }
    };

    let base_url = options
        .base_url
        .clone()
        .unwrap_or_else(|| config.service.base_url.clone());
    let timeout = Duration::from_secs(options.timeout_secs.unwrap_or(config.service.timeout_secs));
    let client = ComputeClient::new(&base_url, timeout).map_err(|err| err.to_string())?;

    let mut controller = WorkflowController::new(options.tool, client.clone(), &config);
    controller.set_mode(options.mode);

    if let Some(table) = &options.table {
        controller.select_table(table);
    } else {
        controller.select_files(picked_files(&options.files)?);
    }
    if let Some(message) = controller.status_message() {
        return Err(message.to_string());
    }
    wait_for(&mut controller, WorkflowPhase::FieldsReady)?;
    println!("Fields: {}", controller.fields().join(", "));

    for name in &options.independent {
        controller.toggle_independent_var(name);
    }
    controller.set_dependent_var(options.dependent.clone());
    if let Some(path) = &options.model_path {
        controller.attach_model_artifact(picked_file(path)?);
        if let Some(message) = controller.status_message() {
            return Err(message.to_string());
        }
    }
    let scaler = options
        .scaler
        .or_else(|| options.tool.has_scaler_option().then_some(config.default_scaler));
    controller.set_scaler(scaler);

    controller.submit();
    if let Some(message) = controller.status_message() {
        return Err(message.to_string());
    }
    println!("Submitted {} ({})...", options.tool, options.mode.label());
    wait_for(&mut controller, WorkflowPhase::ResultReady)?;

    let Some(outcome) = controller.outcome() else {
        return Err("Run finished without an outcome".to_string());
    };
    match outcome {
        RunOutcome::Train(report) => {
            print_train_report(report);
            finish_artifacts(&client, &config, &options, &report.downloads)?;
        }
        RunOutcome::Run(report) => {
            print_downloads(&report.downloads);
            if options.preview {
                match &report.preview_url {
                    Some(url) => print_preview(&client, url)?,
                    None => println!("No preview available for this run."),
                }
            }
            finish_artifacts(&client, &config, &options, &report.downloads)?;
        }
    }
    Ok(())
}

fn wait_for(controller: &mut WorkflowController, target: WorkflowPhase) -> Result<(), String> {
    loop {
        controller.poll();
        let phase = controller.phase();
        if phase == target {
            return Ok(());
        }
        if phase == WorkflowPhase::Error {
            return Err(controller
                .error_message()
                .unwrap_or("The run failed without a message")
                .to_string());
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn picked_files(paths: &[PathBuf]) -> Result<Vec<PickedFile>, String> {
    paths.iter().map(|path| picked_file(path)).collect()
}

fn picked_file(path: &Path) -> Result<PickedFile, String> {
    let bytes =
        std::fs::read(path).map_err(|err| format!("Could not read {}: {err}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| format!("Not a usable file name: {}", path.display()))?;
    Ok(PickedFile::new(name, bytes))
}

fn print_train_report(report: &TrainReport) {
    println!("Metrics:");
    for (name, value) in &report.metrics {
        println!("  {name:<16} {}", format::metric(*value));
    }
    if !report.coefficients.is_empty() {
        println!("Coefficients (largest magnitude first):");
        for (name, value) in &report.coefficients {
            println!("  {name:<16} {}", format::coefficient(*value));
        }
    }
    let charts = ChartSet::project(&report.coefficients, &report.diagnostics);
    println!("Diagnostics:");
    println!(
        "  feature importance     {} bar(s)",
        charts.importance.bars.len()
    );
    println!(
        "  residual distribution  {} bar(s), bar width {}",
        charts.residual_histogram.bars.len(),
        format::axis_tick(charts.residual_histogram.bar_width)
    );
    println!(
        "  actual vs predicted    {} point(s)",
        charts.actual_vs_predicted.points.len()
    );
    println!(
        "  residuals vs predicted {} point(s)",
        charts.residual_vs_predicted.points.len()
    );
    print_downloads(&report.downloads);
}

fn print_downloads(downloads: &BTreeMap<ArtifactKind, String>) {
    if downloads.is_empty() {
        return;
    }
    println!("Artifacts:");
    for (kind, url) in downloads {
        println!("  {:<12} {url}", kind.label());
    }
}

fn print_preview(client: &ComputeClient, preview_url: &str) -> Result<(), String> {
    let collection = client
        .fetch_preview(preview_url)
        .map_err(|err| err.to_string())?;
    println!("Preview: {} feature(s)", collection.len());
    let Some(range) = collection.prediction_range() else {
        println!("No numeric predictions to color.");
        return Ok(());
    };
    println!(
        "Prediction range: {} to {}",
        format::metric(range.min),
        format::metric(range.max)
    );
    let colored = collection
        .fill_colors()
        .into_iter()
        .filter(|color| *color != choropleth::MISSING_VALUE_COLOR)
        .count();
    println!("Colored features: {colored}");
    println!("Legend:");
    for bucket in choropleth::buckets(range.min, range.max) {
        println!("  {}  {}", bucket.swatch.to_hex(), bucket.label);
    }
    Ok(())
}

fn finish_artifacts(
    client: &ComputeClient,
    config: &AppConfig,
    options: &Options,
    downloads: &BTreeMap<ArtifactKind, String>,
) -> Result<(), String> {
    if let Some(dir) = &options.download_dir {
        download_artifacts(client, config, downloads, Some(dir))?;
    } else if options.download {
        download_artifacts(client, config, downloads, None)?;
    }
    if let Some(table) = &options.save_table {
        let Some(artifact) = downloads.get(&ArtifactKind::Predictions) else {
            return Err("This run produced no predicted-output artifact to save".to_string());
        };
        client
            .save_predictions(artifact, table)
            .map_err(|err| err.to_string())?;
        println!("Saved predictions into table {table}");
    }
    Ok(())
}

fn download_artifacts(
    client: &ComputeClient,
    config: &AppConfig,
    downloads: &BTreeMap<ArtifactKind, String>,
    dir: Option<&Path>,
) -> Result<(), String> {
    if downloads.is_empty() {
        println!("Nothing to download.");
        return Ok(());
    }
    let dir = match dir {
        Some(dir) => dir.to_path_buf(),
        None => match &config.downloads_dir {
            Some(dir) => dir.clone(),
            None => parcelscope::app_dirs::downloads_dir().map_err(|err| err.to_string())?,
        },
    };
    std::fs::create_dir_all(&dir)
        .map_err(|err| format!("Could not create {}: {err}", dir.display()))?;
    for (kind, url) in downloads {
        let path = dir.join(artifact_file_name(kind, url));
        let mut file = std::fs::File::create(&path)
            .map_err(|err| format!("Could not create {}: {err}", path.display()))?;
        let bytes = client
            .download_artifact(url, &mut file)
            .map_err(|err| err.to_string())?;
        println!("Saved {} ({bytes} bytes) to {}", kind.label(), path.display());
    }
    Ok(())
}

/// File name for a downloaded artifact: the URL's last path segment, or the
/// artifact kind when the URL has none.
fn artifact_file_name(kind: &ArtifactKind, url: &str) -> String {
    url.split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|segment| !segment.is_empty())
        .unwrap_or(kind.label())
        .to_string()
}

#[derive(Debug, Clone)]
struct Options {
    tool: ModelTool,
    mode: RunMode,
    files: Vec<PathBuf>,
    table: Option<String>,
    independent: Vec<String>,
    dependent: Option<String>,
    model_path: Option<PathBuf>,
    scaler: Option<ScalerKind>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    download: bool,
    download_dir: Option<PathBuf>,
    save_table: Option<String>,
    preview: bool,
}

fn parse_args(args: Vec<String>) -> Result<Option<Options>, String> {
    let mut tool: Option<ModelTool> = None;
    let mut mode = RunMode::Train;
    let mut files: Vec<PathBuf> = Vec::new();
    let mut table: Option<String> = None;
    let mut independent: Vec<String> = Vec::new();
    let mut dependent: Option<String> = None;
    let mut model_path: Option<PathBuf> = None;
    let mut scaler: Option<ScalerKind> = None;
    let mut base_url: Option<String> = None;
    let mut timeout_secs: Option<u64> = None;
    let mut download = false;
    let mut download_dir: Option<PathBuf> = None;
    let mut save_table: Option<String> = None;
    let mut preview = false;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "--tool" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--tool requires a value".to_string())?;
                tool = Some(value.parse()?);
            }
            "--mode" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--mode requires a value".to_string())?;
                mode = match value.to_ascii_lowercase().as_str() {
                    "train" => RunMode::Train,
                    "run" | "saved" => RunMode::RunSaved,
                    other => return Err(format!("Unknown mode '{other}' (expected train or run)")),
                };
            }
            "--file" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--file requires a value".to_string())?;
                files.push(PathBuf::from(value));
            }
            "--table" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--table requires a value".to_string())?;
                table = Some(value.clone());
            }
            "--independent" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--independent requires a value".to_string())?;
                independent.extend(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|name| !name.is_empty())
                        .map(str::to_string),
                );
            }
            "--dependent" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--dependent requires a value".to_string())?;
                dependent = Some(value.clone());
            }
            "--model" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--model requires a value".to_string())?;
                model_path = Some(PathBuf::from(value));
            }
            "--scaler" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--scaler requires a value".to_string())?;
                scaler = Some(value.parse()?);
            }
            "--base-url" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--base-url requires a value".to_string())?;
                base_url = Some(value.clone());
            }
            "--timeout-secs" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--timeout-secs requires a value".to_string())?;
                timeout_secs = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Not a number of seconds: {value}"))?,
                );
            }
            "--download" => download = true,
            "--download-dir" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--download-dir requires a value".to_string())?;
                download_dir = Some(PathBuf::from(value));
            }
            "--save-table" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--save-table requires a value".to_string())?;
                save_table = Some(value.clone());
            }
            "--preview" => preview = true,
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    let Some(tool) = tool else {
        return Err("--tool is required (linreg, gwr, or xgboost)".to_string());
    };
    if files.is_empty() && table.is_none() {
        return Err("Provide a source: --file <path> (repeatable) or --table <name>".to_string());
    }
    if !files.is_empty() && table.is_some() {
        return Err("Provide either --file or --table, not both".to_string());
    }
    Ok(Some(Options {
        tool,
        mode,
        files,
        table,
        independent,
        dependent,
        model_path,
        scaler,
        base_url,
        timeout_secs,
        download,
        download_dir,
        save_table,
        preview,
    }))
}

fn help_text() -> String {
    [
        "parcelscope-run",
        "",
        "Usage:",
        "  parcelscope-run --tool <linreg|gwr|xgboost> [--mode <train|run>]",
        "                  (--file <path> [--file <path> ...] | --table <name>)",
        "                  --independent <a,b,c> [--dependent <name>]",
        "                  [--model <path.pkl>] [--scaler <standard|minmax|robust>]",
        "                  [--base-url <url>] [--timeout-secs <n>]",
        "                  [--download] [--download-dir <dir>] [--save-table <name>]",
        "                  [--preview]",
        "",
        "Trains a model or applies a saved one, then prints metrics, chart",
        "summaries, and artifact links. --preview colors the predicted parcels",
        "and prints the legend. --save-table persists predictions into a",
        "backend table.",
    ]
    .join("\n")
}
