use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use console::style;
use heic_jpg::{
    load_items, suggestions, write_outputs, BatchRejected, BatchSnapshot, ConversionBackend,
    ConversionItem, DownloadKind, ImagePreviewGenerator, IntakePolicy, ItemId, ItemStatus,
    LibheifBackend, Orchestrator, OutputFile, PipelineConfig, RetryPolicy, TelemetryEvent,
    TelemetrySink, TracingTelemetry,
};
use serde_json::json;
use shared_utils::error_handler::report_anyhow;
use shared_utils::logging::{init_logging, log_operation_end, LogConfig};
use shared_utils::{
    collect_inputs, create_spinner, install_panic_handler, print_summary_report, BatchProgressBar,
    BatchResult, HEIC_EXTENSIONS,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, watch};
use tracing::{info, Level};

const PROGRAM: &str = "heic2jpg";

#[derive(Parser)]
#[command(name = "heic2jpg")]
#[command(version, about = "Convert HEIC/HEIF photos to JPG", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert files (or directories of files) to JPG.
    Convert {
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory.
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// JPEG quality, 0.0 to 1.0.
        #[arg(short, long, default_value_t = 0.9)]
        quality: f32,

        /// Retries for transient failures.
        #[arg(long, default_value_t = 2)]
        max_retries: u32,

        /// Give up on a single conversion after this many seconds.
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        #[arg(long, default_value_t = 10)]
        max_files: usize,

        #[arg(short, long)]
        recursive: bool,

        /// Retry failed items once more after the batch completes.
        #[arg(long)]
        retry_failed: bool,

        /// Overwrite existing JPGs.
        #[arg(short, long)]
        force: bool,

        /// Print a JSON report instead of the summary.
        #[arg(long)]
        json: bool,

        #[arg(short, long)]
        verbose: bool,

        #[arg(long, value_name = "DIR")]
        log_dir: Option<PathBuf>,
    },

    /// Report whether this system can decode HEIC.
    Check {
        #[arg(long)]
        json: bool,
    },
}

struct ConvertArgs {
    inputs: Vec<PathBuf>,
    output: PathBuf,
    config: PipelineConfig,
    policy: IntakePolicy,
    recursive: bool,
    retry_failed: bool,
    force: bool,
    json: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let (verbose, log_dir) = match &cli.command {
        Commands::Convert {
            verbose, log_dir, ..
        } => (*verbose, log_dir.clone()),
        Commands::Check { .. } => (false, None),
    };
    let mut log_config =
        LogConfig::default().with_level(if verbose { Level::DEBUG } else { Level::INFO });
    if let Some(dir) = log_dir {
        log_config = log_config.with_log_dir(dir);
    }
    if let Err(e) = init_logging(PROGRAM, log_config) {
        eprintln!("⚠️  Logging disabled: {:#}", e);
    }
    install_panic_handler();

    let result = match cli.command {
        Commands::Convert {
            inputs,
            output,
            quality,
            max_retries,
            timeout,
            max_files,
            recursive,
            retry_failed,
            force,
            json,
            ..
        } => {
            let config = PipelineConfig::new()
                .with_quality(quality)
                .with_retry(RetryPolicy::default().with_max_retries(max_retries))
                .with_conversion_timeout(timeout.map(Duration::from_secs));
            run_convert(ConvertArgs {
                inputs,
                output,
                config,
                policy: IntakePolicy::default().with_max_files(max_files),
                recursive,
                retry_failed,
                force,
                json,
            })
            .await
        }
        Commands::Check { json } => run_check(json),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            report_anyhow(&e);
            std::process::exit(1);
        }
    }
}

fn run_check(json: bool) -> anyhow::Result<i32> {
    let capability = LibheifBackend::new().check_capability();
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "supported": capability.is_supported(),
                "reason": capability.reason(),
            }))?
        );
    } else if capability.is_supported() {
        println!("{} HEIC decoding is available", style("✅").green());
    } else {
        println!(
            "{} {}",
            style("❌").red(),
            capability.reason().unwrap_or("HEIC decoding is unavailable")
        );
    }
    Ok(if capability.is_supported() { 0 } else { 1 })
}

async fn run_convert(args: ConvertArgs) -> anyhow::Result<i32> {
    let start = Instant::now();

    let files = collect_inputs(&args.inputs, HEIC_EXTENSIONS, args.recursive);
    if files.is_empty() {
        bail!("No HEIC/HEIF files found in the given inputs");
    }

    let report = args.policy.validate(&files);
    if !report.is_clean() {
        for error in &report.errors {
            eprintln!("{} {}", style("❌").red(), error);
        }
        eprintln!("No files were converted. Fix the problems above and try again.");
        return Ok(2);
    }

    let spinner = create_spinner(
        &format!("Reading {} file(s)...", report.accepted.len()),
        args.json,
    );
    let items = load_items(&report).context("Failed to read input files")?;
    spinner.finish_and_clear();

    let sources: HashMap<ItemId, PathBuf> = items
        .iter()
        .zip(&report.accepted)
        .map(|(item, file)| (item.id(), file.path.clone()))
        .collect();
    let input_bytes = report.total_bytes();

    let telemetry = Arc::new(TracingTelemetry);
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(LibheifBackend::new()),
        Arc::new(ImagePreviewGenerator::new()),
        telemetry.clone(),
        args.config.clone(),
    ));

    let bar = BatchProgressBar::new(items.len() as u64, "HEIC → JPG", args.json);
    let (stop_tx, stop_rx) = oneshot::channel();
    let renderer = tokio::spawn(render_progress(orchestrator.subscribe(), bar, stop_rx));

    info!(items = items.len(), output = %args.output.display(), "Starting conversion");
    match orchestrator.submit_batch(items).await {
        Ok(()) => {}
        Err(BatchRejected::Unsupported(reason)) => {
            let _ = stop_tx.send(());
            let _ = renderer.await;
            eprintln!("{} {}", style("❌").red(), reason);
            return Ok(1);
        }
        Err(e) => return Err(e).context("Batch was not accepted"),
    }

    if args.retry_failed && orchestrator.progress().failed > 0 {
        info!(
            failed = orchestrator.progress().failed,
            "Retrying failed items"
        );
        orchestrator
            .retry_failed()
            .await
            .context("Retry was not accepted")?;
    }

    let _ = stop_tx.send(());
    let bar = renderer.await.context("Progress renderer failed")?;
    bar.finish();

    let snapshot = orchestrator.snapshot();
    let outputs = write_outputs(&snapshot.items, &args.output, args.force)
        .context("Failed to write converted files")?;
    if !outputs.written.is_empty() {
        telemetry.record(TelemetryEvent::Download {
            kind: DownloadKind::Individual,
            count: outputs.written.len(),
        });
    }

    let duration = start.elapsed();
    let failed = snapshot.progress.failed;

    if args.json {
        print_json_report(&snapshot, &sources, &outputs.written, &args.config, duration)?;
    } else {
        let mut result = BatchResult::new();
        for item in &snapshot.items {
            match item.status() {
                ItemStatus::Done if outputs.was_skipped(item.id()) => result.skip(),
                ItemStatus::Done => result.success(),
                _ => result.fail(
                    sources.get(&item.id()).cloned().unwrap_or_default(),
                    failure_reason(item),
                ),
            }
        }
        print_summary_report(
            &result,
            duration,
            input_bytes,
            outputs.bytes_written,
            "HEIC → JPG",
        );
        if !outputs.skipped.is_empty() {
            println!(
                "{} {} existing file(s) kept; use --force to overwrite",
                style("⏭️").yellow(),
                outputs.skipped.len()
            );
        }
        print_suggestions(&snapshot);
    }

    log_operation_end("convert", duration, failed == 0);
    Ok(if failed > 0 { 1 } else { 0 })
}

/// Friendly explanation for the error kind, with the backend's detail.
fn failure_reason(item: &ConversionItem) -> String {
    match item.error() {
        Some(error) => format!("{} ({})", error.kind.user_message(), error.message),
        None => "not converted".to_string(),
    }
}

fn update_bar(bar: &mut BatchProgressBar, snapshot: &BatchSnapshot) {
    let progress = snapshot.progress;
    bar.update(
        progress.total as u64,
        progress.completed as u64,
        progress.failed as u64,
        snapshot.current().map(|item| item.display_name()),
    );
}

/// Mirror snapshots onto the bar until told to stop; hands the bar back.
async fn render_progress(
    mut updates: watch::Receiver<BatchSnapshot>,
    mut bar: BatchProgressBar,
    mut stop: oneshot::Receiver<()>,
) -> BatchProgressBar {
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                update_bar(&mut bar, &snapshot);
            }
            _ = &mut stop => break,
        }
    }
    let snapshot = updates.borrow().clone();
    update_bar(&mut bar, &snapshot);
    bar
}

fn print_suggestions(snapshot: &BatchSnapshot) {
    let found = suggestions(&snapshot.items);
    if found.is_empty() {
        return;
    }
    println!();
    println!("{}", style("💡 What you can do").bold());
    for suggestion in found {
        println!(
            "  {} ({} file(s))",
            style(suggestion.title).yellow().bold(),
            suggestion.item_ids.len()
        );
        println!("     {}", suggestion.description);
        println!("     → {}", style(suggestion.action_label).cyan());
    }
}

fn print_json_report(
    snapshot: &BatchSnapshot,
    sources: &HashMap<ItemId, PathBuf>,
    written: &[OutputFile],
    config: &PipelineConfig,
    duration: Duration,
) -> anyhow::Result<()> {
    let items: Vec<_> = snapshot
        .items
        .iter()
        .map(|item| {
            json!({
                "id": item.id(),
                "name": item.display_name(),
                "source": sources.get(&item.id()),
                "size_bytes": item.size_bytes(),
                "status": item.status(),
                "attempts": item.attempts(),
                "error": item.error(),
                "hint": item.error().map(|e| e.kind.user_message()),
                "output_bytes": item.output().map(|o| o.len()),
                "has_preview": item.preview().is_some(),
            })
        })
        .collect();

    let report = json!({
        "finished_at": chrono::Local::now().to_rfc3339(),
        "duration_ms": duration.as_millis() as u64,
        "phase": snapshot.phase,
        "progress": snapshot.progress,
        "config": config,
        "items": items,
        "written": written,
        "suggestions": suggestions(&snapshot.items),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
