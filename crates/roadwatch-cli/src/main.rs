//! roadwatch: submit detection jobs, caption frames, and manage the incident store.
//!
//! Configuration comes from the environment (and `.env`); see
//! `OrchestratorConfig::from_env` and `CaptionClient::from_env` for the variables.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roadwatch_core::{defaults, CaptionBackend, ImageFrame, IncidentRepository, SubmitJobRequest};
use roadwatch_db::{Database, DbConfig, IdAllocator, InMemoryIncidentRepository};
use roadwatch_inference::CaptionClient;
use roadwatch_jobs::{MonitorEvent, OrchestratorBuilder, OrchestratorConfig};

#[derive(Parser)]
#[command(name = "roadwatch")]
#[command(author, version, about = "Traffic incident video pipeline")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a video to the detection worker and follow it to completion
    Submit {
        /// Uploaded video path as the worker sees it
        input: String,

        /// Rendered output path; its `.json` sidecar is read on completion
        output: String,

        /// Live stream: register only, never poll
        #[arg(long)]
        realtime: bool,

        /// Detection model size
        #[arg(long, default_value = defaults::WORKER_MODEL_TYPE)]
        model_type: String,

        /// Comma-separated custom labels
        #[arg(long)]
        labels: Option<String>,

        /// Detection confidence threshold
        #[arg(long)]
        confidence: Option<f64>,

        /// Do not caption detections automatically
        #[arg(long)]
        no_auto_report: bool,

        /// Keep incidents in memory instead of Postgres
        #[arg(long)]
        memory_store: bool,
    },

    /// Caption one or more image files with the configured model chain
    Caption {
        /// Frames in before/during/after order
        #[arg(required = true, num_args = 1..)]
        images: Vec<PathBuf>,
    },

    /// Show the id the next incident would get
    NextId,

    /// List the most recent incidents as JSON
    Incidents {
        #[arg(short, long, default_value_t = defaults::RECENT_INCIDENTS_LIMIT)]
        limit: i64,
    },

    /// Apply database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let _log_guard = init_logging();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, daily rotation)
///   LOG_ANSI    - "true"/"false" override ANSI colors
///   RUST_LOG    - standard env filter (default: "roadwatch=info")
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "roadwatch=info,roadwatch_jobs=info,roadwatch_inference=info,roadwatch_db=info".into()
    });
    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = if let Some(ref path) = log_file {
        let path = std::path::Path::new(path);
        let file_dir = path.parent().unwrap_or(std::path::Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("roadwatch.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        subsystem = "cli",
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stderr)"),
        "Logging initialized"
    );
    guard
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Submit {
            input,
            output,
            realtime,
            model_type,
            labels,
            confidence,
            no_auto_report,
            memory_store,
        } => {
            let mut request = SubmitJobRequest::new(input, output)
                .realtime(realtime)
                .model_type(model_type)
                .auto_report(!no_auto_report);
            if let Some(labels) = labels {
                request = request.custom_labels(labels);
            }
            if let Some(confidence) = confidence {
                request = request.confidence_threshold(confidence);
            }
            cmd_submit(request, memory_store).await
        }
        Commands::Caption { images } => cmd_caption(&images).await,
        Commands::NextId => {
            let db = connect().await?;
            let id = IdAllocator::new(db.incident_store()).next_id().await?;
            println!("{}", id);
            Ok(())
        }
        Commands::Incidents { limit } => {
            let db = connect().await?;
            let incidents = db.incidents.list_recent(limit).await?;
            println!("{}", serde_json::to_string_pretty(&incidents)?);
            Ok(())
        }
        Commands::Migrate => {
            let db = connect().await?;
            db.migrate().await?;
            info!(subsystem = "cli", "Migrations applied");
            Ok(())
        }
    }
}

async fn connect() -> anyhow::Result<Database> {
    let config = DbConfig::from_env();
    Database::connect(&config)
        .await
        .with_context(|| format!("connecting to {}", config.redacted_url()))
}

async fn cmd_submit(request: SubmitJobRequest, memory_store: bool) -> anyhow::Result<()> {
    let incidents: Arc<dyn IncidentRepository> = if memory_store {
        Arc::new(InMemoryIncidentRepository::new())
    } else {
        connect().await?.incident_store()
    };
    let caption = CaptionClient::from_env().context("configuring caption client")?;

    let orchestrator = OrchestratorBuilder::new(incidents, Arc::new(caption))
        .with_config(OrchestratorConfig::from_env())
        .build()?;

    let mut events = orchestrator.subscribe();
    let realtime = request.realtime;
    let job_id = orchestrator.submit(request).await?;
    println!("{}", job_id);
    if realtime {
        return Ok(());
    }

    loop {
        match events.recv().await {
            Ok(event) if event.job_id() == Some(job_id.as_str()) => {
                if let MonitorEvent::Progress { progress, .. } = &event {
                    info!(subsystem = "cli", job_id = %job_id, progress, "Job progress");
                }
                if event.is_final() {
                    break;
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(subsystem = "cli", skipped, "Event stream lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }

    let outcome = orchestrator.join(&job_id).await?;
    let task = orchestrator.get_status(&job_id).await?;
    info!(subsystem = "cli", job_id = %job_id, outcome = ?outcome, "Job finished");
    println!("{}", serde_json::to_string_pretty(&task)?);
    Ok(())
}

async fn cmd_caption(paths: &[PathBuf]) -> anyhow::Result<()> {
    let client = CaptionClient::from_env().context("configuring caption client")?;

    let mut frames = Vec::with_capacity(paths.len());
    for path in paths {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        frames.push(ImageFrame::new(data));
    }

    let text = client.describe(&frames).await?;
    println!("{}", text);
    Ok(())
}
