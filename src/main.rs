mod cli;
mod config;
mod ui;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use config::JobscribeConfig;
use jobscribe::{
    ArtifactStore, HttpArtifactStore, HttpJobApi, InMemoryArtifactStore, JobApi, JobId, JobStatus,
    Orchestrator, OrchestratorSettings, SimulatedJobApi,
};
use ui::JobProgress;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "jobscribe=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = JobscribeConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Transcribe {
            file,
            language,
            max_wait,
            poll_interval,
            json,
        } => {
            let mut settings = config.settings();
            if let Some(language) = language {
                settings.language_code = language;
            }
            if let Some(secs) = max_wait {
                settings.poll.max_wait = Duration::from_secs(secs);
            }
            if let Some(ms) = poll_interval {
                settings.poll.interval = Duration::from_millis(ms);
                settings.poll.max_interval = settings.poll.max_interval.max(settings.poll.interval);
            }

            let store = HttpArtifactStore::new(
                required(&config.store_endpoint, "store_endpoint")?,
                &config.location_scheme,
                config.token(),
                config.request_timeout(),
            )?;
            let api = HttpJobApi::new(
                required(&config.job_api_endpoint, "job_api_endpoint")?,
                config.token(),
                config.request_timeout(),
            )?;
            transcribe_file(Arc::new(store), Arc::new(api), settings, &file, json).await
        }
        Command::Status { job_name } => {
            let api = HttpJobApi::new(
                required(&config.job_api_endpoint, "job_api_endpoint")?,
                config.token(),
                config.request_timeout(),
            )?;
            let snapshot = api.get_job(&JobId::from_raw(job_name)).await?;
            println!("{}: {}", snapshot.job_id, snapshot.status);
            if let Some(location) = &snapshot.result_location {
                println!("  transcript: {location}");
            }
            if let Some(reason) = &snapshot.failure_reason {
                println!("  failure: {reason}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Demo { json } => run_demo(&config, json).await,
    }
}

fn required<'a>(value: &'a str, name: &str) -> Result<&'a str> {
    if value.is_empty() {
        bail!("{name} is not configured (set it in jobscribe.toml or the JOBSCRIBE_* environment)");
    }
    Ok(value)
}

async fn transcribe_file(
    store: Arc<dyn ArtifactStore>,
    api: Arc<dyn JobApi>,
    settings: OrchestratorSettings,
    file: &Path,
    json: bool,
) -> Result<ExitCode> {
    let audio = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .context("audio file name is not valid UTF-8")?;
    Ok(orchestrate(store, api, settings, audio, filename, json).await)
}

/// Runs one orchestration on its own task; Ctrl-C cancels it.
async fn orchestrate(
    store: Arc<dyn ArtifactStore>,
    api: Arc<dyn JobApi>,
    settings: OrchestratorSettings,
    audio: Vec<u8>,
    filename: &str,
    json: bool,
) -> ExitCode {
    let progress = Arc::new(JobProgress::start(filename));
    let orchestrator =
        Arc::new(Orchestrator::new(store, api, settings).with_observer(progress.clone()));

    let task = orchestrator.spawn(audio, filename);
    let cancel = task.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            cancel.cancel();
        }
    });

    let report = task.outcome().await;
    interrupt.abort();

    progress.complete(&report.outcome);
    if json {
        progress.print_record(&report.record);
    }
    if report.outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// hello.mp3 against the in-memory store and simulated job service.
async fn run_demo(config: &JobscribeConfig, json: bool) -> Result<ExitCode> {
    let store = Arc::new(InMemoryArtifactStore::new("r"));
    let api = SimulatedJobApi::new()
        .with_statuses(vec![
            JobStatus::InProgress,
            JobStatus::InProgress,
            JobStatus::Completed,
        ])
        .with_transcript("hello world")
        .with_output_store(store.clone(), "r");

    let mut settings = config.settings();
    settings.input_bucket = "in".into();
    settings.output_bucket = "out".into();
    settings.poll.interval = Duration::from_millis(300);
    settings.poll.max_interval = Duration::from_millis(300);

    let audio = b"ID3 demo audio".to_vec();
    Ok(orchestrate(store, Arc::new(api), settings, audio, "hello.mp3", json).await)
}
