//! Voicebridge CLI entry point: loads configuration, wires the orchestrator,
//! and runs one pass of the six-stage pipeline (spec §6 "CLI surface").

use clap::Parser;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use voicebridge::analyzer::llm::OpenAiLikeClient;
use voicebridge::core::config::Config;
use voicebridge::store::HttpStoreClient;
use voicebridge::{Orchestrator, RunOptions};

#[derive(Parser, Debug)]
#[command(name = "voicebridge", version, about = "Voice-recording ingestion pipeline")]
struct Cli {
    /// Path to a TOML config file; defaults to the platform config directory.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Scan and plan only; never transcribe, commit, or archive.
    #[arg(long)]
    dry_run: bool,

    /// Comma-separated stage names to skip: detect,transcribe,analyze,commit,archive,cleanup.
    #[arg(long, value_delimiter = ',')]
    skip_steps: Vec<String>,

    /// Run continuously, waiting for the mount to reappear between passes,
    /// instead of exiting after one pass.
    #[arg(long)]
    auto_continue: bool,

    /// Increase log verbosity (stacks: -v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Override the removable-media mount path for this run.
    #[arg(long)]
    mount: Option<String>,
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let log_dir = default_log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, voicebridge::LOG_FILE);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let stdout_layer = tracing_subscriber::fmt::layer().with_timer(UtcTime::rfc_3339()).with_target(false);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_ansi(false)
        .with_writer(non_blocking);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("voicebridge={log_level}")))
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let config_path = cli.config.unwrap_or_else(default_config_path);
    let mut config = Config::load_or_default(&config_path)?;
    if let Some(mount) = cli.mount {
        config.detection.mount_path = mount;
    }

    let state_path = default_state_path();
    let archive_root = PathBuf::from(&config.detection.mount_path)
        .parent()
        .map(|p| p.join("Archives"))
        .unwrap_or_else(|| PathBuf::from("Archives"));

    let store_client = HttpStoreClient::new(config.store.base_url.clone(), std::env::var("NOTION_TOKEN").unwrap_or_default());
    let llm: Arc<dyn voicebridge::analyzer::llm::LlmClient> = Arc::new(OpenAiLikeClient::new(
        config.openai.base_url.clone(),
        std::env::var("OPENAI_API_KEY").unwrap_or_default(),
        config.openai.model.clone(),
    ));

    let mut orchestrator = Orchestrator::new(config, state_path, archive_root, store_client, llm);

    let options = RunOptions {
        dry_run: cli.dry_run,
        skip_steps: cli.skip_steps.into_iter().collect::<HashSet<_>>(),
        auto_continue: cli.auto_continue,
    };

    loop {
        let report = orchestrator.run(&options).await;
        tracing::info!(
            detected = report.detect.total,
            transcribed = report.transcribe.successful,
            analyzed = report.analyze.successful,
            committed = report.commit.successful,
            "pipeline run complete"
        );

        if !options.auto_continue {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
    }

    Ok(())
}

fn default_config_path() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.config_dir().join("voicebridge").join(voicebridge::CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(voicebridge::CONFIG_FILE))
}

fn default_state_path() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.data_dir().join("voicebridge").join("state.json"))
        .unwrap_or_else(|| PathBuf::from("state.json"))
}

fn default_log_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.data_dir().join("voicebridge").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}
