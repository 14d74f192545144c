mod cli;
mod prompt;

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use toloka2media_core::naming::tokenizer::numbers;
use toloka2media_core::{
    load_config, validate_config, AutoPrompt, ClientBackend, Config, HttpTracker,
    OperatorPrompt, OrchestratorConfig, QBittorrentClient, RenameOrchestrator, RunReport,
    SanitizedConfig, TitleOutcome, TorrentClient, Tracker, TransmissionClient,
};

use cli::{Cli, Command};
use prompt::TerminalPrompt;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Needs no config or connections
    if let Command::Num(args) = &cli.command {
        for (position, number) in numbers(&args.text).iter().enumerate() {
            println!("{}\t{}", position + 1, number);
        }
        return Ok(0);
    }

    info!("Loading configuration from {:?}", cli.config);
    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    debug!(
        "Effective configuration: {}",
        serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default()
    );

    let interactive = !cli.non_interactive && std::io::stdin().is_terminal();
    let orchestrator = build_orchestrator(&config, interactive)?;
    info!(
        "Tracking titles in {:?}",
        orchestrator.config().registry_path
    );

    let report = match cli.command {
        Command::AddManual(args) => {
            if !interactive {
                return Err(anyhow!("add-manual needs an interactive terminal"));
            }
            let request = prompt::ask_add_request(args.url).await?;
            single(orchestrator.add(request).await)
        }
        Command::Add(args) => single(orchestrator.add(args.into_request()).await),
        Command::Update(args) => single(orchestrator.update_one(&args.codename, args.force).await),
        Command::UpdateAll(args) => orchestrator
            .update_all(args.force)
            .await
            .context("Failed to read the title registry")?,
        Command::Num(_) => return Ok(0),
    };

    print_report(&report);
    Ok(report.exit_code())
}

fn build_orchestrator(config: &Config, interactive: bool) -> Result<RenameOrchestrator> {
    let client: Arc<dyn TorrentClient> = match config.client.backend {
        ClientBackend::Qbittorrent => {
            let qb_config = config
                .client
                .qbittorrent
                .clone()
                .ok_or_else(|| anyhow!("qBittorrent config is required"))?;
            Arc::new(
                QBittorrentClient::new(qb_config)
                    .context("Failed to create qBittorrent client")?,
            )
        }
        ClientBackend::Transmission => {
            let tr_config = config
                .client
                .transmission
                .clone()
                .ok_or_else(|| anyhow!("Transmission config is required"))?;
            Arc::new(
                TransmissionClient::new(tr_config)
                    .context("Failed to create Transmission client")?,
            )
        }
    };
    info!("Using torrent client: {:?}", config.client.backend);

    let tracker: Arc<dyn Tracker> = Arc::new(
        HttpTracker::new(config.tracker.clone()).context("Failed to create tracker client")?,
    );

    let prompt: Arc<dyn OperatorPrompt> = if interactive {
        Arc::new(TerminalPrompt)
    } else {
        info!("Running non-interactively; overwrites will be declined");
        Arc::new(AutoPrompt)
    };

    Ok(RenameOrchestrator::new(
        OrchestratorConfig::from_config(config),
        client,
        tracker,
        prompt,
    ))
}

fn single(outcome: TitleOutcome) -> RunReport {
    let mut report = RunReport::default();
    report.push(outcome);
    report
}

fn print_report(report: &RunReport) {
    for outcome in &report.outcomes {
        match &outcome.error {
            Some(e) => println!("{}: failed ({}): {}", outcome.codename, e.kind(), e),
            None => {
                let detail = match &outcome.applied {
                    Some(applied) => format!(
                        "{} renamed, {} moved, {} adopted, {} overwritten",
                        applied.client_renames, applied.fs_moves, applied.adopted, applied.overwritten
                    ),
                    None => "no changes".to_string(),
                };
                println!("{}: {} ({})", outcome.codename, outcome.phase, detail);
            }
        }
        for warning in &outcome.warnings {
            println!("  warning: {}", warning);
        }
    }

    if report.outcomes.len() > 1 {
        println!(
            "{} titles, {} updated, {} failed",
            report.outcomes.len(),
            report.updated_count(),
            report.failed_count()
        );
    }
}
