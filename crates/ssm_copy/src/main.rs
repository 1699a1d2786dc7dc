use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use ssm_copy::app::App;
use ssm_copy::cli::{Cli, OutputFormat, RunPlan};
use ssm_copy::config::{Config, LoggingConfig};
use ssm_copy::models::types::Report;
use ssm_copy::output::{render_summary, ConsoleSink};
use ssm_copy::services::poller::OutcomeSink;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const EXIT_USAGE: u8 = 1;
const EXIT_FAILED: u8 = 2;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                e.exit();
            }
            let _ = e.print();
            return ExitCode::from(EXIT_USAGE);
        }
    };

    // Load configuration
    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };
    cli.apply_to(&mut config);

    init_tracing(&config.logging);

    let plan = match cli.plan(&config) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!(
                "error: {}\n\nUsage: ssm-copy [OPTIONS] -i <ID> --s3-bucket <BUCKET> <SOURCE>... <DESTINATION>",
                e
            );
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to start async runtime");
            return ExitCode::from(EXIT_FAILED);
        }
    };

    match runtime.block_on(run(&config, plan, cli.format)) {
        Ok(report) if report.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(EXIT_FAILED),
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(EXIT_FAILED)
        }
    }
}

async fn run(config: &Config, plan: RunPlan, format: OutputFormat) -> anyhow::Result<Report> {
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                warn!("Received interrupt, cancelling remaining work");
                interrupt.cancel();
            }
            Err(err) => {
                error!("Unable to listen for interrupt signal: {}", err);
            }
        }
    });

    let sink: Option<Arc<dyn OutcomeSink>> = match format {
        OutputFormat::Text => Some(Arc::new(ConsoleSink::new())),
        OutputFormat::Json => None,
    };

    let app = App::initialize(config, sink, cancel).await?;
    info!(
        artifacts = plan.artifacts.len(),
        targets = plan.targets.len(),
        dry_run = plan.dry_run,
        "Copy run starting"
    );

    let report = app
        .orchestrator
        .run(&plan.artifacts, &plan.targets, &plan.destination, plan.dry_run)
        .await?;

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialize report")?
            );
        }
        OutputFormat::Text => {
            println!("{}", render_summary(&report));
        }
    }

    Ok(report)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
