mod config;
mod error;
mod input;
mod model;
mod notifier;
mod report;
mod schedule;
mod structural;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use config::AppConfig;
use notifier::Notifier;
use notifier::terminal::TerminalNotifier;
use report::Format;
use schedule::Schedule;
use model::AnnotatedCandle;
use structural::{Analysis, StructuralSd};

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("input error")]
    Input,
    #[display("analysis error")]
    Analysis,
    #[display("output error")]
    Output,
    #[display("runtime error")]
    Runtime,
}

#[derive(Parser)]
#[command(
    name = "structural-sd",
    about = "Structural supply/demand zone detector"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyse the candle file once and print the annotated series
    Analyze {
        /// Candle file to read instead of `input.path`
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },
    /// Re-run the analysis on the configured schedule until Ctrl+C
    Watch,
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let config = config::load(Path::new(&cli.config)).change_context(AppError::Config)?;

    init_tracing(&config);

    let engine = StructuralSd::new(&config.structural_sd).change_context(AppError::Config)?;
    let symbol = config.input.symbol.clone().unwrap_or_else(|| "-".into());

    match cli.command {
        Command::Analyze { input, format } => {
            let path = input.unwrap_or_else(|| PathBuf::from(&config.input.path));
            let (analysis, signal) = analyze(&engine, &path)?;

            let output = match format {
                Format::Table => report::render_table(&analysis.candles),
                Format::Json => {
                    report::to_json(&analysis.candles).change_context(AppError::Output)?
                }
            };
            print!("{output}");

            match signal {
                Some(signal) => TerminalNotifier.notify(&symbol, &signal),
                None => info!(symbol = %symbol, "no signal"),
            }
            Ok(())
        }
        Command::Watch => watch(&config, engine, symbol).await,
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

fn analyze(
    engine: &StructuralSd,
    path: &Path,
) -> Result<(Analysis, Option<AnnotatedCandle>), Report<AppError>> {
    let candles = input::load(path).change_context(AppError::Input)?;

    if candles.len() < engine.required_candles() {
        tracing::debug!(
            available = candles.len(),
            required = engine.required_candles(),
            "series too short for pivots"
        );
    }

    engine
        .apply(&candles)
        .change_context(AppError::Analysis)
        .attach_with(|| format!("input: {}", path.display()))
}

async fn watch(
    config: &AppConfig,
    engine: StructuralSd,
    symbol: String,
) -> Result<(), Report<AppError>> {
    let schedule_config = config.schedule.clone().unwrap_or_default();
    let schedule = Schedule::new(&schedule_config).change_context(AppError::Config)?;
    let path = PathBuf::from(&config.input.path);
    let notifier = TerminalNotifier;

    let cancel = CancellationToken::new();
    let job_cancel = cancel.clone();
    let handle = tokio::spawn(async move {
        schedule::run(schedule, job_cancel, move || {
            let run_id = Uuid::new_v4();
            let span = tracing::info_span!("run", %run_id, symbol = %symbol);
            let _guard = span.enter();

            match analyze(&engine, &path) {
                Ok((_, Some(signal))) => notifier.notify(&symbol, &signal),
                Ok((_, None)) => {}
                // A failed run is reported and the next one still fires.
                Err(e) => tracing::warn!(error = ?e, "analysis run failed"),
            }
        })
        .await;
    });

    tokio::signal::ctrl_c()
        .await
        .change_context(AppError::Runtime)?;

    info!("ctrl+c received, shutting down");
    cancel.cancel();
    handle.await.change_context(AppError::Runtime)?;

    info!("shutdown complete");
    Ok(())
}
