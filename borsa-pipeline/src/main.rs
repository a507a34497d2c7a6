//! Borsa Pipeline - scheduled BIST screening and price forecasting.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use borsa_common::config::Config;
use borsa_common::logging::init_logging;
use borsa_pipeline::scheduler::JobKind;
use borsa_pipeline::PipelineService;

#[derive(Parser, Debug)]
#[command(name = "borsa-pipeline")]
#[command(version)]
#[command(about = "Scheduled BIST screening and multi-model price forecasting", long_about = None)]
struct Cli {
    /// Config file (default: ~/.borsa/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Keep results in memory instead of SQLite
    #[arg(long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the scheduler until Ctrl-C. SIGUSR1 rescreens, SIGUSR2 forecasts.
    Run,

    /// Screen the whole universe once
    Screen,

    /// Forecast every selected symbol once
    Predict,

    /// Write the weekly prediction report now
    Report,

    /// Technical analysis for one symbol, printed as JSON
    Analyze {
        /// Plain ticker, e.g. THYAO
        symbol: String,
    },

    /// Print the stored prediction for a symbol
    Show {
        /// Plain ticker, e.g. THYAO
        symbol: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_and_validate(cli.config.as_deref())?;
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );
    tracing::info!("Borsa Pipeline v{}", env!("CARGO_PKG_VERSION"));

    let service = PipelineService::new(config, cli.memory)?;

    match cli.command {
        Commands::Run => service.start().await,
        Commands::Screen => run_once(&service, JobKind::ScreenAll).await,
        Commands::Predict => run_once(&service, JobKind::PredictSelected).await,
        Commands::Report => run_once(&service, JobKind::WeeklyReport).await,
        Commands::Analyze { symbol } => {
            let symbol = symbol.to_uppercase();
            let snapshot = service
                .orchestrator()
                .analyze(&symbol)
                .await
                .with_context(|| format!("Technical analysis failed for {}", symbol))?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
        Commands::Show { symbol } => {
            let symbol = symbol.to_uppercase();
            match service.repository().get_prediction(&symbol).await? {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => println!("No prediction stored for {}", symbol),
            }
            Ok(())
        }
    }
}

async fn run_once(service: &PipelineService, kind: JobKind) -> Result<()> {
    let summary = service.orchestrator().run_job(kind).await?;
    println!(
        "{}: processed {}, succeeded {}, skipped {}, failed {}, selected {} ({:.1}s)",
        kind.name(),
        summary.processed,
        summary.succeeded,
        summary.skipped,
        summary.failed,
        summary.selected,
        summary.duration.as_secs_f64()
    );
    Ok(())
}
