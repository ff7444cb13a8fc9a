use clap::{Parser, Subcommand};
use mr_open_data::apis::create_source;
use mr_open_data::app::ports::HttpClientPort;
use mr_open_data::common::config::Config;
use mr_open_data::common::constants;
use mr_open_data::common::types::DataSource;
use mr_open_data::infra::ReqwestHttp;
use mr_open_data::observability::{init_logging, Reporter, TracingReporter};
use mr_open_data::pipeline::Pipeline;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "mr_open_data")]
#[command(about = "Collects Mauritanian budget, football and price-index data into CSV files")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every source and write the kpi.json report (default)
    Run {
        /// Specific sources to run (comma-separated). Available: football, inpc, budget
        #[arg(long)]
        sources: Option<String>,
    },
    /// Collect budget execution figures only
    Budget,
    /// Collect football results only
    Football,
    /// Collect the INPC price-index table only
    Inpc,
}

fn parse_sources(list: Option<String>) -> Vec<String> {
    match list {
        Some(list) => list
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        None => constants::get_supported_sources()
            .into_iter()
            .map(String::from)
            .collect(),
    }
}

async fn run_single(
    name: &str,
    config: &Config,
    http: Arc<dyn HttpClientPort>,
    reporter: Arc<dyn Reporter>,
) -> anyhow::Result<()> {
    let Some(source) = create_source(name, config, http, reporter) else {
        warn!("Unknown source: {}", name);
        return Ok(());
    };
    std::fs::create_dir_all(&config.output_dir)?;
    if let Err(e) = source.run(&config.output_dir).await {
        error!("Collection failed for {}: {}", name, e);
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _log_guard = init_logging();

    let config = Config::load()?;
    let http: Arc<dyn HttpClientPort> = Arc::new(ReqwestHttp::new()?);
    let reporter: Arc<dyn Reporter> = Arc::new(TracingReporter);

    match cli.command.unwrap_or(Commands::Run { sources: None }) {
        Commands::Run { sources } => {
            let names = parse_sources(sources);
            info!("Running sources: {}", names.join(", "));
            let pipeline = Pipeline::from_config(&config, &names, http, reporter);
            match pipeline.run().await {
                Ok(report) => {
                    for (name, entry) in report.iter() {
                        info!(
                            "{}: {:?}, {} rows, missing values {:?}",
                            name, entry.status, entry.rows, entry.missing_values
                        );
                    }
                }
                Err(e) => error!("Pipeline run failed: {}", e),
            }
        }
        Commands::Budget => {
            run_single(constants::BUDGET_SOURCE, &config, http, reporter).await?
        }
        Commands::Football => {
            run_single(constants::FOOTBALL_SOURCE, &config, http, reporter).await?
        }
        Commands::Inpc => run_single(constants::INPC_SOURCE, &config, http, reporter).await?,
    }

    Ok(())
}
