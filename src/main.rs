#![allow(missing_docs)]

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use listing_harvester_lib::domain::parse_pages_required;
use listing_harvester_lib::infrastructure::{csv_export, logging};
use listing_harvester_lib::{AppConfig, AppState, HarvestError};

const EXIT_NOT_FOUND: u8 = 2;
const EXIT_UPSTREAM: u8 = 3;
const EXIT_USAGE: u8 = 64;

#[derive(Parser, Debug)]
#[command(
    name = "listing-harvester",
    version,
    about = "Incremental scrape-cache-serve pipeline for marketplace search listings"
)]
struct Cli {
    /// Config file (defaults to config/default.* when present)
    #[arg(long, global = true, env = "HARVESTER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve N pages of listings for a term, scraping only missing pages
    Products {
        #[arg(long)]
        term: String,

        /// Number of result pages required (positive integer)
        #[arg(long)]
        pages: Option<String>,

        /// CSV destination; a directory gets the suggested file name. Defaults to stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Re-scrape every known query over its full scraped range
    Refresh {
        /// Print the report as JSON on stdout
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Delete a query and all of its stored listings
    Forget {
        #[arg(long)]
        term: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    if let Err(err) = logging::init_logging_with_config(&config.logging) {
        eprintln!("Failed to initialize logging: {err:#}");
        return ExitCode::FAILURE;
    }
    logging::log_system_info();

    match run(cli.command, config).await {
        Ok(code) => code,
        Err(err) => {
            error!("💥 {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: AppConfig) -> Result<ExitCode> {
    let state = AppState::bootstrap(config).await?;

    match command {
        Command::Products {
            term,
            pages,
            output,
        } => products(&state, &term, pages.as_deref(), output.as_deref()).await,
        Command::Refresh { json } => {
            let report = state.refresh.refresh_all().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Ok(if report.queries_failed == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Forget { term } => {
            let Some(term) = listing_harvester_lib::domain::normalize_term(&term) else {
                warn!("A search term is required");
                return Ok(ExitCode::from(EXIT_USAGE));
            };
            if state.store.delete_query(&term).await? {
                info!("🗑️ Deleted query '{}' and its listings", term);
            } else {
                info!("No stored query for '{}'", term);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn products(
    state: &AppState,
    term: &str,
    pages: Option<&str>,
    output: Option<&Path>,
) -> Result<ExitCode> {
    let result = match parse_pages_required(pages) {
        Ok(pages_required) => state.on_demand.get_products(term, pages_required).await,
        Err(err) => Err(err),
    };

    let response = match result {
        Ok(response) => response,
        Err(HarvestError::InvalidInput(message)) => {
            warn!("Invalid input: {}", message);
            return Ok(ExitCode::from(EXIT_USAGE));
        }
        Err(err @ HarvestError::NotFound { .. }) => {
            warn!("{}", err);
            return Ok(ExitCode::from(EXIT_NOT_FOUND));
        }
        Err(err @ HarvestError::UpstreamUnavailable(_)) => {
            warn!("{}", err);
            return Ok(ExitCode::from(EXIT_UPSTREAM));
        }
        Err(err) => return Err(err.into()),
    };

    if response.is_short() || response.is_partial() {
        warn!(
            "Scrape stopped early ({}); serving pages 1..={} of {} requested",
            response.halt.map(|h| h.as_str()).unwrap_or("none"),
            response.served_through_page,
            response.pages_required
        );
    }

    match output {
        Some(path) => {
            let path = if path.is_dir() {
                path.join(response.suggested_filename())
            } else {
                path.to_path_buf()
            };
            csv_export::write_rows_to_path(&path, &response.rows)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("💾 Wrote {} rows to {}", response.rows.len(), path.display());
        }
        None => csv_export::write_rows(io::stdout().lock(), &response.rows)
            .context("Failed to write CSV to stdout")?,
    }

    Ok(ExitCode::SUCCESS)
}
