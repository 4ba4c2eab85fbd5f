//! Scheduled KPI ETL: fetch the dashboard workbook from the document store,
//! normalize its sheets into one dataset, and stage it for the downstream
//! transform procedure.

mod auth;
mod config;
mod fetch;
mod load;
mod logging;
mod normalize;
mod pipeline;
mod secrets;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use crate::auth::CredentialResolver;
use crate::config::Config;
use crate::fetch::DriveItemFetcher;
use crate::load::{SqlStagingClient, StagedLoader};
use crate::pipeline::{RunController, RunOutcome};

#[derive(Parser, Debug)]
#[command(
    name = "kpi-etl",
    about = "Stage KPI workbook data for the dashboard transform",
    version
)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    if cli.check_config {
        println!("Configuration OK");
        return Ok(ExitCode::SUCCESS);
    }

    logging::init(&config.logging)?;

    let secrets = secrets::from_config(&config.auth.secret)?;
    let resolver = CredentialResolver::new(config.auth.clone(), secrets);
    let fetcher = DriveItemFetcher::new(config.source.clone());

    // The pool connects on first use, so an unreachable engine surfaces as a
    // staging error inside the run rather than here
    let pool = PgPoolOptions::new()
        .connect_lazy(&config.database.url)
        .context("Invalid database URL")?;
    let loader = StagedLoader::new(
        config.database.clone(),
        Box::new(SqlStagingClient::new(pool)),
    );

    let controller = RunController::new(Box::new(resolver), Box::new(fetcher), loader);
    match controller.run().await {
        RunOutcome::Succeeded { .. } => Ok(ExitCode::SUCCESS),
        RunOutcome::Failed { .. } => Ok(ExitCode::FAILURE),
    }
}
