use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use triage_engine::HttpJobService;

mod app;
mod cli;
mod effects;
mod logging;
mod render;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::initialize(cli.log_destination(), cli.log_level());

    let service = Arc::new(HttpJobService::new(cli.service_settings())?);

    match cli.command {
        Command::Watch { job, tick_ms } => {
            app::watch(service, job, Duration::from_millis(tick_ms)).await?
        }
        Command::Submit { files } => app::submit(service.as_ref(), &files).await?,
        Command::Email { id } => app::print_email(service.as_ref(), id).await?,
    }

    Ok(())
}
