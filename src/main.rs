mod auth;
mod cli;
mod config;
mod error;
mod output;
mod rundeck;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting rundeck-job");
    cli.execute().await
}
