mod cli;
mod common;
mod model;
mod rfv;
mod server;
mod storage;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();

    match args.cmd {
        cli::Command::Serve(cmd) => server::run(cmd).await.context("serve failed"),
        cli::Command::Run(cmd) => run_once(cmd).await.context("RFV run failed"),
    }
}

async fn run_once(opts: cli::RunArgs) -> anyhow::Result<()> {
    let store = storage::open(&opts.store)?;
    let stats = rfv::run(store.as_ref(), &opts.job.config(), Utc::now()).await?;
    let body = server::SuccessResponse {
        success: true,
        stats,
    };
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
