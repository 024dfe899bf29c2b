//! tre-packer: bundle one reference's files and print the outcome message.
//!
//! Configuration comes from the environment (and `.env`); see `PackerConfig`.

use anyhow::Context;
use clap::Parser;
use packer_cli::{read_event, render_outcome};
use packer_core::PackerConfig;
use packer_infra::{init_telemetry, shutdown_telemetry};
use packer_services::PackerHandler;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tre-packer", about = "Package a reference's files into a tar.gz")]
struct Args {
    /// Input event JSON file, `-` for stdin
    #[arg(long, default_value = "-")]
    event: PathBuf,

    /// Pretty-print the outcome message
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = PackerConfig::from_env().context("Failed to load configuration")?;
    init_telemetry(&config.process_name, &config.environment, config.log_format)?;

    tracing::info!(
        environment = %config.environment,
        mode = %config.mode,
        out_bucket = %config.out_bucket,
        storage_backend = %config.storage.backend,
        "Packer starting"
    );

    let event = read_event(&args.event)?;
    let handler = PackerHandler::from_config(config)
        .await
        .context("Failed to initialize packer")?;

    let result = handler.handle(event).await;
    shutdown_telemetry();

    let outcome = result.context("Invocation failed")?;
    println!("{}", render_outcome(outcome.as_ref(), args.pretty)?);
    Ok(())
}
