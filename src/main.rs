use anyhow::Result;
use bursar::cli::Cli;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    bursar::telemetry::init(cli.verbose);
    cli.run().await
}
