mod cli;
mod driver;

use anyhow::Context;
use clap::Parser;
use engine_logging::level_for_verbosity;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    engine_logging::initialize(cli.log_destination(), level_for_verbosity(cli.verbose));

    let runtime = tokio::runtime::Runtime::new().context("starting tokio runtime")?;
    runtime.block_on(driver::run(cli))
}
