mod analysis;
mod chart;
mod cli;
mod error;
mod llm;
mod loader;
mod pipeline;
mod structures;
mod writer;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // .env is optional
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Report(args) => {
            let strict = args.fail_on_mismatch;
            let outcome = pipeline::run_report(args)?;
            let code = pipeline::exit_code(&outcome, strict);
            if code != 0 {
                warn!(
                    total_mismatches = outcome.stats.total_mismatches,
                    "mismatches found (fail_on_mismatch=true)"
                );
                std::process::exit(code);
            }
        }
        Commands::Stats(args) => {
            pipeline::stats::run_stats(args)?;
        }
    }

    Ok(())
}
