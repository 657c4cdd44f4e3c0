use crate::llm::{LlmConfig, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "mismatch-report")]
#[command(about = "Migration mismatch report generator", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute stats, draw the chart, ask for the AI analysis and save every artifact
    Report(ReportArgs),
    /// Print mismatch stats only (no files written, no model call)
    Stats(StatsArgs),
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Migration CSV (columns: customer_id, legacy_product, migrated_product, si_reason_code)
    #[arg(long, alias = "file")]
    pub input: PathBuf,

    #[arg(long, default_value = "output")]
    pub output_dir: PathBuf,

    /// Skip the language model; the analysis file records why
    #[arg(long, default_value_t = false)]
    pub no_llm: bool,

    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f32,

    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, default_value_t = 120)]
    pub timeout_secs: u64,

    /// Return exit code 2 if any mismatch is found
    #[arg(long, default_value_t = false)]
    pub fail_on_mismatch: bool,
}

impl ReportArgs {
    pub fn llm_config(&self) -> LlmConfig {
        LlmConfig {
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    #[arg(long, alias = "file")]
    pub input: PathBuf,

    /// Print the summary as JSON on stdout
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
