//! Command-line surface of the quick start.
//!
//! There is one entry point. Flags override the optional JSON config file,
//! which overrides the environment; see [`crate::config`].
use crate::providers::Provider;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "quickstart",
    version,
    about = "Provision the LLM proxy (virtual key, connections, models) and run demo clients",
    after_help = "Environment:\n  OPENAI_API_KEY, OPENAI_API_ENDPOINT\n  AZURE_OPENAI_API_KEY, AZURE_OPENAI_ENDPOINT\n  GOOGLE_VERTEX_API_KEY, GOOGLE_GEMINI_ENDPOINT\n  DB_TYPE, DB_DSN             forwarded to every llm-proxy call\n  LLM_PROXY_CLI, LLM_PROXY_URL\n\nExamples:\n  quickstart\n  quickstart --provider azure --skip-examples\n  quickstart --cli 'go run .' --json"
)]
pub struct RunArgs {
    /// Provider(s) to set up
    #[arg(long, value_enum, default_value_t = ProviderSelector::All)]
    pub provider: ProviderSelector,

    /// Skip the demo phase entirely
    #[arg(long)]
    pub skip_examples: bool,

    /// Run demos without asking for confirmation
    #[arg(long, short = 'y', conflicts_with = "skip_examples")]
    pub yes: bool,

    /// Proxy base URL used for the health check and demo substitution
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Control-plane command prefix (default: ./llm-proxy)
    #[arg(long, value_name = "CMD")]
    pub cli: Option<String>,

    /// Store type forwarded as --db-type
    #[arg(long, value_name = "TYPE")]
    pub db_type: Option<String>,

    /// Store DSN forwarded as --dsn
    #[arg(long, value_name = "DSN")]
    pub dsn: Option<String>,

    /// Requests-per-second cap for each assignment
    #[arg(long, value_name = "N")]
    pub tps: Option<u32>,

    /// Directory containing demo templates (default: examples)
    #[arg(long, value_name = "DIR")]
    pub demos_dir: Option<PathBuf>,

    /// Interpreter used to run demo templates
    #[arg(long, value_name = "PATH")]
    pub interpreter: Option<PathBuf>,

    /// JSON config file with overrides
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print a machine-readable run report on stdout (progress moves to stderr)
    #[arg(long)]
    pub json: bool,

    /// Disable ANSI colours
    #[arg(long)]
    pub no_color: bool,
}

/// `--provider` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ProviderSelector {
    Openai,
    Azure,
    Google,
    #[default]
    All,
}

impl ProviderSelector {
    pub fn includes(self, provider: Provider) -> bool {
        match self {
            ProviderSelector::All => true,
            ProviderSelector::Openai => provider == Provider::Openai,
            ProviderSelector::Azure => provider == Provider::Azure,
            ProviderSelector::Google => provider == Provider::Google,
        }
    }
}
