//! The `quickstart` run: resolve config, provision, summarize, offer demos.
//!
//! Exit status is the only failure signal: an unreachable proxy or a failed
//! virtual key returns an error, everything after that is reported and the
//! run still succeeds.
use crate::cli::RunArgs;
use crate::config::{load_config_file, resolve_config, ConfigFile};
use crate::console::{color_enabled, Console};
use crate::control_plane::CliControlPlane;
use crate::demo::{DemoPhase, DemoReport};
use crate::health::HttpHealthCheck;
use crate::provision::{ProvisionContext, Sequencer, SequencerSettings, Session};
use crate::runner::ProcessRunner;
use crate::util::now_epoch_secs;
use anyhow::{Context, Result};
use serde::Serialize;

/// Machine-readable summary printed with `--json`.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub base_url: &'a str,
    #[serde(flatten)]
    pub provision: &'a ProvisionContext,
    pub demos: Vec<DemoReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn run_quickstart(args: &RunArgs) -> Result<()> {
    let env = |key: &str| std::env::var(key).ok();
    let file = match &args.config {
        Some(path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };
    let config = resolve_config(args, file, &env);
    let console = Console::new(color_enabled(args.no_color, &env), args.json);

    let control_plane = CliControlPlane::new(ProcessRunner, &config.control_plane)?;
    let health = HttpHealthCheck;
    let settings = SequencerSettings {
        base_url: config.base_url.clone(),
        tps: config.tps,
        serve_hint: config.serve_hint(),
    };
    let mut context = ProvisionContext::new(Session::new(now_epoch_secs()?));
    tracing::debug!(
        base_url = %config.base_url,
        providers = config.providers.len(),
        db_type = %config.control_plane.db_type,
        "quick start configured"
    );

    console.blank();
    console.banner("🚀 LLM Proxy Quick Start", false);
    console.blank();

    let sequencer = Sequencer::new(&control_plane, &health, &settings, &console);
    if let Err(err) = sequencer.run(&mut context, &config.providers) {
        if args.json {
            print_report(&RunReport {
                base_url: &config.base_url,
                provision: &context,
                demos: Vec::new(),
                error: Some(err.to_string()),
            })?;
        }
        return Err(err.into());
    }

    console.blank();
    print_summary(&console, &context, &config.base_url);

    let demos = DemoPhase {
        config: &config.demos,
        console: &console,
        base_url: &config.base_url,
        stdout_to_stderr: args.json,
    }
    .run(&context);

    if args.json {
        print_report(&RunReport {
            base_url: &config.base_url,
            provision: &context,
            demos,
            error: None,
        })?;
    }
    Ok(())
}

fn print_summary(console: &Console, context: &ProvisionContext, base_url: &str) {
    console.banner("✨ Setup Complete!", true);
    console.blank();
    console.line(format!("Virtual Key: {}", context.session.session_key));
    console.line(format!("Base URL: {base_url}"));
    if context.models.is_empty() {
        console.warning("No models were assigned; set a provider API key and re-run");
    } else {
        console.line("Models:");
        for (alias, model_id) in &context.models {
            console.detail(format!("{alias} → {model_id}"));
        }
    }
    console.blank();
}

fn print_report(report: &RunReport<'_>) -> Result<()> {
    let text = serde_json::to_string_pretty(report).context("serialize run report")?;
    println!("{text}");
    Ok(())
}
