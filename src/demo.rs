//! Demo phase: run client templates against the freshly provisioned proxy.
//!
//! Templates are plain scripts written for a fixed virtual key and model name.
//! Before running, those literals (and the `{{VIRTUAL_KEY}}`, `{{MODEL_ALIAS}}`,
//! `{{BASE_URL}}` placeholders) are replaced with this run's values in a
//! single left-to-right pass, so a replacement is never itself rewritten. Bare
//! literals are still ambiguous: ordinary text that happens to equal one is
//! replaced too.
//!
//! The materialized script runs under the interpreter with the terminal's
//! streams; its output is not captured. Nothing here fails the run: missing
//! templates, spawn errors and nonzero exits are reported and skipped.
use crate::config::DemoConfig;
use crate::console::Console;
use crate::provision::{ProviderOutcome, ProvisionContext};
use crate::util::display_path;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::Duration;

/// Virtual keys hard-coded in the stock demo clients.
pub const LEGACY_KEY_PLACEHOLDERS: &[&str] = &[
    "vk-frontend-app",
    "vk-google-app",
    "vk-azure-app",
    "vk-vertex-app",
    "vk-my-app",
];
/// Model aliases hard-coded in the stock demo clients.
pub const LEGACY_MODEL_PLACEHOLDERS: &[&str] =
    &["gpt-4-turbo", "gpt-4o", "gemini-3-flash", "gemini-2-flash"];
pub const LEGACY_BASE_URL: &str = "http://localhost:8132";

pub const KEY_PLACEHOLDER: &str = "{{VIRTUAL_KEY}}";
pub const ALIAS_PLACEHOLDER: &str = "{{MODEL_ALIAS}}";
pub const BASE_URL_PLACEHOLDER: &str = "{{BASE_URL}}";

pub const VENV_INTERPRETER: &str = ".venv/bin/python3";

const PROMPT_POLL: Duration = Duration::from_millis(100);

/// Literal token -> replacement pairs applied to a template.
#[derive(Debug, Clone, Default)]
pub struct Substitutions {
    pairs: Vec<(String, String)>,
}

impl Substitutions {
    /// Pairs for one demo run. Earlier pairs win when tokens repeat.
    pub fn for_demo(session_key: &str, alias: &str, base_url: &str) -> Self {
        let mut pairs = vec![
            (KEY_PLACEHOLDER.to_string(), session_key.to_string()),
            (ALIAS_PLACEHOLDER.to_string(), alias.to_string()),
            (BASE_URL_PLACEHOLDER.to_string(), base_url.to_string()),
        ];
        pairs.extend(
            LEGACY_KEY_PLACEHOLDERS
                .iter()
                .map(|token| (token.to_string(), session_key.to_string())),
        );
        pairs.extend(
            LEGACY_MODEL_PLACEHOLDERS
                .iter()
                .map(|token| (token.to_string(), alias.to_string())),
        );
        pairs.push((LEGACY_BASE_URL.to_string(), base_url.to_string()));
        Self { pairs }
    }

    /// Replace every token occurrence in one pass. At each position the
    /// longest matching token is taken.
    pub fn apply(&self, template: &str) -> String {
        let mut tokens: Vec<&(String, String)> = self
            .pairs
            .iter()
            .filter(|(token, _)| !token.is_empty())
            .collect();
        tokens.sort_by_key(|(token, _)| std::cmp::Reverse(token.len()));

        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(ch) = rest.chars().next() {
            match tokens.iter().find(|(token, _)| rest.starts_with(token.as_str())) {
                Some((token, replacement)) => {
                    out.push_str(replacement);
                    rest = &rest[token.len()..];
                }
                None => {
                    out.push(ch);
                    rest = &rest[ch.len_utf8()..];
                }
            }
        }
        out
    }
}

/// What happened to one demo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DemoOutcome {
    Completed,
    Failed { exit_code: Option<i32> },
    TemplateNotFound { path: String },
    Fault { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DemoReport {
    pub template: String,
    pub alias: String,
    #[serde(flatten)]
    pub outcome: DemoOutcome,
}

/// Materializes templates and runs them under an interpreter.
#[derive(Debug, Clone)]
pub struct ExampleRunner {
    interpreter: PathBuf,
    dir: PathBuf,
    /// Send the script's stdout to our stderr so stdout stays machine-readable.
    stdout_to_stderr: bool,
}

impl ExampleRunner {
    pub fn new(interpreter: PathBuf, dir: PathBuf, stdout_to_stderr: bool) -> Self {
        Self {
            interpreter,
            dir,
            stdout_to_stderr,
        }
    }

    pub fn template_path(&self, template: &str) -> PathBuf {
        self.dir.join(template)
    }

    pub fn run_example(&self, template: &str, substitutions: &Substitutions) -> DemoOutcome {
        let path = self.template_path(template);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return DemoOutcome::TemplateNotFound {
                    path: path.display().to_string(),
                };
            }
            Err(err) => {
                return DemoOutcome::Fault {
                    reason: format!("read {}: {err}", path.display()),
                };
            }
        };

        let program = substitutions.apply(&text);
        match self.execute(template, &program) {
            Ok(status) if status.success() => DemoOutcome::Completed,
            Ok(status) => DemoOutcome::Failed {
                exit_code: status.code(),
            },
            Err(err) => DemoOutcome::Fault {
                reason: format!("{err:#}"),
            },
        }
    }

    fn execute(&self, template: &str, program: &str) -> Result<ExitStatus> {
        let suffix = Path::new(template)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let mut script = tempfile::Builder::new()
            .prefix("quickstart-demo-")
            .suffix(&suffix)
            .tempfile()
            .context("create demo script")?;
        script
            .write_all(program.as_bytes())
            .context("write demo script")?;
        script.flush().context("flush demo script")?;

        let stdout = if self.stdout_to_stderr {
            Stdio::from(io::stderr())
        } else {
            Stdio::inherit()
        };
        tracing::debug!(interpreter = %self.interpreter.display(), template, "running demo");
        Command::new(&self.interpreter)
            .arg(script.path())
            .stdin(Stdio::inherit())
            .stdout(stdout)
            .stderr(Stdio::inherit())
            .status()
            .with_context(|| format!("spawn {}", self.interpreter.display()))
    }
}

/// Pick the interpreter: explicit path or name, then the project venv, then
/// `python3` on `PATH`.
pub fn resolve_interpreter(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.components().count() == 1 && !path.exists() {
            return which::which(path)
                .with_context(|| format!("locate interpreter {} on PATH", path.display()));
        }
        return Ok(path.to_path_buf());
    }
    let venv = Path::new(VENV_INTERPRETER);
    if venv.is_file() {
        return Ok(venv.to_path_buf());
    }
    which::which("python3").context("locate python3 on PATH (or pass --interpreter)")
}

/// Set by Ctrl+C once the demo phase has started.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    /// Route Ctrl+C to this flag instead of terminating the process.
    pub fn install() -> Result<Self> {
        let interrupt = Self::default();
        let flag = Arc::clone(&interrupt.0);
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
            .context("install Ctrl+C handler")?;
        Ok(interrupt)
    }

    pub fn triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Yes,
    No,
    Interrupted,
}

pub fn parse_answer(line: &str) -> Confirmation {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Confirmation::Yes,
        _ => Confirmation::No,
    }
}

/// Ask a yes/no question on stdin. Ctrl+C while waiting reads as
/// [`Confirmation::Interrupted`]; EOF reads as no.
pub fn confirm(question: &str, console: &Console, interrupt: &Interrupt) -> Confirmation {
    console.prompt(&format!("{question} (y/n): "));
    let (tx, rx) = mpsc::channel();
    // The reader may stay blocked after an interrupt; it dies with the process.
    std::thread::spawn(move || {
        let mut line = String::new();
        let read = io::stdin().read_line(&mut line).map(|_| line);
        let _ = tx.send(read);
    });
    await_answer(&rx, interrupt)
}

/// Wait for one answer line, giving up as soon as `interrupt` fires.
pub fn await_answer(answers: &Receiver<io::Result<String>>, interrupt: &Interrupt) -> Confirmation {
    loop {
        if interrupt.triggered() {
            return Confirmation::Interrupted;
        }
        match answers.recv_timeout(PROMPT_POLL) {
            Ok(Ok(line)) => return parse_answer(&line),
            Ok(Err(_)) | Err(mpsc::RecvTimeoutError::Disconnected) => return Confirmation::No,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }
    }
}

/// A demo queued for a configured provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDemo {
    pub template: &'static str,
    pub alias: String,
}

/// Demos for providers whose assignment was issued, in provider order.
pub fn plan_demos(context: &ProvisionContext) -> Vec<PlannedDemo> {
    context
        .providers
        .iter()
        .filter_map(|report| match &report.outcome {
            ProviderOutcome::Configured { alias, .. } if context.models.contains_key(alias) => {
                Some(PlannedDemo {
                    template: report.provider.demo_template(),
                    alias: alias.clone(),
                })
            }
            _ => None,
        })
        .collect()
}

/// Everything the demo phase needs from the run.
pub struct DemoPhase<'a> {
    pub config: &'a DemoConfig,
    pub console: &'a Console,
    pub base_url: &'a str,
    pub stdout_to_stderr: bool,
}

impl DemoPhase<'_> {
    /// Offer and run demos for the provisioned aliases.
    pub fn run(&self, context: &ProvisionContext) -> Vec<DemoReport> {
        let planned = plan_demos(context);
        if planned.is_empty() {
            tracing::debug!("no aliases registered; demo phase skipped");
            return Vec::new();
        }
        if !self.config.enabled {
            self.console.detail("Examples skipped (--skip-examples)");
            return Vec::new();
        }

        let interpreter = match resolve_interpreter(self.config.interpreter.as_deref()) {
            Ok(path) => path,
            Err(err) => {
                self.console
                    .error(format!("Cannot run examples: {err:#}"));
                return Vec::new();
            }
        };
        let interrupt = Interrupt::install().unwrap_or_else(|err| {
            tracing::warn!(error = %format!("{err:#}"), "Ctrl+C will terminate the demo phase");
            Interrupt::default()
        });
        let runner = ExampleRunner::new(
            interpreter,
            self.config.dir.clone(),
            self.stdout_to_stderr,
        );
        self.offer(context, &planned, &runner, &interrupt, |interrupt| {
            confirm("Run examples now?", self.console, interrupt)
        })
    }

    /// Confirm through `ask` unless `--yes` was given, then run `planned`.
    fn offer(
        &self,
        context: &ProvisionContext,
        planned: &[PlannedDemo],
        runner: &ExampleRunner,
        interrupt: &Interrupt,
        ask: impl FnOnce(&Interrupt) -> Confirmation,
    ) -> Vec<DemoReport> {
        if !self.config.assume_yes {
            match ask(interrupt) {
                Confirmation::Yes => {}
                Confirmation::No => return Vec::new(),
                Confirmation::Interrupted => {
                    self.console.blank();
                    self.console.warning("Skipped");
                    return Vec::new();
                }
            }
        }
        self.console.blank();

        run_planned(
            runner,
            planned,
            &context.session.session_key,
            self.base_url,
            interrupt,
            self.console,
        )
    }
}

/// Run each planned demo in order until done or interrupted.
pub fn run_planned(
    runner: &ExampleRunner,
    planned: &[PlannedDemo],
    session_key: &str,
    base_url: &str,
    interrupt: &Interrupt,
    console: &Console,
) -> Vec<DemoReport> {
    let cwd = std::env::current_dir().ok();
    let mut reports = Vec::with_capacity(planned.len());
    for demo in planned {
        if interrupt.triggered() {
            console.warning("Interrupted; skipping remaining examples");
            return reports;
        }
        let path = runner.template_path(demo.template);
        console.step(format!(
            "Running example: {}",
            display_path(&path, cwd.as_deref())
        ));
        console.detail(format!("Model: {}, Key: {}", demo.alias, session_key));
        console.blank();

        let substitutions = Substitutions::for_demo(session_key, &demo.alias, base_url);
        let outcome = runner.run_example(demo.template, &substitutions);
        match &outcome {
            DemoOutcome::Completed => {}
            DemoOutcome::Failed { exit_code } => match exit_code {
                Some(code) => console.error(format!("Example exited with status {code}")),
                None => console.error("Example terminated by signal"),
            },
            DemoOutcome::TemplateNotFound { path } => {
                console.warning(format!("Example file not found: {path}"))
            }
            DemoOutcome::Fault { reason } => {
                console.error(format!("Example execution failed: {reason}"))
            }
        }
        console.blank();
        reports.push(DemoReport {
            template: demo.template.to_string(),
            alias: demo.alias.clone(),
            outcome,
        });
    }

    if interrupt.triggered() {
        console.warning("Interrupted");
    } else {
        console.highlight("🎉 All examples executed!");
    }
    reports
}

#[cfg(test)]
#[path = "demo_tests.rs"]
mod tests;
