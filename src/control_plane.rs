//! Control-plane operations against the proxy's management store.
//!
//! [`ControlPlane`] is what the sequencer talks to. [`CliControlPlane`] is the
//! text-scrape transport: it shells out to the `llm-proxy` CLI and treats the
//! first UUID-shaped token in its combined output as the created resource.
//! Success is judged from that token alone, never from the exit status, since
//! an idempotent create can exit nonzero and still report the resource.
use crate::config::ControlPlaneConfig;
use crate::extract::extract_identifier;
use crate::runner::CommandRunner;
use crate::util::truncate_string;
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

const MAX_FAILURE_EXCERPT_BYTES: usize = 240;

/// Resources the control plane creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    VirtualKey,
    Connection,
    Model,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::VirtualKey => "virtual key",
            ResourceKind::Connection => "connection",
            ResourceKind::Model => "model",
        })
    }
}

/// A freshly created resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    pub kind: ResourceKind,
    pub id: String,
}

/// A create call that did not yield an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub kind: ResourceKind,
    /// Leading slice of whatever the transport returned.
    pub excerpt: String,
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let excerpt = self.excerpt.trim();
        if excerpt.is_empty() {
            write!(f, "no output while creating {}", self.kind)
        } else {
            write!(f, "no {} identifier in output: {}", self.kind, excerpt)
        }
    }
}

impl std::error::Error for StepFailure {}

pub struct ConnectionRequest<'a> {
    pub provider: &'a str,
    pub name: &'a str,
    pub endpoint: Option<&'a str>,
    pub api_key: &'a str,
}

pub struct ModelRequest<'a> {
    pub connection_id: &'a str,
    pub name: &'a str,
    pub remote_name: &'a str,
}

pub struct AssignmentRequest<'a> {
    pub virtual_key_id: &'a str,
    pub model_id: &'a str,
    pub alias: &'a str,
    pub tps: u32,
}

/// Management operations the quick start needs from the proxy.
pub trait ControlPlane {
    fn create_virtual_key(&self, name: &str, key: &str) -> Result<ResourceHandle, StepFailure>;

    fn create_connection(
        &self,
        request: &ConnectionRequest<'_>,
    ) -> Result<ResourceHandle, StepFailure>;

    fn create_model(&self, request: &ModelRequest<'_>) -> Result<ResourceHandle, StepFailure>;

    /// Issue the assignment. Returns whether the transport reported success;
    /// assignments do not echo an identifier worth keeping.
    fn assign_model(&self, request: &AssignmentRequest<'_>) -> bool;
}

/// [`ControlPlane`] backed by the `llm-proxy` command-line tool.
pub struct CliControlPlane<R> {
    runner: R,
    program: Vec<String>,
    db_type: String,
    dsn: String,
    timeout: Duration,
}

impl<R: CommandRunner> CliControlPlane<R> {
    /// Build a transport from config; the command prefix is split with shell
    /// word rules so wrappers like `go run .` are accepted.
    pub fn new(runner: R, config: &ControlPlaneConfig) -> Result<Self> {
        let program = shell_words::split(&config.command)
            .with_context(|| format!("parse control-plane command: {}", config.command))?;
        if program.is_empty() {
            return Err(anyhow!("control-plane command is empty"));
        }
        Ok(Self {
            runner,
            program,
            db_type: config.db_type.clone(),
            dsn: config.dsn.clone(),
            timeout: config.timeout,
        })
    }

    fn argv(&self, subcommand: &[&str], flags: &[(&str, &str)]) -> Vec<String> {
        let mut argv = self.program.clone();
        argv.extend(subcommand.iter().map(|word| word.to_string()));
        argv.extend([
            "--db-type".to_string(),
            self.db_type.clone(),
            "--dsn".to_string(),
            self.dsn.clone(),
        ]);
        for (flag, value) in flags {
            argv.push(flag.to_string());
            argv.push(value.to_string());
        }
        argv
    }

    fn create(&self, kind: ResourceKind, argv: Vec<String>) -> Result<ResourceHandle, StepFailure> {
        let result = self.runner.run(&argv, self.timeout);
        match extract_identifier(&result.text) {
            Some(id) => {
                if !result.succeeded {
                    tracing::debug!(%kind, %id, "identifier reported despite failed exit");
                }
                Ok(ResourceHandle { kind, id })
            }
            None => Err(StepFailure {
                kind,
                excerpt: truncate_string(&result.text, MAX_FAILURE_EXCERPT_BYTES),
            }),
        }
    }
}

impl<R: CommandRunner> ControlPlane for CliControlPlane<R> {
    fn create_virtual_key(&self, name: &str, key: &str) -> Result<ResourceHandle, StepFailure> {
        let argv = self.argv(&["vkey", "add"], &[("--name", name), ("--key", key)]);
        self.create(ResourceKind::VirtualKey, argv)
    }

    fn create_connection(
        &self,
        request: &ConnectionRequest<'_>,
    ) -> Result<ResourceHandle, StepFailure> {
        let mut flags = vec![("--provider", request.provider), ("--name", request.name)];
        if let Some(endpoint) = request.endpoint {
            flags.push(("--endpoint", endpoint));
        }
        flags.push(("--api-key", request.api_key));
        let argv = self.argv(&["connection", "add"], &flags);
        self.create(ResourceKind::Connection, argv)
    }

    fn create_model(&self, request: &ModelRequest<'_>) -> Result<ResourceHandle, StepFailure> {
        let argv = self.argv(
            &["model", "add"],
            &[
                ("--conn-id", request.connection_id),
                ("--name", request.name),
                ("--remote", request.remote_name),
            ],
        );
        self.create(ResourceKind::Model, argv)
    }

    fn assign_model(&self, request: &AssignmentRequest<'_>) -> bool {
        let tps = request.tps.to_string();
        let argv = self.argv(
            &["assign"],
            &[
                ("--vkey-id", request.virtual_key_id),
                ("--model-id", request.model_id),
                ("--alias", request.alias),
                ("--tps", &tps),
            ],
        );
        self.runner.run(&argv, self.timeout).succeeded
    }
}
