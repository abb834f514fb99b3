//! Provisioning sequencer.
//!
//! A run moves through `Idle -> HealthVerified -> KeyCreated ->
//! ProviderConfigured(n) -> Complete`, or stops at `Aborted`. Only the health
//! gate and virtual key creation can abort. Providers are processed in a fixed
//! order and are isolated from each other: a missing credential is a skip, and
//! a failed step only ends that provider's chain.
//!
//! All run state lives in [`ProvisionContext`], which the caller owns and
//! passes by `&mut` so it survives an abort for reporting.
use crate::console::Console;
use crate::control_plane::{
    AssignmentRequest, ConnectionRequest, ControlPlane, ModelRequest, StepFailure,
};
use crate::health::HealthCheck;
use crate::providers::{Provider, ProviderSpec};
use crate::runner::HEALTH_TIMEOUT;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Alias -> model identifier for every issued assignment.
pub type ModelRegistry = BTreeMap<String, String>;

/// Per-run credential and the virtual key it was registered under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub session_key: String,
    pub key_name: String,
    pub virtual_key_id: Option<String>,
}

impl Session {
    pub fn new(epoch_secs: u64) -> Self {
        Self {
            session_key: format!("vk-quickstart-{epoch_secs}"),
            key_name: format!("QuickStart-{epoch_secs}"),
            virtual_key_id: None,
        }
    }

    /// Record the virtual key id. Only the first call takes effect.
    fn record_virtual_key(&mut self, id: String) -> bool {
        if self.virtual_key_id.is_some() {
            return false;
        }
        self.virtual_key_id = Some(id);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencerState {
    Idle,
    HealthVerified,
    KeyCreated,
    ProviderConfigured { attempted: usize },
    Complete,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionStep {
    Connection,
    Model,
    Assignment,
}

/// How one provider's chain ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProviderOutcome {
    Configured {
        connection_id: String,
        model_id: String,
        alias: String,
    },
    /// Credential not set; nothing was attempted.
    Skipped { reason: String },
    Failed { step: ProvisionStep, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderReport {
    pub provider: Provider,
    #[serde(flatten)]
    pub outcome: ProviderOutcome,
}

/// State accumulated across a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionContext {
    pub state: SequencerState,
    pub session: Session,
    pub providers: Vec<ProviderReport>,
    pub models: ModelRegistry,
}

impl ProvisionContext {
    pub fn new(session: Session) -> Self {
        Self {
            state: SequencerState::Idle,
            session,
            providers: Vec::new(),
            models: ModelRegistry::new(),
        }
    }
}

/// Conditions that stop a run.
#[derive(Debug)]
pub enum ProvisionError {
    ServiceUnreachable { base_url: String },
    VirtualKey(StepFailure),
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionError::ServiceUnreachable { base_url } => {
                write!(f, "proxy server is not reachable at {base_url}")
            }
            ProvisionError::VirtualKey(failure) => {
                write!(f, "virtual key creation failed: {failure}")
            }
        }
    }
}

impl std::error::Error for ProvisionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProvisionError::ServiceUnreachable { .. } => None,
            ProvisionError::VirtualKey(failure) => Some(failure),
        }
    }
}

/// Inputs that stay fixed for a run.
#[derive(Debug, Clone)]
pub struct SequencerSettings {
    pub base_url: String,
    pub tps: u32,
    /// Shown when the proxy is down, e.g. `./llm-proxy serve`.
    pub serve_hint: String,
}

pub struct Sequencer<'a, C, H> {
    control_plane: &'a C,
    health: &'a H,
    settings: &'a SequencerSettings,
    console: &'a Console,
}

impl<'a, C: ControlPlane, H: HealthCheck> Sequencer<'a, C, H> {
    pub fn new(
        control_plane: &'a C,
        health: &'a H,
        settings: &'a SequencerSettings,
        console: &'a Console,
    ) -> Self {
        Self {
            control_plane,
            health,
            settings,
            console,
        }
    }

    /// Drive a full run over `providers`, in the order given.
    pub fn run(
        &self,
        context: &mut ProvisionContext,
        providers: &[ProviderSpec],
    ) -> Result<(), ProvisionError> {
        self.verify_health(context)?;
        self.console.blank();
        self.create_virtual_key(context)?;

        for spec in providers {
            self.console.blank();
            self.console.step(format!(
                "{} Setting up {}",
                spec.provider.badge(),
                spec.provider.display_name()
            ));
            let outcome = self.configure_provider(context, spec);
            tracing::debug!(provider = %spec.provider, ?outcome, "provider attempted");
            context.providers.push(ProviderReport {
                provider: spec.provider,
                outcome,
            });
            context.state = SequencerState::ProviderConfigured {
                attempted: context.providers.len(),
            };
        }

        context.state = SequencerState::Complete;
        Ok(())
    }

    fn verify_health(&self, context: &mut ProvisionContext) -> Result<(), ProvisionError> {
        self.console.step("Checking proxy server...");
        if !self.health.check(&self.settings.base_url, HEALTH_TIMEOUT) {
            context.state = SequencerState::Aborted;
            self.console.error(format!(
                "Proxy server is not running at {}",
                self.settings.base_url
            ));
            self.console
                .step(format!("Start it with: {}", self.settings.serve_hint));
            return Err(ProvisionError::ServiceUnreachable {
                base_url: self.settings.base_url.clone(),
            });
        }
        self.console.success("Proxy server is running");
        context.state = SequencerState::HealthVerified;
        Ok(())
    }

    fn create_virtual_key(&self, context: &mut ProvisionContext) -> Result<(), ProvisionError> {
        self.console.step("Creating virtual key...");
        let session = &mut context.session;
        match self
            .control_plane
            .create_virtual_key(&session.key_name, &session.session_key)
        {
            Ok(handle) => {
                tracing::info!(kind = %handle.kind, id = %handle.id, "created");
                self.console
                    .success(format!("Virtual key created: {}", handle.id));
                self.console.detail(format!("Key: {}", session.session_key));
                session.record_virtual_key(handle.id);
                context.state = SequencerState::KeyCreated;
                Ok(())
            }
            Err(failure) => {
                context.state = SequencerState::Aborted;
                self.console.error("Failed to create virtual key");
                self.console.detail(&failure);
                Err(ProvisionError::VirtualKey(failure))
            }
        }
    }

    /// Connection -> model -> assignment for one provider.
    fn configure_provider(
        &self,
        context: &mut ProvisionContext,
        spec: &ProviderSpec,
    ) -> ProviderOutcome {
        let Some(api_key) = spec.credential() else {
            let reason = format!("{} not set", spec.provider.api_key_env());
            self.console
                .warning(format!("Skipping {} ({reason})", spec.connection_name));
            return ProviderOutcome::Skipped { reason };
        };

        self.console
            .step(format!("Creating connection: {}", spec.connection_name));
        let connection = match self.control_plane.create_connection(&ConnectionRequest {
            provider: spec.provider.as_str(),
            name: &spec.connection_name,
            endpoint: spec.endpoint.as_deref(),
            api_key,
        }) {
            Ok(handle) => handle,
            Err(failure) => {
                self.console.error(format!(
                    "Failed to create connection {}",
                    spec.connection_name
                ));
                return self.failed(ProvisionStep::Connection, failure);
            }
        };
        tracing::info!(provider = %spec.provider, kind = %connection.kind, id = %connection.id, "created");
        self.console
            .success(format!("Connection created: {}", connection.id));

        self.console.step(format!(
            "Adding model: {} → {}",
            spec.model_name, spec.remote_model_name
        ));
        let model = match self.control_plane.create_model(&ModelRequest {
            connection_id: &connection.id,
            name: &spec.model_name,
            remote_name: &spec.remote_model_name,
        }) {
            Ok(handle) => handle,
            Err(failure) => {
                self.console
                    .error(format!("Failed to create model {}", spec.model_name));
                return self.failed(ProvisionStep::Model, failure);
            }
        };
        tracing::info!(provider = %spec.provider, kind = %model.kind, id = %model.id, "created");
        self.console.success(format!("Model created: {}", model.id));

        let Some(virtual_key_id) = context.session.virtual_key_id.as_deref() else {
            return ProviderOutcome::Failed {
                step: ProvisionStep::Assignment,
                reason: "no virtual key".to_string(),
            };
        };

        self.console.step(format!(
            "Assigning model: {} (TPS: {})",
            spec.model_alias, self.settings.tps
        ));
        let acknowledged = self.control_plane.assign_model(&AssignmentRequest {
            virtual_key_id,
            model_id: &model.id,
            alias: &spec.model_alias,
            tps: self.settings.tps,
        });
        if !acknowledged {
            tracing::warn!(alias = %spec.model_alias, "assign command did not report success");
        }
        if let Some(previous) = context
            .models
            .insert(spec.model_alias.clone(), model.id.clone())
        {
            tracing::warn!(alias = %spec.model_alias, %previous, "alias reassigned");
        }
        self.console
            .success(format!("Model assigned: {}", spec.model_alias));

        ProviderOutcome::Configured {
            connection_id: connection.id,
            model_id: model.id,
            alias: spec.model_alias.clone(),
        }
    }

    fn failed(&self, step: ProvisionStep, failure: StepFailure) -> ProviderOutcome {
        self.console.detail(&failure);
        ProviderOutcome::Failed {
            step,
            reason: failure.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "provision_tests.rs"]
mod tests;
