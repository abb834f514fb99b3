//! Upstream provider catalogue.
//!
//! Each provider carries the environment variables it reads, the connection
//! and model names registered with the proxy, and the demo template that
//! exercises its alias. Processing order is the order of [`Provider::ALL`].
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upstream LLM providers the quick start knows how to register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Openai,
    Azure,
    Google,
}

impl Provider {
    /// Fixed processing order; keeps console output stable for scripted use.
    pub const ALL: [Provider; 3] = [Provider::Openai, Provider::Azure, Provider::Google];

    /// Value passed to `connection add --provider`.
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Openai => "openai",
            Provider::Azure => "azure",
            Provider::Google => "google",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Provider::Openai => "OpenAI",
            Provider::Azure => "Azure OpenAI",
            Provider::Google => "Google Vertex AI",
        }
    }

    pub fn badge(self) -> &'static str {
        match self {
            Provider::Openai => "🔴",
            Provider::Azure => "🔵",
            Provider::Google => "🟢",
        }
    }

    pub fn api_key_env(self) -> &'static str {
        match self {
            Provider::Openai => "OPENAI_API_KEY",
            Provider::Azure => "AZURE_OPENAI_API_KEY",
            Provider::Google => "GOOGLE_VERTEX_API_KEY",
        }
    }

    pub fn endpoint_env(self) -> &'static str {
        match self {
            Provider::Openai => "OPENAI_API_ENDPOINT",
            Provider::Azure => "AZURE_OPENAI_ENDPOINT",
            Provider::Google => "GOOGLE_GEMINI_ENDPOINT",
        }
    }

    /// Endpoint used when the environment does not name one. Azure endpoints
    /// are per-resource, so there is no sensible default.
    pub fn default_endpoint(self) -> Option<&'static str> {
        match self {
            Provider::Openai => Some("https://api.openai.com"),
            Provider::Azure => None,
            Provider::Google => Some("https://aiplatform.googleapis.com"),
        }
    }

    /// Demo script that talks to this provider's alias.
    pub fn demo_template(self) -> &'static str {
        match self {
            Provider::Openai => "example_openai.py",
            Provider::Azure => "example_azure.py",
            Provider::Google => "example_google_vertex_http.py",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to register one provider with the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSpec {
    pub provider: Provider,
    pub connection_name: String,
    pub endpoint: Option<String>,
    /// Upstream API key. `None` means the provider is skipped.
    pub credential: Option<String>,
    /// Local model name registered under the connection.
    pub model_name: String,
    pub remote_model_name: String,
    /// Caller-visible alias bound to the virtual key.
    pub model_alias: String,
}

impl ProviderSpec {
    /// Built-in registration for `provider` with the given environment values.
    ///
    /// Empty strings count as unset, matching how shells export blank values.
    pub fn with_defaults(
        provider: Provider,
        credential: Option<String>,
        endpoint: Option<String>,
    ) -> Self {
        let (connection_name, model_name, remote_model_name, model_alias) = match provider {
            Provider::Openai => ("OpenAI-Main", "gpt-4-turbo", "gpt-4-turbo-preview", "gpt-4-turbo"),
            Provider::Azure => ("Azure-Main", "gpt-4o", "gpt-4o", "gpt-4o"),
            Provider::Google => (
                "Google-Vertex",
                "gemini-3-flash",
                "gemini-3-flash-preview",
                "gemini-3-flash-preview",
            ),
        };
        let endpoint = non_empty(endpoint).or_else(|| provider.default_endpoint().map(str::to_string));
        ProviderSpec {
            provider,
            connection_name: connection_name.to_string(),
            endpoint,
            credential: non_empty(credential),
            model_name: model_name.to_string(),
            remote_model_name: remote_model_name.to_string(),
            model_alias: model_alias.to_string(),
        }
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
