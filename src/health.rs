//! Liveness probe for the proxy server.
use std::time::Duration;

/// Answers whether the proxy at `base_url` is up.
pub trait HealthCheck {
    fn check(&self, base_url: &str, timeout: Duration) -> bool;
}

/// Probes `GET {base_url}/health` over HTTP.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpHealthCheck;

impl HealthCheck for HttpHealthCheck {
    fn check(&self, base_url: &str, timeout: Duration) -> bool {
        let url = health_url(base_url);
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        match agent.get(&url).call() {
            Ok(response) => {
                let healthy = response.status().is_success();
                tracing::debug!(url = %url, status = response.status().as_u16(), healthy, "health probe");
                healthy
            }
            Err(err) => {
                tracing::debug!(url = %url, error = %err, "health probe failed");
                false
            }
        }
    }
}

pub fn health_url(base_url: &str) -> String {
    format!("{}/health", base_url.trim_end_matches('/'))
}
