//! Prompt construction and HTTP-backed model collaborators.

pub mod completion;
pub mod embeddings;
pub mod prompt;

use std::time::Duration;

use crate::config::LlmConfig;
use crate::ports::ComponentStatus;

/// Outer bound on any single provider request. Per-stage timeouts in the
/// engine are normally tighter.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

pub fn build_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(HTTP_TIMEOUT)
        .build()
}

/// Cheap reachability check against the provider's model listing endpoint.
pub(crate) async fn check_provider(client: &reqwest::Client, config: &LlmConfig) -> ComponentStatus {
    let url = match config.provider.as_str() {
        "ollama" => format!("{}/api/tags", config.base_url),
        "openai" => format!("{}/v1/models", config.base_url),
        other => return ComponentStatus::Unhealthy(format!("Unknown LLM provider: {other}")),
    };

    let mut req = client.get(&url).timeout(Duration::from_secs(5));
    if let Some(key) = config.api_key.as_deref() {
        req = req.header("Authorization", format!("Bearer {key}"));
    }

    match req.send().await {
        Ok(resp) if resp.status().is_success() => ComponentStatus::Healthy,
        Ok(resp) => ComponentStatus::Unhealthy(format!("{url} returned {}", resp.status())),
        Err(e) => ComponentStatus::Unhealthy(format!("{url} unreachable: {e}")),
    }
}
