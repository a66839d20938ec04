use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::EmbeddingError;
use crate::llm::check_provider;
use crate::ports::{ComponentStatus, EmbeddingClient};

/// Maximum characters to send per text to the embedding API.
/// nomic-embed-text has an 8 192-token context; prose tokenises at roughly
/// 1 token per 3-4 chars, dense content closer to 1 per 2.
const MAX_EMBED_CHARS: usize = 3_000;

/// Truncate `text` to at most `MAX_EMBED_CHARS` bytes, splitting on a UTF-8 char boundary.
fn truncate_for_embedding(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    // Find the last char boundary at or before the limit
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Query embedding via Ollama or an OpenAI-compatible API.
pub struct HttpEmbeddingClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl HttpEmbeddingClient {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let input = truncate_for_embedding(text).to_string();
        let vectors = match self.config.provider.as_str() {
            "ollama" => embed_ollama(&self.client, &self.config, input).await?,
            "openai" => embed_openai(&self.client, &self.config, input).await?,
            other => {
                return Err(EmbeddingError::Provider(format!(
                    "Unknown LLM provider: {other}"
                )))
            }
        };

        match vectors.into_iter().next() {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(EmbeddingError::Empty),
        }
    }

    async fn health_check(&self) -> ComponentStatus {
        check_provider(&self.client, &self.config).await
    }
}

fn request_error(provider: &str, e: reqwest::Error) -> EmbeddingError {
    if e.is_timeout() {
        EmbeddingError::Timeout(None)
    } else {
        EmbeddingError::Provider(format!("Failed to call {provider} embed API: {e}"))
    }
}

async fn check_status(
    provider: &str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, EmbeddingError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(EmbeddingError::Provider(format!(
        "{provider} embed API returned {status}: {body}"
    )))
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaEmbedRequest {
    model: String,
    input: Vec<String>,
    /// Ask Ollama to truncate inputs that exceed the model's context length
    /// instead of returning a 400 error.
    truncate: bool,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

async fn embed_ollama(
    client: &reqwest::Client,
    config: &LlmConfig,
    text: String,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let url = format!("{}/api/embed", config.base_url);
    let req = OllamaEmbedRequest {
        model: config.embedding_model.clone(),
        input: vec![text],
        truncate: true,
    };

    let resp = client
        .post(&url)
        .json(&req)
        .send()
        .await
        .map_err(|e| request_error("Ollama", e))?;
    let resp = check_status("Ollama", resp).await?;

    let body: OllamaEmbedResponse = resp.json().await.map_err(|e| {
        EmbeddingError::Provider(format!("Failed to parse Ollama embed response: {e}"))
    })?;
    Ok(body.embeddings)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiEmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    embedding: Vec<f32>,
}

async fn embed_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    text: String,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let url = format!("{}/v1/embeddings", config.base_url);
    let api_key = config.api_key.as_deref().unwrap_or_default();
    let req = OpenAiEmbedRequest {
        model: config.embedding_model.clone(),
        input: vec![text],
    };

    let resp = client
        .post(&url)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&req)
        .send()
        .await
        .map_err(|e| request_error("OpenAI", e))?;
    let resp = check_status("OpenAI", resp).await?;

    let body: OpenAiEmbedResponse = resp.json().await.map_err(|e| {
        EmbeddingError::Provider(format!("Failed to parse OpenAI embed response: {e}"))
    })?;
    Ok(body.data.into_iter().map(|d| d.embedding).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_text_untouched() {
        assert_eq!(truncate_for_embedding("refund policy"), "refund policy");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        // 'é' is two bytes; 1 501 of them straddle the limit
        let text = "é".repeat(1_501);
        let cut = truncate_for_embedding(&text);
        assert!(cut.len() <= MAX_EMBED_CHARS);
        assert!(cut.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_parse_ollama_response() {
        let body: OllamaEmbedResponse =
            serde_json::from_str(r#"{"model":"m","embeddings":[[0.1,0.2,0.3]]}"#).unwrap();
        assert_eq!(body.embeddings, vec![vec![0.1, 0.2, 0.3]]);
    }

    #[test]
    fn test_parse_openai_response() {
        let body: OpenAiEmbedResponse = serde_json::from_str(
            r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[1.0,-1.0]}]}"#,
        )
        .unwrap();
        assert_eq!(body.data[0].embedding, vec![1.0, -1.0]);
    }

    #[tokio::test]
    async fn test_unknown_provider_rejected() {
        let config = LlmConfig {
            provider: "carrier-pigeon".to_string(),
            ..LlmConfig::default()
        };
        let client = HttpEmbeddingClient::new(reqwest::Client::new(), config);
        let err = client.embed("hello").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Provider(msg) if msg.contains("carrier-pigeon")));
    }
}
