use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::GenerationError;
use crate::llm::check_provider;
use crate::ports::{AnswerGenerator, ComponentStatus};

/// Single-shot, non-streaming completion via Ollama or an OpenAI-compatible API.
pub struct HttpAnswerGenerator {
    client: reqwest::Client,
    config: LlmConfig,
}

impl HttpAnswerGenerator {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl AnswerGenerator for HttpAnswerGenerator {
    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, GenerationError> {
        match self.config.provider.as_str() {
            "ollama" => complete_ollama(&self.client, &self.config, prompt, max_tokens, temperature).await,
            "openai" => complete_openai(&self.client, &self.config, prompt, max_tokens, temperature).await,
            other => Err(GenerationError::Unknown(format!(
                "Unsupported LLM provider for completion: {other}"
            ))),
        }
    }

    async fn health_check(&self) -> ComponentStatus {
        check_provider(&self.client, &self.config).await
    }
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

fn user_message(prompt: &str) -> Vec<Message> {
    vec![Message {
        role: "user".to_string(),
        content: prompt.to_string(),
    }]
}

/// Map a non-success HTTP status onto the matching failure kind.
fn classify_status(
    provider: &str,
    status: StatusCode,
    retry_after: Option<&str>,
    body: &str,
) -> GenerationError {
    let message = format!("{provider} chat API returned {status}: {body}");
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GenerationError::Auth(message),
        StatusCode::TOO_MANY_REQUESTS => GenerationError::RateLimit {
            message,
            retry_after_secs: retry_after.and_then(|v| v.trim().parse().ok()),
        },
        _ => GenerationError::Unknown(message),
    }
}

fn request_error(provider: &str, e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        // reqwest does not say which bound (connect or total) fired.
        GenerationError::Timeout(None)
    } else {
        GenerationError::Unknown(format!("Failed to call {provider} chat API: {e}"))
    }
}

async fn check_status(
    provider: &str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, GenerationError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let retry_after = resp
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = resp.text().await.unwrap_or_default();
    Err(classify_status(provider, status, retry_after.as_deref(), &body))
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Message,
}

async fn complete_ollama(
    client: &reqwest::Client,
    config: &LlmConfig,
    prompt: &str,
    max_tokens: u32,
    temperature: f32,
) -> Result<String, GenerationError> {
    let url = format!("{}/api/chat", config.base_url);
    let req = OllamaChatRequest {
        model: config.chat_model.clone(),
        messages: user_message(prompt),
        stream: false,
        options: OllamaOptions {
            temperature,
            num_predict: max_tokens,
        },
    };

    let resp = client
        .post(&url)
        .json(&req)
        .send()
        .await
        .map_err(|e| request_error("Ollama", e))?;
    let resp = check_status("Ollama", resp).await?;

    let body: OllamaChatResponse = resp.json().await.map_err(|e| {
        GenerationError::Unknown(format!("Failed to parse Ollama chat response: {e}"))
    })?;
    Ok(body.message.content)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

async fn complete_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    prompt: &str,
    max_tokens: u32,
    temperature: f32,
) -> Result<String, GenerationError> {
    let url = format!("{}/v1/chat/completions", config.base_url);
    let api_key = config.api_key.as_deref().unwrap_or_default();
    let req = OpenAiChatRequest {
        model: config.chat_model.clone(),
        messages: user_message(prompt),
        max_tokens,
        temperature,
    };

    let resp = client
        .post(&url)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&req)
        .send()
        .await
        .map_err(|e| request_error("OpenAI", e))?;
    let resp = check_status("OpenAI", resp).await?;

    let body: OpenAiChatResponse = resp.json().await.map_err(|e| {
        GenerationError::Unknown(format!("Failed to parse OpenAI chat response: {e}"))
    })?;
    Ok(first_choice_content(body))
}

fn first_choice_content(body: OpenAiChatResponse) -> String {
    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default()
}
