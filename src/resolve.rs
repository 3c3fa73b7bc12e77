//! Chat-completion resolver
//!
//! Sends a composed message list to the configured endpoint and recovers a
//! structured verdict list from whatever text comes back. Server failures
//! get exactly one retry; everything else surfaces as a typed error. The
//! HTTP layer sits behind [`Transport`] so the retry policy and parsing can
//! be exercised against an injected mock.

use crate::attach::FileAttachment;
use crate::compose::{self, ChatMessage};
use crate::config::ModelConfig;
use crate::parse;
use crate::report::ComplianceResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Hard deadline for one HTTP attempt.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Fixed pause before the single permitted retry.
pub const RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// Extra attempts after the first request, only for HTTP >= 500.
const MAX_RETRIES: u32 = 1;

/// Low temperature keeps the JSON output stable across runs.
const TEMPERATURE: f64 = 0.1;

#[derive(Debug, Error)]
pub enum AnalyzeError {
    /// Missing credentials; detected before any request is issued.
    #[error("Model configuration incomplete: {0}")]
    Config(String),
    /// No response within the request deadline.
    #[error("Request timed out; check connectivity or submit fewer/smaller files")]
    Timeout,
    /// Transport-level failure. Never retried.
    #[error("Network request failed: {0}. Check that the endpoint URL is correct (https), that cross-origin access is permitted, and that the network is up")]
    Network(String),
    /// Non-2xx HTTP status after the retry budget was spent.
    #[error("{message}")]
    Server { status: u16, message: String },
    /// Model output not recoverable as JSON.
    #[error("Could not parse model output: {0}")]
    Parse(String),
    /// Recovered JSON has the wrong shape.
    #[error("Model returned an unexpected format: {0}")]
    Format(String),
}

/// Transport-level outcome, before any HTTP-status interpretation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("{0}")]
    Network(String),
}

/// Raw status and body of one HTTP exchange.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Request body of a chat-completion call.
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ApiError {
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// One POST to a chat-completion endpoint. Implementations own their
/// deadline; the resolver owns retries.
#[async_trait]
pub trait Transport {
    async fn post_chat(
        &self,
        url: &str,
        api_key: &str,
        request: &ChatRequest,
    ) -> Result<RawResponse, TransportError>;
}

/// Production transport over reqwest with rustls.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, AnalyzeError> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AnalyzeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalyzeError::Network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_chat(
        &self,
        url: &str,
        api_key: &str,
        request: &ChatRequest,
    ) -> Result<RawResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(request)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify_reqwest_error)?;
        Ok(RawResponse { status, body })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(err.to_string())
    }
}

/// Analyze free text plus attachments with the default HTTP transport.
pub async fn analyze_compliance(
    text: &str,
    files: &[FileAttachment],
    config: &ModelConfig,
) -> Result<Vec<ComplianceResult>, AnalyzeError> {
    let transport = HttpTransport::new()?;
    analyze_with(&transport, text, files, config, RETRY_BACKOFF).await
}

/// Analysis entry with an injected transport and backoff, for tests and
/// alternative transports.
pub async fn analyze_with<T: Transport>(
    transport: &T,
    text: &str,
    files: &[FileAttachment],
    config: &ModelConfig,
    backoff: Duration,
) -> Result<Vec<ComplianceResult>, AnalyzeError> {
    let messages = compose::compose_messages(text, files);
    resolve_messages(transport, messages, files.len(), config, backoff).await
}

/// Send a composed message list and recover the verdict array.
pub async fn resolve_messages<T: Transport>(
    transport: &T,
    messages: Vec<ChatMessage>,
    expected_results: usize,
    config: &ModelConfig,
    backoff: Duration,
) -> Result<Vec<ComplianceResult>, AnalyzeError> {
    check_credentials(config)?;

    let url = endpoint_url(&config.base_url);
    let request = ChatRequest {
        model: config.model_id.clone(),
        messages,
        temperature: TEMPERATURE,
        stream: false,
    };

    let mut attempt: u32 = 0;
    loop {
        let raw = match transport.post_chat(&url, &config.api_key, &request).await {
            Ok(raw) => raw,
            Err(TransportError::Timeout) => return Err(AnalyzeError::Timeout),
            Err(TransportError::Network(msg)) => return Err(AnalyzeError::Network(msg)),
        };

        if (200..300).contains(&raw.status) {
            let content = message_content(&raw.body)?;
            return parse_results(&content, expected_results);
        }

        if raw.status >= 500 && attempt < MAX_RETRIES {
            attempt += 1;
            eprintln!(
                "  Server error {}. Retrying in {}s (attempt {}/{})",
                raw.status,
                backoff.as_secs(),
                attempt,
                MAX_RETRIES
            );
            tokio::time::sleep(backoff).await;
            continue;
        }

        return Err(server_error(raw.status, &raw.body));
    }
}

/// Compare two policy revisions with the default HTTP transport; returns a
/// short prose report. Single attempt, no retry.
pub async fn compare_policies(
    old_text: &str,
    new_text: &str,
    config: &ModelConfig,
) -> Result<String, AnalyzeError> {
    let transport = HttpTransport::new()?;
    compare_with(&transport, old_text, new_text, config).await
}

pub async fn compare_with<T: Transport>(
    transport: &T,
    old_text: &str,
    new_text: &str,
    config: &ModelConfig,
) -> Result<String, AnalyzeError> {
    check_credentials(config)?;

    let url = endpoint_url(&config.base_url);
    let request = ChatRequest {
        model: config.model_id.clone(),
        messages: vec![
            ChatMessage::system("你是一个专业的隐私合规分析师。"),
            ChatMessage::user(comparison_prompt(old_text, new_text)),
        ],
        temperature: TEMPERATURE,
        stream: false,
    };

    let raw = match transport.post_chat(&url, &config.api_key, &request).await {
        Ok(raw) => raw,
        Err(TransportError::Timeout) => return Err(AnalyzeError::Timeout),
        Err(TransportError::Network(msg)) => return Err(AnalyzeError::Network(msg)),
    };

    if !(200..300).contains(&raw.status) {
        return Err(server_error(raw.status, &raw.body));
    }

    message_content(&raw.body)
}

fn comparison_prompt(old_text: &str, new_text: &str) -> String {
    format!(
        "你是一个专业的法律合规专家。请对比以下两份隐私政策文本（旧版本 vs 新版本），并重点分析以下两点变化：\n\
         1. **第三方操作限制**：是否有新的限制或放宽？\n\
         2. **用户隐私保护**：保护措施是加强了还是减弱了？\n\n\
         【旧版本片段】\n{}...\n\n\
         【新版本片段】\n{}...\n\n\
         请输出一段简短的分析报告（200字以内），直接指出核心变化，无需客套话。",
        head_slice(old_text, 2000),
        head_slice(new_text, 2000)
    )
}

fn head_slice(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn check_credentials(config: &ModelConfig) -> Result<(), AnalyzeError> {
    if config.api_key.trim().is_empty() {
        return Err(AnalyzeError::Config(format!(
            "API key is not set; pass --api-key or export {}",
            crate::config::API_KEY_ENV
        )));
    }
    if config.model_id.trim().is_empty() {
        return Err(AnalyzeError::Config(
            "model ID (endpoint ID) is not set; pass --model-id or run `redline setup`"
                .to_string(),
        ));
    }
    Ok(())
}

fn endpoint_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

fn server_error(status: u16, body: &str) -> AnalyzeError {
    let api_message = serde_json::from_str::<ApiError>(body)
        .ok()
        .and_then(|e| e.error)
        .map(|e| e.message);

    let message = if status == 500 {
        "Server internal error (500): the submitted content is likely oversized or malformed. \
         Try fewer files, smaller files, or plain-text versions."
            .to_string()
    } else if let Some(msg) = api_message {
        format!("API error: {}", msg)
    } else {
        format!("API request failed ({})", status)
    };

    AnalyzeError::Server { status, message }
}

fn message_content(body: &str) -> Result<String, AnalyzeError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|_| AnalyzeError::Parse("malformed completion envelope".to_string()))?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .unwrap_or_default();

    if content.trim().is_empty() {
        return Err(AnalyzeError::Parse("model returned empty content".to_string()));
    }
    Ok(content)
}

fn parse_results(
    content: &str,
    expected_results: usize,
) -> Result<Vec<ComplianceResult>, AnalyzeError> {
    let value = parse::recover_json(content)
        .ok_or_else(|| AnalyzeError::Parse("no JSON found in model output".to_string()))?;

    if !value.is_array() {
        return Err(AnalyzeError::Format("expected a JSON array".to_string()));
    }

    let results: Vec<ComplianceResult> = serde_json::from_value(value)
        .map_err(|e| AnalyzeError::Format(format!("unexpected element shape: {}", e)))?;

    // Soft invariant: one verdict per submitted file. Mismatches are worth
    // flagging but the partial answer is still useful.
    if expected_results > 0 && results.len() != expected_results {
        eprintln!(
            "  Warning: expected {} results but got {}",
            expected_results,
            results.len()
        );
    }

    Ok(results)
}
