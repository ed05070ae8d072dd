//! @ai:module:intent Adapter for the Anthropic Messages API
//! @ai:module:layer infrastructure
//! @ai:module:public_api AnthropicAdapter
//! @ai:module:stateless false

use crate::adapter::rate_limiter::{RateLimiter, RateLimiterTrait};
use crate::adapter::stream::{line_stream, sse_data, LineEvent};
use crate::adapter::{ensure_success, generation_error, init_error, ModelAdapter, TextStream};
use crate::catalog::{BackendType, GenerationParams, Model};
use crate::error::Result;
use crate::runner::CancellationToken;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Environment variable consulted when the model carries no api_key
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// The Messages API requires max_tokens
const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<&'a [String]>,
    stream: bool,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    delta: Option<TextDelta>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TextDelta {
    #[serde(default)]
    text: Option<String>,
}

/// @ai:intent Rate-limited client for `/v1/messages`
pub struct AnthropicAdapter {
    client: reqwest::Client,
    rate_limiter: RateLimiter,
    base_url: String,
    api_version: String,
    model_id: String,
    api_key: Option<String>,
    initialized: bool,
}

impl AnthropicAdapter {
    /// @ai:intent Create an adapter; model api_url, api_version and api_key win over defaults
    /// @ai:effects env
    pub fn new(
        client: reqwest::Client,
        rate_limiter: RateLimiter,
        default_base_url: &str,
        default_version: &str,
        model: &Model,
    ) -> Self {
        let base_url = model.api_url.as_deref().unwrap_or(default_base_url);
        let api_version = model.api_version.as_deref().unwrap_or(default_version);
        let api_key = model
            .api_key
            .clone()
            .or_else(|| std::env::var(ANTHROPIC_API_KEY_ENV).ok());

        Self {
            client,
            rate_limiter,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_version: api_version.to_string(),
            model_id: model.model_id.clone(),
            api_key,
            initialized: false,
        }
    }

    fn request<'a>(
        &'a self,
        prompt: &'a str,
        params: &'a GenerationParams,
        stream: bool,
    ) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.model_id,
            max_tokens: params.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: params.temperature,
            top_p: params.top_p,
            top_k: params.top_k,
            stop_sequences: params.stop_sequences.as_deref(),
            stream,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        }
    }

    /// @ai:intent Throttled POST to /v1/messages
    /// @ai:effects network
    async fn post(&self, request: &MessagesRequest<'_>) -> Result<reqwest::Response> {
        let api_key = match (&self.api_key, self.initialized) {
            (Some(key), true) => key,
            _ => {
                return Err(generation_error(
                    BackendType::Anthropic,
                    &self.model_id,
                    "adapter not initialized. Call initialize() first.",
                ))
            }
        };

        self.rate_limiter.acquire().await;

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.api_version)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                generation_error(
                    BackendType::Anthropic,
                    &self.model_id,
                    format!("request to {} failed: {}", self.base_url, e),
                )
            })?;

        ensure_success(response, BackendType::Anthropic, &self.model_id).await
    }
}

/// @ai:intent Interpret one SSE line of a streamed message
/// @ai:effects pure
fn parse_event_line(line: &str) -> std::result::Result<LineEvent, String> {
    let Some(data) = sse_data(line) else {
        return Ok(LineEvent::Skip);
    };

    let event: StreamEvent =
        serde_json::from_str(data).map_err(|e| format!("invalid stream event: {}", e))?;

    match event.kind.as_str() {
        "content_block_delta" => Ok(event
            .delta
            .and_then(|d| d.text)
            .filter(|t| !t.is_empty())
            .map(LineEvent::Chunk)
            .unwrap_or(LineEvent::Skip)),
        "message_stop" => Ok(LineEvent::Done),
        "error" => Err(event
            .error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "stream error".to_string())),
        _ => Ok(LineEvent::Skip),
    }
}

#[async_trait]
impl ModelAdapter for AnthropicAdapter {
    fn backend(&self) -> BackendType {
        BackendType::Anthropic
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    /// @ai:intent Check an API key is available
    /// @ai:effects pure
    async fn initialize(&mut self) -> Result<()> {
        if self.api_key.is_none() {
            return Err(init_error(
                BackendType::Anthropic,
                &self.model_id,
                format!("no api_key on the model and {} not set", ANTHROPIC_API_KEY_ENV),
            ));
        }

        tracing::info!("Initialized anthropic model {} (API {})", self.model_id, self.api_version);
        self.initialized = true;
        Ok(())
    }

    /// @ai:intent Send one user message and join the text blocks of the reply
    /// @ai:effects network
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let response = self.post(&self.request(prompt, params, false)).await?;

        let message: MessagesResponse = response.json().await.map_err(|e| {
            generation_error(
                BackendType::Anthropic,
                &self.model_id,
                format!("invalid response body: {}", e),
            )
        })?;

        Ok(message
            .content
            .into_iter()
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// @ai:intent SSE streaming message
    /// @ai:effects network
    async fn generate_stream(
        &self,
        prompt: &str,
        params: &GenerationParams,
        cancel: CancellationToken,
    ) -> Result<TextStream> {
        let response = self.post(&self.request(prompt, params, true)).await?;

        Ok(line_stream(
            response,
            cancel,
            BackendType::Anthropic,
            self.model_id.clone(),
            parse_event_line,
        ))
    }

    async fn cleanup(&mut self) {
        self.initialized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BenchError;
    use pretty_assertions::assert_eq;

    fn adapter(api_key: Option<&str>) -> AnthropicAdapter {
        let mut model = Model::new("claude", BackendType::Anthropic, "claude-sonnet");
        model.api_version = Some("2024-01-01".to_string());
        let mut adapter = AnthropicAdapter::new(
            reqwest::Client::new(),
            RateLimiter::new(0),
            "http://127.0.0.1:1",
            "2023-06-01",
            &model,
        );
        adapter.api_key = api_key.map(str::to_string);
        adapter
    }

    #[test]
    fn test_request_defaults_max_tokens() {
        let adapter = adapter(Some("key"));
        let params = GenerationParams::default();
        let body = serde_json::to_value(adapter.request("Hi", &params, false)).unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "model": "claude-sonnet",
                "max_tokens": 4096,
                "stream": false,
                "messages": [{"role": "user", "content": "Hi"}],
            })
        );
        assert_eq!(adapter.api_version, "2024-01-01");
    }

    #[test]
    fn test_parse_event_line() {
        assert_eq!(
            parse_event_line(
                r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hey"}}"#
            ),
            Ok(LineEvent::Chunk("Hey".to_string()))
        );
        assert_eq!(parse_event_line("event: message_stop"), Ok(LineEvent::Skip));
        assert_eq!(
            parse_event_line(r#"data: {"type":"message_stop"}"#),
            Ok(LineEvent::Done)
        );
        assert!(parse_event_line(r#"data: {"type":"error","error":{"type":"overloaded_error"}}"#).is_err());
    }

    #[tokio::test]
    async fn test_missing_key_is_init_error() {
        let mut adapter = adapter(None);
        let err = adapter.initialize().await.unwrap_err();
        assert!(matches!(err, BenchError::AdapterInit { .. }));
    }
}
