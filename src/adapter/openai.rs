//! @ai:module:intent Adapter for OpenAI-compatible chat completion APIs
//! @ai:module:layer infrastructure
//! @ai:module:public_api OpenAiCompatibleAdapter
//! @ai:module:stateless false

use crate::adapter::rate_limiter::{RateLimiter, RateLimiterTrait};
use crate::adapter::stream::{line_stream, sse_data, LineEvent};
use crate::adapter::{ensure_success, generation_error, init_error, ModelAdapter, TextStream};
use crate::catalog::{BackendType, GenerationParams, Model};
use crate::error::Result;
use crate::runner::CancellationToken;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Environment variable consulted when the model carries no api_key
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

/// @ai:intent Serves `openai` and `custom_api` models through `/chat/completions`
pub struct OpenAiCompatibleAdapter {
    client: reqwest::Client,
    rate_limiter: RateLimiter,
    backend: BackendType,
    base_url: String,
    model_id: String,
    api_key: Option<String>,
    initialized: bool,
}

impl OpenAiCompatibleAdapter {
    /// @ai:intent Create an adapter; api_url and api_key on the model win over defaults
    /// @ai:effects env
    pub fn new(
        client: reqwest::Client,
        rate_limiter: RateLimiter,
        default_base_url: &str,
        model: &Model,
    ) -> Self {
        let base_url = model.api_url.as_deref().unwrap_or(default_base_url);
        let api_key = model
            .api_key
            .clone()
            .or_else(|| std::env::var(OPENAI_API_KEY_ENV).ok());

        Self {
            client,
            rate_limiter,
            backend: model.backend,
            base_url: base_url.trim_end_matches('/').to_string(),
            model_id: model.model_id.clone(),
            api_key,
            initialized: false,
        }
    }

    /// @ai:intent Chat completion request body
    /// @ai:effects pure
    fn request_body(&self, prompt: &str, params: &GenerationParams, stream: bool) -> Value {
        let mut body = Map::new();
        body.insert("model".to_string(), Value::from(self.model_id.clone()));
        body.insert(
            "messages".to_string(),
            serde_json::json!([{ "role": "user", "content": prompt }]),
        );
        body.insert("stream".to_string(), Value::from(stream));

        if let Some(temperature) = params.temperature {
            body.insert("temperature".to_string(), Value::from(temperature));
        }
        if let Some(top_p) = params.top_p {
            body.insert("top_p".to_string(), Value::from(top_p));
        }
        if let Some(max_tokens) = params.max_tokens {
            body.insert("max_tokens".to_string(), Value::from(max_tokens));
        }
        if let Some(stop) = &params.stop_sequences {
            body.insert("stop".to_string(), Value::from(stop.clone()));
        }
        for (key, value) in &params.extra_params {
            body.insert(key.clone(), value.clone());
        }

        Value::Object(body)
    }

    /// @ai:intent Throttled POST to /chat/completions
    /// @ai:effects network
    async fn post(&self, body: &Value) -> Result<reqwest::Response> {
        if !self.initialized {
            return Err(generation_error(
                self.backend,
                &self.model_id,
                "adapter not initialized. Call initialize() first.",
            ));
        }

        self.rate_limiter.acquire().await;

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            generation_error(
                self.backend,
                &self.model_id,
                format!("request to {} failed: {}", self.base_url, e),
            )
        })?;

        ensure_success(response, self.backend, &self.model_id).await
    }
}

/// @ai:intent Interpret one SSE line of a streamed chat completion
/// @ai:effects pure
fn parse_sse_line(line: &str) -> std::result::Result<LineEvent, String> {
    let Some(data) = sse_data(line) else {
        return Ok(LineEvent::Skip);
    };
    if data == "[DONE]" {
        return Ok(LineEvent::Done);
    }

    let chunk: StreamChunk =
        serde_json::from_str(data).map_err(|e| format!("invalid stream chunk: {}", e))?;

    let text: String = chunk
        .choices
        .into_iter()
        .filter_map(|c| c.delta.content)
        .collect();

    if text.is_empty() {
        Ok(LineEvent::Skip)
    } else {
        Ok(LineEvent::Chunk(text))
    }
}

#[async_trait]
impl ModelAdapter for OpenAiCompatibleAdapter {
    fn backend(&self) -> BackendType {
        self.backend
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    /// @ai:intent Check credentials; hosted OpenAI requires an API key
    /// @ai:effects pure
    async fn initialize(&mut self) -> Result<()> {
        if self.backend == BackendType::OpenAi && self.api_key.is_none() {
            return Err(init_error(
                self.backend,
                &self.model_id,
                format!("no api_key on the model and {} not set", OPENAI_API_KEY_ENV),
            ));
        }

        tracing::info!("Initialized {} model {} at {}", self.backend, self.model_id, self.base_url);
        self.initialized = true;
        Ok(())
    }

    /// @ai:intent Non-streaming chat completion
    /// @ai:effects network
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let response = self.post(&self.request_body(prompt, params, false)).await?;

        let completion: CompletionResponse = response.json().await.map_err(|e| {
            generation_error(
                self.backend,
                &self.model_id,
                format!("invalid response body: {}", e),
            )
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| generation_error(self.backend, &self.model_id, "response has no content"))
    }

    /// @ai:intent SSE streaming chat completion
    /// @ai:effects network
    async fn generate_stream(
        &self,
        prompt: &str,
        params: &GenerationParams,
        cancel: CancellationToken,
    ) -> Result<TextStream> {
        let response = self.post(&self.request_body(prompt, params, true)).await?;

        Ok(line_stream(
            response,
            cancel,
            self.backend,
            self.model_id.clone(),
            parse_sse_line,
        ))
    }

    async fn cleanup(&mut self) {
        self.initialized = false;
    }
}
