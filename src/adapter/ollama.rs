//! @ai:module:intent Adapter for a local Ollama runtime over its HTTP API
//! @ai:module:layer infrastructure
//! @ai:module:public_api OllamaAdapter
//! @ai:module:stateless false

use crate::adapter::stream::{line_stream, LineEvent};
use crate::adapter::{ensure_success, generation_error, init_error, ModelAdapter, TextStream};
use crate::catalog::{BackendType, GenerationParams, Model};
use crate::error::Result;
use crate::runner::CancellationToken;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunningModels {
    #[serde(default)]
    models: Vec<RunningModel>,
}

#[derive(Debug, Deserialize)]
struct RunningModel {
    #[serde(default)]
    name: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    size: u64,
}

/// @ai:intent Talks to `/api/show`, `/api/generate` and `/api/ps`
pub struct OllamaAdapter {
    client: reqwest::Client,
    host: String,
    model_id: String,
    initialized: bool,
}

impl OllamaAdapter {
    /// @ai:intent Create an adapter; the model's api_url overrides the configured host
    /// @ai:effects pure
    pub fn new(client: reqwest::Client, default_host: &str, model: &Model) -> Self {
        let host = model.api_url.as_deref().unwrap_or(default_host);

        Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            model_id: model.model_id.clone(),
            initialized: false,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(generation_error(
                BackendType::Ollama,
                &self.model_id,
                "Ollama client not initialized. Call initialize() first.",
            ))
        }
    }

    /// @ai:intent POST /api/generate and return the raw response
    /// @ai:effects network
    async fn post_generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
        stream: bool,
    ) -> Result<reqwest::Response> {
        self.ensure_initialized()?;

        let request = GenerateRequest {
            model: &self.model_id,
            prompt,
            stream,
            options: ollama_options(params),
        };

        let response = self
            .client
            .post(self.url("/api/generate"))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                generation_error(
                    BackendType::Ollama,
                    &self.model_id,
                    format!("request to {} failed: {}", self.host, e),
                )
            })?;

        ensure_success(response, BackendType::Ollama, &self.model_id).await
    }
}

/// @ai:intent Map generation parameters onto Ollama `options`
/// @ai:effects pure
pub fn ollama_options(params: &GenerationParams) -> Map<String, Value> {
    let mut options = Map::new();

    if let Some(temperature) = params.temperature {
        options.insert("temperature".to_string(), Value::from(temperature));
    }
    if let Some(top_p) = params.top_p {
        options.insert("top_p".to_string(), Value::from(top_p));
    }
    if let Some(top_k) = params.top_k {
        options.insert("top_k".to_string(), Value::from(top_k));
    }
    if let Some(max_tokens) = params.max_tokens {
        options.insert("num_predict".to_string(), Value::from(max_tokens));
    }
    if let Some(stop) = &params.stop_sequences {
        options.insert("stop".to_string(), Value::from(stop.clone()));
    }
    for (key, value) in &params.extra_params {
        options.insert(key.clone(), value.clone());
    }

    options
}

/// @ai:intent Interpret one NDJSON line of a streamed /api/generate body
/// @ai:effects pure
fn parse_generate_line(line: &str) -> std::result::Result<LineEvent, String> {
    let chunk: GenerateChunk =
        serde_json::from_str(line).map_err(|e| format!("invalid stream chunk: {}", e))?;

    if let Some(error) = chunk.error {
        return Err(error);
    }
    if !chunk.response.is_empty() {
        return Ok(LineEvent::Chunk(chunk.response));
    }
    if chunk.done {
        return Ok(LineEvent::Done);
    }
    Ok(LineEvent::Skip)
}

#[async_trait]
impl ModelAdapter for OllamaAdapter {
    fn backend(&self) -> BackendType {
        BackendType::Ollama
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    /// @ai:intent Check the model is available on the runtime
    /// @ai:effects network
    async fn initialize(&mut self) -> Result<()> {
        tracing::info!("Initializing Ollama model {} at {}", self.model_id, self.host);

        let response = self
            .client
            .post(self.url("/api/show"))
            .json(&serde_json::json!({ "model": self.model_id }))
            .send()
            .await
            .map_err(|e| {
                init_error(
                    BackendType::Ollama,
                    &self.model_id,
                    format!("Ollama unreachable at {}: {}", self.host, e),
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(init_error(
                BackendType::Ollama,
                &self.model_id,
                format!("model not available ({}): {}", status, body),
            ));
        }

        self.initialized = true;
        Ok(())
    }

    /// @ai:intent Non-streaming generation
    /// @ai:effects network
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let response = self.post_generate(prompt, params, false).await?;

        let chunk: GenerateChunk = response.json().await.map_err(|e| {
            generation_error(
                BackendType::Ollama,
                &self.model_id,
                format!("invalid response body: {}", e),
            )
        })?;

        match chunk.error {
            Some(error) => Err(generation_error(BackendType::Ollama, &self.model_id, error)),
            None => Ok(chunk.response),
        }
    }

    /// @ai:intent NDJSON streaming generation
    /// @ai:effects network
    async fn generate_stream(
        &self,
        prompt: &str,
        params: &GenerationParams,
        cancel: CancellationToken,
    ) -> Result<TextStream> {
        let response = self.post_generate(prompt, params, true).await?;

        Ok(line_stream(
            response,
            cancel,
            BackendType::Ollama,
            self.model_id.clone(),
            parse_generate_line,
        ))
    }

    /// @ai:intent Resident size of this model from /api/ps
    /// @ai:effects network
    async fn memory_usage_mb(&self) -> Option<f64> {
        let response = self.client.get(self.url("/api/ps")).send().await.ok()?;
        let running: RunningModels = response.json().await.ok()?;

        running
            .models
            .iter()
            .find(|m| m.name == self.model_id || m.model == self.model_id)
            .map(|m| m.size as f64 / BYTES_PER_MB)
    }

    async fn cleanup(&mut self) {
        if self.initialized {
            tracing::debug!("Released Ollama model {}", self.model_id);
        }
        self.initialized = false;
    }
}
