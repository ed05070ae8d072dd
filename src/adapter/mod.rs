//! @ai:module:intent Uniform capability interface over model backends
//! @ai:module:layer infrastructure
//! @ai:module:public_api ModelAdapter, AdapterRegistry, OllamaAdapter, OpenAiCompatibleAdapter, AnthropicAdapter, MockAdapter
//! @ai:module:stateless false

pub mod anthropic;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod rate_limiter;
pub mod registry;
mod stream;

pub use anthropic::AnthropicAdapter;
pub use mock::{MockAdapter, MockBehavior, MockCounters};
pub use ollama::OllamaAdapter;
pub use openai::OpenAiCompatibleAdapter;
pub use rate_limiter::{RateLimiter, RateLimiterTrait};
pub use registry::{AdapterRegistry, AdapterRegistryBuilder};

use crate::catalog::{BackendType, GenerationParams};
use crate::error::{BenchError, Result};
use crate::runner::CancellationToken;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Lazy, finite stream of generated text chunks
pub type TextStream = BoxStream<'static, Result<String>>;

/// @ai:intent Capability set every model backend provides
///
/// One instance serves one (model, task) pair: `initialize` before use,
/// `cleanup` afterwards. `cleanup` must be idempotent and never fail.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    fn backend(&self) -> BackendType;

    fn model_id(&self) -> &str;

    /// @ai:intent Allocate backend resources or verify the backend is reachable
    async fn initialize(&mut self) -> Result<()>;

    /// @ai:intent Produce the full response for a prompt
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    /// @ai:intent Produce the response as chunks; stops between chunks once `cancel` fires
    async fn generate_stream(
        &self,
        prompt: &str,
        params: &GenerationParams,
        cancel: CancellationToken,
    ) -> Result<TextStream>;

    /// @ai:intent Best-effort token count
    async fn count_tokens(&self, text: &str) -> usize {
        approximate_tokens(text)
    }

    /// @ai:intent Memory held by the model, when the backend reports it
    async fn memory_usage_mb(&self) -> Option<f64> {
        None
    }

    async fn cleanup(&mut self);
}

/// @ai:intent Whitespace token approximation for backends without a tokenizer
/// @ai:effects pure
pub fn approximate_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

/// @ai:intent Build and log an initialization error
/// @ai:effects io
pub(crate) fn init_error(backend: BackendType, model_id: &str, message: impl Into<String>) -> BenchError {
    let message = message.into();
    tracing::error!("[{}/{}] initialization failed: {}", backend, model_id, message);

    BenchError::AdapterInit {
        backend: backend.to_string(),
        model_id: model_id.to_string(),
        message,
    }
}

/// @ai:intent Build and log a generation error
/// @ai:effects io
pub(crate) fn generation_error(
    backend: BackendType,
    model_id: &str,
    message: impl Into<String>,
) -> BenchError {
    let message = message.into();
    tracing::error!("[{}/{}] generation failed: {}", backend, model_id, message);

    BenchError::AdapterGeneration {
        backend: backend.to_string(),
        model_id: model_id.to_string(),
        message,
    }
}

/// @ai:intent Turn a non-success HTTP response into a generation error
/// @ai:effects network
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    backend: BackendType,
    model_id: &str,
) -> Result<reqwest::Response> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(generation_error(
        backend,
        model_id,
        format!("API error ({}): {}", status, body),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approximate_tokens() {
        assert_eq!(approximate_tokens(""), 0);
        assert_eq!(approximate_tokens("fn main() {\n    println!(\"hi\");\n}"), 5);
    }

    #[test]
    fn test_errors_carry_identity() {
        let err = generation_error(BackendType::Ollama, "llama3", "boom");
        assert_eq!(
            err.to_string(),
            "Adapter generation failed [ollama/llama3]: boom"
        );
    }
}
