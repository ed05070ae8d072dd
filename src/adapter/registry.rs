//! @ai:module:intent Backend type → adapter constructor mapping, fixed once built
//! @ai:module:layer infrastructure
//! @ai:module:public_api AdapterRegistry, AdapterRegistryBuilder
//! @ai:module:stateless true

use crate::adapter::{
    AnthropicAdapter, ModelAdapter, OllamaAdapter, OpenAiCompatibleAdapter, RateLimiter,
};
use crate::catalog::{BackendType, Model};
use crate::config::BackendConfig;
use crate::error::{BenchError, Result};
use anyhow::Context;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

type Constructor = Arc<dyn Fn(&Model) -> Result<Box<dyn ModelAdapter>> + Send + Sync>;

/// @ai:intent Immutable factory producing one fresh adapter per call
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    constructors: HashMap<BackendType, Constructor>,
}

impl AdapterRegistry {
    pub fn builder() -> AdapterRegistryBuilder {
        AdapterRegistryBuilder::new()
    }

    /// @ai:intent Registry for the HTTP backends; huggingface stays unregistered
    /// @ai:effects pure
    pub fn with_defaults(config: &BackendConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;
        let limiter = RateLimiter::new(config.requests_per_minute);

        let ollama_client = client.clone();
        let ollama_host = config.ollama_host.clone();

        let openai_client = client.clone();
        let openai_limiter = limiter.clone();
        let openai_url = config.openai_base_url.clone();

        let anthropic_client = client;
        let anthropic_limiter = limiter;
        let anthropic_url = config.anthropic_base_url.clone();
        let anthropic_version = config.anthropic_version.clone();

        let openai_compatible = move |model: &Model| -> Result<Box<dyn ModelAdapter>> {
            Ok(Box::new(OpenAiCompatibleAdapter::new(
                openai_client.clone(),
                openai_limiter.clone(),
                &openai_url,
                model,
            )))
        };

        Ok(Self::builder()
            .register(BackendType::Ollama, move |model| {
                let adapter: Box<dyn ModelAdapter> =
                    Box::new(OllamaAdapter::new(ollama_client.clone(), &ollama_host, model));
                Ok(adapter)
            })
            .register(BackendType::OpenAi, openai_compatible.clone())
            .register(BackendType::CustomApi, openai_compatible)
            .register(BackendType::Anthropic, move |model| {
                let adapter: Box<dyn ModelAdapter> = Box::new(AnthropicAdapter::new(
                    anthropic_client.clone(),
                    anthropic_limiter.clone(),
                    &anthropic_url,
                    &anthropic_version,
                    model,
                ));
                Ok(adapter)
            })
            .build())
    }

    /// @ai:intent Create an uninitialized adapter for a model
    /// @ai:effects pure
    pub fn create(&self, model: &Model) -> Result<Box<dyn ModelAdapter>> {
        match self.constructors.get(&model.backend) {
            Some(constructor) => constructor(model),
            None => {
                tracing::error!(
                    "No adapter registered for backend {} (model {})",
                    model.backend,
                    model.id
                );
                Err(BenchError::NoAdapter {
                    backend: model.backend.to_string(),
                    model_id: model.id.clone(),
                })
            }
        }
    }

    pub fn supports(&self, backend: BackendType) -> bool {
        self.constructors.contains_key(&backend)
    }

    /// @ai:intent Registered backend types in a stable order
    /// @ai:effects pure
    pub fn backends(&self) -> Vec<BackendType> {
        let mut backends: Vec<_> = self.constructors.keys().copied().collect();
        backends.sort();
        backends
    }
}

/// @ai:intent Collects constructors before freezing them into a registry
#[derive(Default)]
pub struct AdapterRegistryBuilder {
    constructors: HashMap<BackendType, Constructor>,
}

impl AdapterRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// @ai:intent Register (or replace) the constructor for a backend type
    /// @ai:effects pure
    pub fn register<F>(mut self, backend: BackendType, constructor: F) -> Self
    where
        F: Fn(&Model) -> Result<Box<dyn ModelAdapter>> + Send + Sync + 'static,
    {
        self.constructors.insert(backend, Arc::new(constructor));
        self
    }

    pub fn build(self) -> AdapterRegistry {
        AdapterRegistry {
            constructors: self.constructors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_leave_huggingface_unregistered() {
        let registry = AdapterRegistry::with_defaults(&BackendConfig::default()).unwrap();

        assert_eq!(
            registry.backends(),
            vec![
                BackendType::Ollama,
                BackendType::OpenAi,
                BackendType::Anthropic,
                BackendType::CustomApi,
            ]
        );

        let model = Model::new("hf", BackendType::HuggingFace, "gpt2");
        let err = registry.create(&model).err().unwrap();
        assert!(matches!(err, BenchError::NoAdapter { .. }));
    }

    #[test]
    fn test_create_returns_matching_backend() {
        let registry = AdapterRegistry::with_defaults(&BackendConfig::default()).unwrap();
        let model = Model::new("local", BackendType::CustomApi, "qwen");

        let adapter = registry.create(&model).unwrap();
        assert_eq!(adapter.backend(), BackendType::CustomApi);
        assert_eq!(adapter.model_id(), "qwen");
    }

    #[test]
    fn test_empty_registry() {
        let registry = AdapterRegistry::builder().build();
        assert!(!registry.supports(BackendType::Ollama));
    }
}
