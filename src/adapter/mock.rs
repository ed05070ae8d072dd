//! @ai:module:intent Scripted adapter for tests and dry runs
//! @ai:module:layer infrastructure
//! @ai:module:public_api MockAdapter, MockBehavior, MockCounters
//! @ai:module:stateless false

use crate::adapter::registry::{AdapterRegistry, AdapterRegistryBuilder};
use crate::adapter::{generation_error, init_error, ModelAdapter, TextStream};
use crate::catalog::{BackendType, GenerationParams, Model};
use crate::error::Result;
use crate::runner::CancellationToken;
use async_trait::async_trait;
use futures::stream::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// @ai:intent What every mock adapter built from this behavior does
#[derive(Debug, Clone)]
pub struct MockBehavior {
    pub response: String,
    /// Fail `generate` when the prompt contains this text
    pub fail_on: Option<String>,
    pub fail_initialize: bool,
    /// Simulated generation latency
    pub delay: Option<Duration>,
    pub memory_mb: Option<f64>,
    /// Characters per streamed chunk
    pub chunk_size: usize,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            response: r#"{"result": "ok"}"#.to_string(),
            fail_on: None,
            fail_initialize: false,
            delay: None,
            memory_mb: None,
            chunk_size: 8,
        }
    }
}

impl MockBehavior {
    pub fn responding(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            ..Self::default()
        }
    }
}

/// @ai:intent Call counters shared by every adapter of one registry
#[derive(Debug, Default)]
pub struct MockCounters {
    pub initialized: AtomicUsize,
    pub generated: AtomicUsize,
    pub cleaned_up: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockCounters {
    pub fn initialized(&self) -> usize {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn generated(&self) -> usize {
        self.generated.load(Ordering::SeqCst)
    }

    pub fn cleaned_up(&self) -> usize {
        self.cleaned_up.load(Ordering::SeqCst)
    }

    /// @ai:intent Every prompt received so far, in arrival order
    /// @ai:effects state:read
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    fn record_prompt(&self, prompt: &str) {
        let mut prompts = self.prompts.lock().unwrap_or_else(|e| e.into_inner());
        prompts.push(prompt.to_string());
    }
}

/// @ai:intent Adapter returning a fixed response
pub struct MockAdapter {
    backend: BackendType,
    model_id: String,
    behavior: Arc<MockBehavior>,
    counters: Arc<MockCounters>,
    initialized: bool,
}

impl MockAdapter {
    /// @ai:intent Create a mock adapter for a model
    /// @ai:effects pure
    pub fn new(model: &Model, behavior: Arc<MockBehavior>, counters: Arc<MockCounters>) -> Self {
        Self {
            backend: model.backend,
            model_id: model.model_id.clone(),
            behavior,
            counters,
            initialized: false,
        }
    }

    /// @ai:intent Registry serving every backend type with mocks
    /// @ai:effects pure
    pub fn registry(behavior: MockBehavior) -> (AdapterRegistry, Arc<MockCounters>) {
        let behavior = Arc::new(behavior);
        let counters = Arc::new(MockCounters::default());

        let mut builder = AdapterRegistryBuilder::new();
        for backend in [
            BackendType::Ollama,
            BackendType::HuggingFace,
            BackendType::OpenAi,
            BackendType::Anthropic,
            BackendType::CustomApi,
        ] {
            let behavior = behavior.clone();
            let counters = counters.clone();
            builder = builder.register(backend, move |model| {
                let adapter: Box<dyn ModelAdapter> =
                    Box::new(MockAdapter::new(model, behavior.clone(), counters.clone()));
                Ok(adapter)
            });
        }

        (builder.build(), counters)
    }

    /// @ai:intent Shared checks and bookkeeping for generate and generate_stream
    /// @ai:effects state:write, time
    async fn respond(&self, prompt: &str) -> Result<String> {
        if !self.initialized {
            return Err(generation_error(self.backend, &self.model_id, "mock not initialized"));
        }

        self.counters.generated.fetch_add(1, Ordering::SeqCst);
        self.counters.record_prompt(prompt);

        if let Some(delay) = self.behavior.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.behavior.fail_on {
            Some(marker) if prompt.contains(marker.as_str()) => Err(generation_error(
                self.backend,
                &self.model_id,
                format!("scripted failure on '{}'", marker),
            )),
            _ => Ok(self.behavior.response.clone()),
        }
    }
}

#[async_trait]
impl ModelAdapter for MockAdapter {
    fn backend(&self) -> BackendType {
        self.backend
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn initialize(&mut self) -> Result<()> {
        self.counters.initialized.fetch_add(1, Ordering::SeqCst);

        if self.behavior.fail_initialize {
            return Err(init_error(self.backend, &self.model_id, "scripted init failure"));
        }
        self.initialized = true;
        Ok(())
    }

    async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String> {
        self.respond(prompt).await
    }

    /// @ai:intent Split the scripted response into fixed-size chunks
    /// @ai:effects state:write, time
    async fn generate_stream(
        &self,
        prompt: &str,
        _params: &GenerationParams,
        cancel: CancellationToken,
    ) -> Result<TextStream> {
        let response = self.respond(prompt).await?;
        let size = self.behavior.chunk_size.max(1);

        let chars: Vec<char> = response.chars().collect();
        let chunks: Vec<String> = chars.chunks(size).map(|c| c.iter().collect()).collect();

        Ok(futures::stream::iter(chunks)
            .take_while(move |_| futures::future::ready(!cancel.is_cancelled()))
            .map(Ok)
            .boxed())
    }

    async fn memory_usage_mb(&self) -> Option<f64> {
        self.behavior.memory_mb
    }

    async fn cleanup(&mut self) {
        self.counters.cleaned_up.fetch_add(1, Ordering::SeqCst);
        self.initialized = false;
    }
}
