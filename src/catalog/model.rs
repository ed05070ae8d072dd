//! @ai:module:intent Model definitions referenced by benchmark runs
//! @ai:module:layer domain
//! @ai:module:public_api Model, BackendType, GenerationParams
//! @ai:module:stateless true

use crate::store::Entity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// @ai:intent Backend family serving a model
/// @ai:effects pure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendType {
    /// Local runtime reached over its HTTP API
    Ollama,
    /// Local weights loaded in-process
    #[serde(rename = "huggingface")]
    HuggingFace,
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    CustomApi,
}

impl BackendType {
    /// @ai:intent Convert backend type to string representation
    /// @ai:effects pure
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendType::Ollama => "ollama",
            BackendType::HuggingFace => "huggingface",
            BackendType::OpenAi => "openai",
            BackendType::Anthropic => "anthropic",
            BackendType::CustomApi => "custom_api",
        }
    }

    /// @ai:intent Whether the backend runs on the local machine
    /// @ai:effects pure
    pub fn is_local(&self) -> bool {
        matches!(self, BackendType::Ollama | BackendType::HuggingFace)
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// @ai:intent Sampling parameters forwarded to the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    /// Backend-specific options passed through untouched
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_params: BTreeMap<String, serde_json::Value>,
}

/// @ai:intent A model configuration that runs are executed against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub backend: BackendType,
    #[serde(default)]
    pub description: String,
    /// Ollama model name, hosted model identifier or local weights path
    pub model_id: String,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub parameters: GenerationParams,
    /// Memory needed to serve the model, in GB
    #[serde(default)]
    pub memory_required: Option<f64>,
    #[serde(default)]
    pub gpu_required: bool,
    #[serde(default)]
    pub quantization: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// @ai:intent Create a model with default parameters
    /// @ai:effects time
    pub fn new(id: impl Into<String>, backend: BackendType, model_id: impl Into<String>) -> Self {
        let id = id.into();
        let now = Utc::now();

        Self {
            name: id.clone(),
            id,
            backend,
            description: String::new(),
            model_id: model_id.into(),
            api_url: None,
            api_key: None,
            api_version: None,
            parameters: GenerationParams::default(),
            memory_required: None,
            gpu_required: false,
            quantization: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for Model {
    const KIND: &'static str = "Model";

    fn id(&self) -> &str {
        &self.id
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
