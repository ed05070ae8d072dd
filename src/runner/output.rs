//! @ai:module:intent Extract structured JSON from model responses and build the output payload
//! @ai:module:layer application
//! @ai:module:public_api OutputExtractor, OutputPayload
//! @ai:module:stateless true

use regex::Regex;
use serde_json::{Map, Value};

/// Fenced block, optionally tagged json: ```json ... ```
const FENCE_PATTERN: &str = r"```(?:json|JSON)?[ \t]*\n([\s\S]*?)```";

/// Keys lifted from the parsed response into the payload for quality scoring
const EVALUATION_KEYS: [&str; 2] = ["test_results", "static_analysis"];

/// @ai:intent Trait for response parsing
pub trait OutputExtractorTrait: Send + Sync {
    /// @ai:intent Best-effort JSON value carried by a response
    fn extract_json(&self, response: &str) -> Option<Value>;
}

/// @ai:intent Finds JSON in a response: whole text, fenced blocks, then the outermost braces
pub struct OutputExtractor {
    fence: Option<Regex>,
}

impl OutputExtractor {
    /// @ai:intent Create a new output extractor
    /// @ai:effects pure
    pub fn new() -> Self {
        Self {
            fence: Regex::new(FENCE_PATTERN).ok(),
        }
    }

    fn parse_structured(text: &str) -> Option<Value> {
        match serde_json::from_str::<Value>(text.trim()) {
            Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
            _ => None,
        }
    }

    /// @ai:intent Widest `{...}` or `[...]` span that parses
    /// @ai:effects pure
    fn outermost_span(text: &str) -> Option<Value> {
        [('{', '}'), ('[', ']')].iter().find_map(|(open, close)| {
            let start = text.find(*open)?;
            let end = text.rfind(*close)?;
            if end <= start {
                return None;
            }
            Self::parse_structured(&text[start..=end])
        })
    }
}

impl Default for OutputExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputExtractorTrait for OutputExtractor {
    /// @ai:intent Best-effort JSON value carried by a response
    /// @ai:effects pure
    fn extract_json(&self, response: &str) -> Option<Value> {
        if let Some(value) = Self::parse_structured(response) {
            return Some(value);
        }

        if let Some(fence) = &self.fence {
            let fenced = fence
                .captures_iter(response)
                .filter_map(|cap| cap.get(1))
                .find_map(|m| Self::parse_structured(m.as_str()));
            if fenced.is_some() {
                return fenced;
            }
        }

        Self::outermost_span(response)
    }
}

/// @ai:intent Output payload recorded on a task result and read by quality scoring
#[derive(Debug, Clone)]
pub struct OutputPayload {
    pub raw_response: String,
    pub execution_time_ms: u64,
    pub actual_output: Option<Value>,
    pub ground_truth: Option<Value>,
}

impl OutputPayload {
    /// @ai:intent Serialize to the JSON object stored in TaskResult.output_data
    /// @ai:effects pure
    pub fn into_value(self) -> Value {
        let mut payload = Map::new();
        payload.insert("raw_response".to_string(), Value::from(self.raw_response));
        payload.insert(
            "execution_time_ms".to_string(),
            Value::from(self.execution_time_ms),
        );

        if let Some(actual) = self.actual_output {
            if let Some(object) = actual.as_object() {
                for key in EVALUATION_KEYS {
                    if let Some(value) = object.get(key) {
                        payload.insert(key.to_string(), value.clone());
                    }
                }
            }
            payload.insert("actual_output".to_string(), actual);
        }
        if let Some(truth) = self.ground_truth {
            payload.insert("ground_truth".to_string(), truth);
        }

        Value::Object(payload)
    }
}
