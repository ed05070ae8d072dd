//! @ai:module:intent Error taxonomy for the benchmark engine
//! @ai:module:layer domain
//! @ai:module:public_api BenchError, Result
//! @ai:module:stateless true

use thiserror::Error;

/// @ai:intent Errors raised by the execution engine and its adapters
#[derive(Debug, Clone, Error)]
pub enum BenchError {
    /// Bad run definition, unknown entity or missing task input
    #[error("Validation error: {message}{}", field_suffix(.field))]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Illegal run status transition
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Adapter initialization failed [{backend}/{model_id}]: {message}")]
    AdapterInit {
        backend: String,
        model_id: String,
        message: String,
    },

    #[error("Adapter generation failed [{backend}/{model_id}]: {message}")]
    AdapterGeneration {
        backend: String,
        model_id: String,
        message: String,
    },

    #[error("No adapter registered for backend type {backend} (model {model_id})")]
    NoAdapter { backend: String, model_id: String },

    /// Orchestration-level failure that marks a whole run failed
    #[error("Benchmark execution error: {message}{}", execution_context(.run_id, .task_id, .model_id))]
    BenchmarkExecution {
        message: String,
        run_id: Option<String>,
        task_id: Option<String>,
        model_id: Option<String>,
    },

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
}

pub type Result<T> = std::result::Result<T, BenchError>;

impl BenchError {
    /// @ai:intent Validation error without a field
    /// @ai:effects pure
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// @ai:intent Validation error naming the offending field
    /// @ai:effects pure
    pub fn missing_field(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::Validation {
            message: format!("Required input field missing: {}", field),
            field: Some(field),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::BenchmarkExecution {
            message: message.into(),
            run_id: None,
            task_id: None,
            model_id: None,
        }
    }

    /// @ai:intent Attach the run id to an execution error
    /// @ai:effects pure
    pub fn for_run(self, run: &str) -> Self {
        match self {
            Self::BenchmarkExecution {
                message,
                task_id,
                model_id,
                ..
            } => Self::BenchmarkExecution {
                message,
                run_id: Some(run.to_string()),
                task_id,
                model_id,
            },
            other => other,
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// @ai:intent Whether this error belongs to a single task rather than the whole run
    /// @ai:effects pure
    pub fn is_task_level(&self) -> bool {
        matches!(
            self,
            Self::AdapterInit { .. }
                | Self::AdapterGeneration { .. }
                | Self::NoAdapter { .. }
                | Self::Validation { .. }
        )
    }
}

fn field_suffix(field: &Option<String>) -> String {
    field
        .as_ref()
        .map(|f| format!(" [Field: {}]", f))
        .unwrap_or_default()
}

fn execution_context(
    run_id: &Option<String>,
    task_id: &Option<String>,
    model_id: &Option<String>,
) -> String {
    let parts: Vec<String> = [("Run", run_id), ("Task", task_id), ("Model", model_id)]
        .iter()
        .filter_map(|(label, value)| value.as_ref().map(|v| format!("{}: {}", label, v)))
        .collect();

    if parts.is_empty() {
        String::new()
    } else {
        format!(" [{}]", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_names_field() {
        let err = BenchError::missing_field("code");
        let message = err.to_string();
        assert!(message.contains("code"));
        assert!(message.contains("[Field: code]"));
    }

    #[test]
    fn test_execution_error_context() {
        let err = BenchError::execution("Model not found: m1").for_run("run-1");
        assert_eq!(
            err.to_string(),
            "Benchmark execution error: Model not found: m1 [Run: run-1]"
        );
    }

    #[test]
    fn test_task_level_classification() {
        assert!(BenchError::NoAdapter {
            backend: "huggingface".to_string(),
            model_id: "m".to_string()
        }
        .is_task_level());
        assert!(!BenchError::execution("boom").is_task_level());
    }
}
