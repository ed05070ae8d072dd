//! @ai:module:intent Execute one task against one model and build its scored TaskResult
//! @ai:module:layer application
//! @ai:module:public_api TaskRunner, build_prompt
//! @ai:module:stateless false

use crate::adapter::{generation_error, AdapterRegistry, ModelAdapter};
use crate::catalog::{Model, Task, Template};
use crate::config::{RunConfig, ScoringConfig};
use crate::engine::TaskResult;
use crate::error::{BenchError, Result};
use crate::runner::output::{OutputExtractor, OutputExtractorTrait, OutputPayload};
use crate::runner::CancellationToken;
use crate::scoring::calculator::ScoreInput;
use crate::scoring::{ScoreCalculator, ScoreCalculatorTrait};
use crate::store::Repository;
use futures::stream::StreamExt;
use serde_json::Value;
use std::fmt::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// @ai:intent Check required inputs and render the task prompt
/// @ai:pre template is the task's template
/// @ai:post Err(Validation) naming the first missing required field
/// @ai:effects pure
pub fn build_prompt(task: &Task, template: &Template) -> Result<String> {
    for (name, field) in &template.input_schema {
        if field.required && !task.input_data.contains_key(name) && field.default.is_none() {
            return Err(BenchError::missing_field(name.clone()));
        }
    }

    let mut prompt = String::new();
    let _ = write!(prompt, "Task: {}\n\n", task.name);
    let _ = write!(prompt, "Description: {}\n\n", task.description);
    prompt.push_str("Input Data:\n");

    let defaults = template
        .input_schema
        .iter()
        .filter(|(name, _)| !task.input_data.contains_key(*name))
        .filter_map(|(name, field)| field.default.as_ref().map(|value| (name, value)));

    let mut inputs: Vec<(&String, &Value)> = task.input_data.iter().chain(defaults).collect();
    inputs.sort_by(|a, b| a.0.cmp(b.0));

    for (key, value) in inputs {
        let _ = writeln!(prompt, "{}: {}", key, render_value(value));
    }

    Ok(prompt)
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// What a successful adapter session produced
struct Generation {
    response: String,
    token_count: u64,
    memory_usage_mb: Option<f64>,
}

/// @ai:intent Drives a single adapter session: create, initialize, generate, measure, clean up
pub struct TaskRunner {
    repository: Arc<dyn Repository>,
    registry: AdapterRegistry,
    calculator: ScoreCalculator,
    extractor: OutputExtractor,
    config: RunConfig,
}

impl TaskRunner {
    /// @ai:intent Create a task runner
    /// @ai:effects pure
    pub fn new(
        repository: Arc<dyn Repository>,
        registry: AdapterRegistry,
        config: RunConfig,
        scoring: ScoringConfig,
    ) -> Self {
        Self {
            repository,
            registry,
            calculator: ScoreCalculator::with_references(scoring),
            extractor: OutputExtractor::new(),
            config,
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.task_timeout_secs.max(1))
    }

    /// @ai:intent Run the task; every failure is captured on the returned result
    /// @ai:post cleanup() has run on any adapter that was created
    /// @ai:effects network, time, state:read
    pub async fn execute(
        &self,
        task: &Task,
        model: &Model,
        run_id: &str,
        cancel: &CancellationToken,
    ) -> TaskResult {
        let mut result = TaskResult::new(&task.id, &model.id, run_id);
        result.category_id = task.category_id.clone();

        tracing::info!("Executing task {} on model {} (run {})", task.id, model.id, run_id);

        let template = match self.repository.get_template(&task.template_id) {
            Some(template) => template,
            None => {
                let err = BenchError::Validation {
                    message: format!("Template not found: {}", task.template_id),
                    field: Some("template_id".to_string()),
                };
                return self.failed(result, err);
            }
        };

        let prompt = match build_prompt(task, &template) {
            Ok(prompt) => prompt,
            Err(err) => return self.failed(result, err),
        };

        let mut adapter = match self.registry.create(model) {
            Ok(adapter) => adapter,
            Err(err) => return self.failed(result, err),
        };

        let started = Instant::now();
        let outcome = self
            .run_session(adapter.as_mut(), &prompt, model, cancel, &mut result)
            .await;
        adapter.cleanup().await;

        match outcome {
            Ok(generation) => {
                result.token_count = Some(generation.token_count);
                result.memory_usage_mb = generation.memory_usage_mb;

                let actual_output = self.extractor.extract_json(&generation.response);
                let payload = OutputPayload {
                    raw_response: generation.response,
                    execution_time_ms: result
                        .execution_time_seconds
                        .map(|secs| (secs * 1000.0).round() as u64)
                        .unwrap_or_else(|| started.elapsed().as_millis() as u64),
                    actual_output,
                    ground_truth: task.expected_output.clone(),
                };
                result.output_data = Some(payload.into_value());

                self.score_with(&mut result, task, Some(&template));
                tracing::info!(
                    "Task {} on model {} scored {:.2}",
                    task.id,
                    model.id,
                    result.ultimate_score.unwrap_or(0.0)
                );
                result
            }
            Err(err) => self.failed(result, err),
        }
    }

    /// @ai:intent initialize → timed generate → token and memory telemetry
    /// @ai:post execution_time_seconds is set once timing has started
    /// @ai:effects network, time
    async fn run_session(
        &self,
        adapter: &mut dyn ModelAdapter,
        prompt: &str,
        model: &Model,
        cancel: &CancellationToken,
        result: &mut TaskResult,
    ) -> Result<Generation> {
        adapter.initialize().await?;

        let started = Instant::now();
        let outcome = tokio::time::timeout(
            self.timeout(),
            self.invoke(&*adapter, prompt, model, cancel),
        )
        .await;
        result.execution_time_seconds = Some(started.elapsed().as_secs_f64());

        let response = match outcome {
            Ok(response) => response?,
            Err(_) => {
                return Err(generation_error(
                    adapter.backend(),
                    adapter.model_id(),
                    format!("generation timed out after {}s", self.timeout().as_secs()),
                ))
            }
        };

        let counted = format!("{}{}", prompt, response);
        let token_count = adapter.count_tokens(&counted).await as u64;
        let memory_usage_mb = adapter.memory_usage_mb().await;

        Ok(Generation {
            response,
            token_count,
            memory_usage_mb,
        })
    }

    /// @ai:intent generate, or concatenate generate_stream chunks when streaming is enabled
    /// @ai:effects network
    async fn invoke(
        &self,
        adapter: &dyn ModelAdapter,
        prompt: &str,
        model: &Model,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if !self.config.stream_responses {
            return adapter.generate(prompt, &model.parameters).await;
        }

        let mut stream = adapter
            .generate_stream(prompt, &model.parameters, cancel.clone())
            .await?;
        let mut response = String::new();
        while let Some(chunk) = stream.next().await {
            response.push_str(&chunk?);
        }

        // A cut-short stream ends like a finished one; never score the partial text.
        if cancel.is_cancelled() {
            return Err(generation_error(
                adapter.backend(),
                adapter.model_id(),
                "generation cancelled",
            ));
        }
        Ok(response)
    }

    /// @ai:intent Recompute scores from the result's current measurements and payload
    /// @ai:effects state:read
    pub fn rescore(&self, result: &mut TaskResult, task: &Task) {
        let template = self.repository.get_template(&task.template_id);
        self.score_with(result, task, template.as_ref());
    }

    fn score_with(&self, result: &mut TaskResult, task: &Task, template: Option<&Template>) {
        let category = task
            .category_id
            .as_deref()
            .and_then(|id| self.repository.get_category(id));

        let scores = self.calculator.score(&ScoreInput {
            task,
            template,
            category: category.as_ref(),
            execution_time_seconds: result.execution_time_seconds,
            memory_usage_mb: result.memory_usage_mb,
            token_count: result.token_count,
            output: result.output_data.as_ref(),
        });
        result.apply_scores(scores);
    }

    fn failed(&self, mut result: TaskResult, err: BenchError) -> TaskResult {
        tracing::error!(
            "Task {} failed on model {}: {}",
            result.task_id,
            result.model_id,
            err
        );
        result.fail(err.to_string());
        result
    }
}
