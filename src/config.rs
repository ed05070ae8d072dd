//! @ai:module:intent Configuration structs for the benchmark engine
//! @ai:module:layer infrastructure
//! @ai:module:public_api BenchmarkConfig, BackendConfig, RunConfig, ScoringConfig, PathConfig
//! @ai:module:stateless true

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "LOCALAI_BENCH_";

/// @ai:intent Main configuration for the benchmark engine
/// @ai:effects pure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    #[serde(default)]
    pub backends: BackendConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub paths: PathConfig,
}

/// @ai:intent Connection settings shared by the model adapters
/// @ai:effects pure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_ollama_host")]
    pub ollama_host: String,
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_anthropic_base_url")]
    pub anthropic_base_url: String,
    #[serde(default = "default_anthropic_version")]
    pub anthropic_version: String,
    #[serde(default = "default_rate_limit")]
    pub requests_per_minute: u32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// @ai:intent Run execution settings
/// @ai:effects pure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Run models concurrently; tasks stay sequential per model
    #[serde(default)]
    pub parallel_models: bool,
    /// Use generate_stream and concatenate chunks instead of generate
    #[serde(default)]
    pub stream_responses: bool,
    #[serde(default = "default_task_timeout")]
    pub task_timeout_secs: u64,
    #[serde(default)]
    pub dry_run: bool,
}

/// @ai:intent Reference points of the inverse time/memory/cost scores
/// @ai:effects pure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_time_reference")]
    pub time_reference_secs: f64,
    #[serde(default = "default_memory_reference")]
    pub memory_reference_mb: f64,
    #[serde(default = "default_cost_reference")]
    pub cost_reference_tokens: f64,
}

/// @ai:intent Path configuration for catalog and results directories
/// @ai:effects pure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            ollama_host: default_ollama_host(),
            openai_base_url: default_openai_base_url(),
            anthropic_base_url: default_anthropic_base_url(),
            anthropic_version: default_anthropic_version(),
            requests_per_minute: default_rate_limit(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            parallel_models: false,
            stream_responses: false,
            task_timeout_secs: default_task_timeout(),
            dry_run: false,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            time_reference_secs: default_time_reference(),
            memory_reference_mb: default_memory_reference(),
            cost_reference_tokens: default_cost_reference(),
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            results_dir: default_results_dir(),
        }
    }
}

fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_anthropic_version() -> String {
    "2023-06-01".to_string()
}

fn default_rate_limit() -> u32 {
    60
}

fn default_request_timeout() -> u64 {
    120
}

fn default_task_timeout() -> u64 {
    300
}

fn default_time_reference() -> f64 {
    1.0
}

fn default_memory_reference() -> f64 {
    100.0
}

fn default_cost_reference() -> f64 {
    1000.0
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

impl BenchmarkConfig {
    /// @ai:intent Load configuration from a TOML file
    /// @ai:pre path exists and is readable
    /// @ai:effects fs:read
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// @ai:intent Save configuration to a TOML file
    /// @ai:effects fs:write
    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// @ai:intent Override settings from LOCALAI_BENCH_* environment variables
    /// @ai:effects env
    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        self.apply_overrides(|key| std::env::var(format!("{}{}", ENV_PREFIX, key)).ok())
    }

    /// @ai:intent Apply overrides from an arbitrary key lookup
    /// @ai:effects pure
    fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("OLLAMA_HOST") {
            self.backends.ollama_host = host;
        }

        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.backends.openai_base_url = url;
        }

        if let Some(url) = lookup("ANTHROPIC_BASE_URL") {
            self.backends.anthropic_base_url = url;
        }

        if let Some(rpm) = lookup("REQUESTS_PER_MINUTE") {
            self.backends.requests_per_minute = rpm
                .parse()
                .with_context(|| format!("Invalid {}REQUESTS_PER_MINUTE: {}", ENV_PREFIX, rpm))?;
        }

        if let Some(timeout) = lookup("DEFAULT_TIMEOUT") {
            self.run.task_timeout_secs = timeout
                .parse()
                .with_context(|| format!("Invalid {}DEFAULT_TIMEOUT: {}", ENV_PREFIX, timeout))?;
        }

        if let Some(dir) = lookup("DATA_DIR") {
            self.paths.data_dir = PathBuf::from(dir);
        }

        if let Some(dir) = lookup("RESULTS_DIR") {
            self.paths.results_dir = PathBuf::from(dir);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: BenchmarkConfig = toml::from_str(
            r#"
[run]
parallel_models = true

[scoring]
memory_reference_mb = 512.0
"#,
        )
        .unwrap();

        assert!(config.run.parallel_models);
        assert_eq!(config.run.task_timeout_secs, 300);
        assert!((config.scoring.memory_reference_mb - 512.0).abs() < f64::EPSILON);
        assert!((config.scoring.time_reference_secs - 1.0).abs() < f64::EPSILON);
        assert_eq!(config.backends.ollama_host, "http://localhost:11434");
    }

    #[test]
    fn test_save_and_load() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("bench.toml");

        let mut config = BenchmarkConfig::default();
        config.backends.requests_per_minute = 10;
        config.save(&path).unwrap();

        let loaded = BenchmarkConfig::load(&path).unwrap();
        assert_eq!(loaded.backends.requests_per_minute, 10);
    }

    #[test]
    fn test_overrides_from_lookup() {
        let env: HashMap<&str, &str> = [
            ("OLLAMA_HOST", "http://gpu-box:11434"),
            ("DEFAULT_TIMEOUT", "60"),
        ]
        .into_iter()
        .collect();

        let mut config = BenchmarkConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.backends.ollama_host, "http://gpu-box:11434");
        assert_eq!(config.run.task_timeout_secs, 60);
    }

    #[test]
    fn test_invalid_override_is_error() {
        let mut config = BenchmarkConfig::default();
        let result = config.apply_overrides(|key| {
            (key == "REQUESTS_PER_MINUTE").then(|| "lots".to_string())
        });
        assert!(result.is_err());
    }
}
