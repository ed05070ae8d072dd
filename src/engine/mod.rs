//! @ai:module:intent Benchmark runs: records, orchestration, aggregation and background lifecycle
//! @ai:module:layer application
//! @ai:module:public_api BenchmarkEngine, RunManager, BenchmarkRun, TaskResult, RunStatus

pub mod aggregator;
pub mod lifecycle;
pub mod orchestrator;
pub mod run;
pub mod views;

pub use aggregator::{AggregateScores, ScoreAggregator, ScoreAggregatorTrait};
pub use lifecycle::{RunManager, CANCELLED_BY_USER};
pub use orchestrator::{BenchmarkEngine, RunCell};
pub use run::{BenchmarkRun, RunRequest, RunStatus, TaskResult, UNCATEGORIZED};
pub use views::{CategorySummary, ModelSummary, Progress, RunResults, RunStatusReport};
