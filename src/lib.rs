//! @ai:module:intent LocalAI Bench execution engine library
//! @ai:module:layer application
//! @ai:module:public_api adapter, catalog, config, engine, error, report, runner, scoring, store

pub mod adapter;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod report;
pub mod runner;
pub mod scoring;
pub mod store;

pub use adapter::{AdapterRegistry, ModelAdapter};
pub use config::BenchmarkConfig;
pub use engine::{BenchmarkEngine, BenchmarkRun, RunManager, RunStatus, TaskResult};
pub use error::{BenchError, Result};
pub use report::ReportGenerator;
pub use scoring::{ScoreCalculator, ScoreSet};
