//! @ai:module:intent Single task execution: prompt, adapter session, output payload, scoring
//! @ai:module:layer application
//! @ai:module:public_api TaskRunner, CancellationToken, OutputExtractor

pub mod cancel;
pub mod output;
pub mod task_runner;

pub use cancel::CancellationToken;
pub use output::{OutputExtractor, OutputExtractorTrait, OutputPayload};
pub use task_runner::{build_prompt, TaskRunner};
