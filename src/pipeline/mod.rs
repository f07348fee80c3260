// Feed ingestion pipeline: fetch, transform, load, and the run orchestrator

pub mod fetch;
pub mod load;
pub mod orchestrator;
pub mod transform;

pub use fetch::Fetcher;
pub use load::Loader;
pub use orchestrator::{RunOrchestrator, RunReport};
pub use transform::Transformer;
