pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod parser;
pub mod pipeline;
pub mod scheduler;
pub mod storage;
pub mod types;

pub mod gateway;

// Layered boundaries for application ports and infrastructure adapters
pub mod app;
pub mod infra;
