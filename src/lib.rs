#![doc = include_str!("../README.md")]

/// CLI entry point used by the `dataset-pulse` binary.
pub mod app;
/// Histogram folding of fetched batches.
pub mod aggregate;
/// Single-slot TTL cache and clocks.
pub mod cache;
/// Dashboard, remote, and sampling budget configuration.
pub mod config;
/// Centralized constants used across fetcher, sampler, cache, and server.
pub mod constants;
/// Record and batch types.
pub mod data;
/// Category share and summary helpers.
pub mod metrics;
/// Cache-fronted query operation.
pub mod query;
/// Budgeted sampling passes with a single downsized retry.
pub mod sampler;
/// HTTP routes and handlers.
pub mod server;
/// Remote row source trait and implementations.
pub mod source;
/// Shared type aliases.
pub mod types;

mod errors;

pub use aggregate::{CategoryCount, DateCount, Histograms};
pub use cache::{Cached, Clock, ManualClock, ResultCache, SystemClock};
pub use config::{DashboardConfig, RemoteConfig, SampleBudget};
pub use data::{Batch, Record};
pub use errors::PulseError;
pub use query::{DashboardQuery, DashboardResponse};
pub use sampler::{AdaptiveSampler, BatchStream, Interruption, SampleReport, Termination};
pub use source::{
    DatasetsServerSource, FetchOutcome, InMemorySource, PageRequest, RowSource, ScriptedReply,
    ScriptedSource,
};
pub use types::{CategoryLabel, DatasetId, RowOffset, SourceId};
