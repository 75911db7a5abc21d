use std::net::SocketAddr;
use std::time::Duration;

use crate::constants::cache::DEFAULT_TTL;
use crate::constants::fetch::{
    DEFAULT_CONFIG, DEFAULT_DATASET, DEFAULT_FETCH_TIMEOUT, DEFAULT_ROWS_ENDPOINT,
    DEFAULT_SOURCE_ID, DEFAULT_SPLIT, MAX_PAGE_LENGTH,
};
use crate::constants::sampler::{
    DEFAULT_INTER_BATCH_PAUSE, DEFAULT_MAX_BATCHES, DEFAULT_TARGET_ROWS, DOWNSIZE_DIVISOR,
};
use crate::constants::server::DEFAULT_BIND;
use crate::errors::PulseError;
use crate::types::{DatasetId, SourceId};

/// Limits for a single sampling pass.
///
/// Immutable once a pass starts. An interrupted pass derives a smaller budget
/// through [`SampleBudget::downsized`] for its one retry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleBudget {
    /// Rows the pass aims to read.
    pub target_rows: usize,
    /// Rows requested per page, `1..=100`.
    pub batch_size: usize,
    /// Upper bound on pages requested.
    pub max_batches: usize,
    /// Deadline for each page request.
    pub fetch_timeout: Duration,
    /// Optional wall-clock bound for the whole pass.
    pub time_budget: Option<Duration>,
}

impl Default for SampleBudget {
    fn default() -> Self {
        Self {
            target_rows: DEFAULT_TARGET_ROWS,
            batch_size: MAX_PAGE_LENGTH,
            max_batches: DEFAULT_MAX_BATCHES,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            time_budget: None,
        }
    }
}

impl SampleBudget {
    /// Budget for `target_rows` using full pages and enough batches to reach it.
    pub fn for_target(target_rows: usize) -> Self {
        let batch_size = MAX_PAGE_LENGTH.min(target_rows.max(1));
        Self {
            target_rows,
            batch_size,
            max_batches: target_rows.div_ceil(batch_size).max(1),
            ..Self::default()
        }
    }

    /// Reject budgets the remote source cannot serve.
    pub fn validate(&self) -> Result<(), PulseError> {
        if self.target_rows == 0 {
            return Err(PulseError::Configuration(
                "sample target_rows must be positive".into(),
            ));
        }
        if !(1..=MAX_PAGE_LENGTH).contains(&self.batch_size) {
            return Err(PulseError::Configuration(format!(
                "sample batch_size must be within 1..={MAX_PAGE_LENGTH}, got {}",
                self.batch_size
            )));
        }
        if self.max_batches == 0 {
            return Err(PulseError::Configuration(
                "sample max_batches must be positive".into(),
            ));
        }
        if self.fetch_timeout.is_zero() {
            return Err(PulseError::Configuration(
                "sample fetch_timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Smaller budget used for the single retry after an interrupted pass.
    ///
    /// Halves the target (never below one row), clamps the page size to the
    /// new target, and trims `max_batches` to what the new target needs.
    pub fn downsized(&self) -> Self {
        let target_rows = (self.target_rows / DOWNSIZE_DIVISOR).max(1);
        let batch_size = self.batch_size.min(target_rows).max(1);
        let max_batches = self
            .max_batches
            .min(target_rows.div_ceil(batch_size))
            .max(1);
        Self {
            target_rows,
            batch_size,
            max_batches,
            fetch_timeout: self.fetch_timeout,
            time_budget: self.time_budget,
        }
    }
}

/// Connection settings for the remote datasets-server.
#[derive(Clone, Debug)]
pub struct RemoteConfig {
    /// Stable id used in logs and errors.
    pub source_id: SourceId,
    /// Full URL of the `/rows` endpoint.
    pub endpoint: String,
    /// Hugging Face dataset id, e.g. `shachardon/ShareLM`.
    pub dataset: DatasetId,
    /// Dataset config name, e.g. `default`.
    pub config: String,
    /// Split name, e.g. `train`.
    pub split: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            source_id: DEFAULT_SOURCE_ID.to_string(),
            endpoint: DEFAULT_ROWS_ENDPOINT.to_string(),
            dataset: DEFAULT_DATASET.to_string(),
            config: DEFAULT_CONFIG.to_string(),
            split: DEFAULT_SPLIT.to_string(),
        }
    }
}

/// Top-level dashboard configuration.
#[derive(Clone, Debug)]
pub struct DashboardConfig {
    /// Remote source settings.
    pub remote: RemoteConfig,
    /// Budget for the first sampling pass of each cache miss.
    pub budget: SampleBudget,
    /// Pause between consecutive page requests.
    pub inter_batch_pause: Duration,
    /// Freshness window of the cached aggregation.
    pub cache_ttl: Duration,
    /// HTTP listen address.
    pub bind: SocketAddr,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            remote: RemoteConfig::default(),
            budget: SampleBudget::default(),
            inter_batch_pause: DEFAULT_INTER_BATCH_PAUSE,
            cache_ttl: DEFAULT_TTL,
            bind: DEFAULT_BIND,
        }
    }
}

impl DashboardConfig {
    /// Parse a listen address, reporting failures as configuration errors.
    pub fn parse_bind(value: &str) -> Result<SocketAddr, PulseError> {
        value.parse().map_err(|err| {
            PulseError::Configuration(format!("invalid bind address '{value}': {err}"))
        })
    }

    /// Default listen address.
    pub fn default_bind() -> SocketAddr {
        DEFAULT_BIND
    }
}
