use thiserror::Error;

use crate::types::SourceId;

/// Error type for configuration, remote fetch, and sampling failures.
///
/// Transient remote conditions (end of data, rate limiting, timeouts) are not
/// errors; they are reported as [`crate::source::FetchOutcome`] variants and
/// only become `RetryExhausted` once the downsized retry is also interrupted.
#[derive(Debug, Error)]
pub enum PulseError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("data source '{source_id}' is unavailable: {reason}")]
    SourceUnavailable { source_id: SourceId, reason: String },
    #[error("data source '{source_id}' responded with status {status}: {message}")]
    RemoteStatus {
        source_id: SourceId,
        status: u16,
        message: String,
    },
    #[error("data source '{source_id}' returned an undecodable body: {reason}")]
    Decode { source_id: SourceId, reason: String },
    #[error(
        "sampling interrupted on all {attempts} attempts ({reason}); last attempt processed {rows_processed} rows"
    )]
    RetryExhausted {
        attempts: usize,
        reason: String,
        rows_processed: usize,
    },
    #[error("background worker failed: {0}")]
    Worker(String),
}

impl PulseError {
    /// Whether the failure originated from the remote data source.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            PulseError::SourceUnavailable { .. }
                | PulseError::RemoteStatus { .. }
                | PulseError::Decode { .. }
                | PulseError::RetryExhausted { .. }
        )
    }
}
