use std::io::ErrorKind;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use ureq::Agent;

use crate::config::RemoteConfig;
use crate::constants::fetch::{END_OF_DATA_STATUS, RATE_LIMITED_STATUS};
use crate::errors::PulseError;
use crate::source::utilities::normalize::records_from_body;
use crate::source::{FetchOutcome, RowSource, check_page_length, outcome_from_records, preview_body};
use crate::types::RowOffset;

/// Row source backed by the Hugging Face datasets-server `/rows` endpoint.
///
/// Each call issues one GET with `dataset`, `config`, `split`, `offset` and
/// `length` query parameters and a per-request global timeout.
pub struct DatasetsServerSource {
    config: RemoteConfig,
    agent: Agent,
}

impl DatasetsServerSource {
    /// Create a source for the configured dataset split.
    pub fn new(config: RemoteConfig) -> Self {
        // Status codes are classified by hand (422 and 429 are not failures).
        let agent: Agent = Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();
        Self { config, agent }
    }

    /// Remote settings this source was built with.
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Map a completed response onto a fetch outcome.
    fn classify_response(
        source_id: &str,
        offset: RowOffset,
        status: u16,
        body: &str,
    ) -> Result<FetchOutcome, PulseError> {
        match status {
            END_OF_DATA_STATUS => Ok(FetchOutcome::EndOfData),
            RATE_LIMITED_STATUS => Ok(FetchOutcome::RateLimited),
            200..=299 => Ok(outcome_from_records(
                offset,
                records_from_body(source_id, body)?,
            )),
            _ => Err(PulseError::RemoteStatus {
                source_id: source_id.to_string(),
                status,
                message: preview_body(body),
            }),
        }
    }
}

/// Whether a transport error means the deadline expired.
fn is_timeout(err: &ureq::Error) -> bool {
    match err {
        ureq::Error::Timeout(_) => true,
        ureq::Error::Io(io) => matches!(io.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock),
        _ => false,
    }
}

impl RowSource for DatasetsServerSource {
    fn id(&self) -> &str {
        &self.config.source_id
    }

    fn fetch_batch(
        &self,
        offset: RowOffset,
        length: usize,
        timeout: Duration,
    ) -> Result<FetchOutcome, PulseError> {
        check_page_length(length)?;
        let source_id = &self.config.source_id;
        debug!(
            "[pulse:fetch] requesting rows source='{}' dataset='{}' offset={} length={}",
            source_id, self.config.dataset, offset, length
        );
        let started = Instant::now();
        let response = self
            .agent
            .get(&self.config.endpoint)
            .query("dataset", &self.config.dataset)
            .query("config", &self.config.config)
            .query("split", &self.config.split)
            .query("offset", offset.to_string())
            .query("length", length.to_string())
            .header("Accept", "application/json")
            .config()
            .timeout_global(Some(timeout))
            .build()
            .call();

        let response = match response {
            Ok(response) => response,
            Err(err) if is_timeout(&err) => {
                warn!(
                    "[pulse:fetch] request timed out source='{}' offset={} after {:.2}s",
                    source_id,
                    offset,
                    started.elapsed().as_secs_f64()
                );
                return Ok(FetchOutcome::TimedOut);
            }
            Err(err) => {
                return Err(PulseError::SourceUnavailable {
                    source_id: source_id.clone(),
                    reason: format!("failed querying rows endpoint: {err}"),
                });
            }
        };

        let status = response.status().as_u16();
        let body = match response.into_body().read_to_string() {
            Ok(body) => body,
            Err(err) if is_timeout(&err) => {
                warn!(
                    "[pulse:fetch] response body timed out source='{}' offset={}",
                    source_id, offset
                );
                return Ok(FetchOutcome::TimedOut);
            }
            Err(err) if (200..300).contains(&status) => {
                return Err(PulseError::SourceUnavailable {
                    source_id: source_id.clone(),
                    reason: format!("failed reading rows response body: {err}"),
                });
            }
            Err(_) => String::new(),
        };

        let outcome = Self::classify_response(source_id, offset, status, &body)?;
        match &outcome {
            FetchOutcome::Batch(batch) => info!(
                "[pulse:fetch] fetched rows source='{}' offset={} rows={} elapsed={:.2}s",
                source_id,
                offset,
                batch.len(),
                started.elapsed().as_secs_f64()
            ),
            FetchOutcome::EndOfData => info!(
                "[pulse:fetch] end of data source='{}' offset={} status={}",
                source_id, offset, status
            ),
            FetchOutcome::RateLimited => warn!(
                "[pulse:fetch] rate limited source='{}' offset={}",
                source_id, offset
            ),
            FetchOutcome::TimedOut => {}
        }
        Ok(outcome)
    }
}
