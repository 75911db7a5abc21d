//! Remote row sources and the outcomes of a single page fetch.
//!
//! Ownership model:
//! - `RowSource` is the sampler-facing interface: one bounded page request
//!   per call, no state carried between calls.
//! - `FetchOutcome` separates the expected remote conditions (end of data,
//!   throttling, deadline expiry) from fatal `PulseError`s.
//! - `DatasetsServerSource` talks to the Hugging Face datasets-server;
//!   `InMemorySource` and `ScriptedSource` serve tests and demos.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use crate::constants::fetch::{ERROR_BODY_PREVIEW_CHARS, MAX_PAGE_LENGTH};
use crate::data::{Batch, Record};
use crate::errors::PulseError;
use crate::types::{RowOffset, SourceId};

/// Remote backend implementations.
pub mod backends;
/// Helpers shared by source implementations.
pub mod utilities;

pub use backends::datasets_server::DatasetsServerSource;

/// Result of one page request that did not fail fatally.
#[derive(Clone, Debug, PartialEq)]
pub enum FetchOutcome {
    /// A non-empty page of records.
    Batch(Batch),
    /// No rows exist at or after the requested offset.
    EndOfData,
    /// The remote source asked the caller to slow down.
    RateLimited,
    /// The request did not complete before its deadline.
    TimedOut,
}

/// A page request as issued by the sampler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: RowOffset,
    pub length: usize,
}

/// Paginated remote row source.
///
/// Implementations issue at most one remote request per call and must report
/// a hung request as `TimedOut` once `timeout` elapses.
pub trait RowSource: Send + Sync {
    /// Stable source identifier used in logs and errors.
    fn id(&self) -> &str;

    /// Fetch up to `length` rows starting at `offset`.
    ///
    /// `length` must be within `1..=100`; use [`check_page_length`] before
    /// touching the network.
    fn fetch_batch(
        &self,
        offset: RowOffset,
        length: usize,
        timeout: Duration,
    ) -> Result<FetchOutcome, PulseError>;
}

impl<T: RowSource + ?Sized> RowSource for Arc<T> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn fetch_batch(
        &self,
        offset: RowOffset,
        length: usize,
        timeout: Duration,
    ) -> Result<FetchOutcome, PulseError> {
        (**self).fetch_batch(offset, length, timeout)
    }
}

/// Reject page lengths outside the remote ceiling.
pub fn check_page_length(length: usize) -> Result<(), PulseError> {
    if (1..=MAX_PAGE_LENGTH).contains(&length) {
        Ok(())
    } else {
        Err(PulseError::Configuration(format!(
            "page length must be within 1..={MAX_PAGE_LENGTH}, got {length}"
        )))
    }
}

/// Wrap normalized records as an outcome, mapping an empty page to end of data.
pub fn outcome_from_records(offset: RowOffset, records: Vec<Record>) -> FetchOutcome {
    if records.is_empty() {
        FetchOutcome::EndOfData
    } else {
        FetchOutcome::Batch(Batch::new(offset, records))
    }
}

/// In-memory row source for tests and small datasets.
pub struct InMemorySource {
    id: SourceId,
    records: Arc<Vec<Record>>,
    calls: AtomicUsize,
}

impl InMemorySource {
    /// Create an in-memory source from prebuilt records.
    pub fn new(id: impl Into<SourceId>, records: Vec<Record>) -> Self {
        Self {
            id: id.into(),
            records: Arc::new(records),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `fetch_batch` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl RowSource for InMemorySource {
    fn id(&self) -> &str {
        &self.id
    }

    fn fetch_batch(
        &self,
        offset: RowOffset,
        length: usize,
        _timeout: Duration,
    ) -> Result<FetchOutcome, PulseError> {
        check_page_length(length)?;
        self.calls.fetch_add(1, Ordering::Relaxed);
        let total = self.records.len();
        if offset >= total {
            return Ok(FetchOutcome::EndOfData);
        }
        let end = offset.saturating_add(length).min(total);
        Ok(outcome_from_records(
            offset,
            self.records[offset..end].to_vec(),
        ))
    }
}

/// One canned reply served by [`ScriptedSource`].
#[derive(Clone, Debug)]
pub enum ScriptedReply {
    /// Raw row values; wrapped rows are unwrapped as the remote normalizer does.
    Rows(Vec<Value>),
    EndOfData,
    RateLimited,
    TimedOut,
    /// A fatal non-success status with its body.
    Status(u16, String),
}

/// Row source that replays a fixed script of replies and records each request.
///
/// Once the script is exhausted every further call gets the fallback reply.
pub struct ScriptedSource {
    id: SourceId,
    script: Mutex<VecDeque<ScriptedReply>>,
    fallback: ScriptedReply,
    requests: Mutex<Vec<PageRequest>>,
}

impl ScriptedSource {
    /// Replay `script` in order, then report end of data.
    pub fn new(id: impl Into<SourceId>, script: Vec<ScriptedReply>) -> Self {
        Self::with_fallback(id, script, ScriptedReply::EndOfData)
    }

    /// Replay `script` in order, then answer every call with `fallback`.
    pub fn with_fallback(
        id: impl Into<SourceId>,
        script: Vec<ScriptedReply>,
        fallback: ScriptedReply,
    ) -> Self {
        Self {
            id: id.into(),
            script: Mutex::new(script.into()),
            fallback,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call with `reply`.
    pub fn repeating(id: impl Into<SourceId>, reply: ScriptedReply) -> Self {
        Self::with_fallback(id, Vec::new(), reply)
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests
            .lock()
            .expect("scripted source requests poisoned")
            .clone()
    }
}

impl RowSource for ScriptedSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn fetch_batch(
        &self,
        offset: RowOffset,
        length: usize,
        _timeout: Duration,
    ) -> Result<FetchOutcome, PulseError> {
        check_page_length(length)?;
        self.requests
            .lock()
            .expect("scripted source requests poisoned")
            .push(PageRequest { offset, length });
        let reply = self
            .script
            .lock()
            .expect("scripted source script poisoned")
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match reply {
            ScriptedReply::Rows(rows) => Ok(outcome_from_records(
                offset,
                rows.into_iter()
                    .take(length)
                    .map(Record::from_value)
                    .collect(),
            )),
            ScriptedReply::EndOfData => Ok(FetchOutcome::EndOfData),
            ScriptedReply::RateLimited => Ok(FetchOutcome::RateLimited),
            ScriptedReply::TimedOut => Ok(FetchOutcome::TimedOut),
            ScriptedReply::Status(status, body) => Err(PulseError::RemoteStatus {
                source_id: self.id.clone(),
                status,
                message: preview_body(&body),
            }),
        }
    }
}

/// Truncate a response body for inclusion in an error message.
pub(crate) fn preview_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= ERROR_BODY_PREVIEW_CHARS {
        return trimmed.to_string();
    }
    let mut preview: String = trimmed.chars().take(ERROR_BODY_PREVIEW_CHARS).collect();
    preview.push('…');
    preview
}
