//! Budgeted sampling of a remote row source.
//!
//! A sampling pass walks the source from offset 0 one page at a time through
//! a [`BatchStream`], stopping at the first of: target rows reached, batch cap
//! reached, end of data, time budget spent, or an interruption (timeout or
//! throttling). [`AdaptiveSampler::collect`] folds a pass into fresh state and
//! retries an interrupted pass exactly once with a downsized budget.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::SampleBudget;
use crate::constants::sampler::{DEFAULT_INTER_BATCH_PAUSE, MAX_SAMPLING_PASSES};
use crate::data::Batch;
use crate::errors::PulseError;
use crate::source::{FetchOutcome, RowSource};
use crate::types::RowOffset;

/// Transient remote condition that cut a pass short.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interruption {
    TimedOut,
    RateLimited,
}

impl fmt::Display for Interruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interruption::TimedOut => f.write_str("timed out"),
            Interruption::RateLimited => f.write_str("rate limited"),
        }
    }
}

/// Why a sampling pass stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    TargetReached,
    MaxBatches,
    EndOfData,
    TimeBudget,
    /// Stopped early; the caller should retry with a smaller budget.
    Interrupted(Interruption),
}

impl Termination {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Termination::Interrupted(_))
    }
}

/// Counters for one finished sampling pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleReport {
    /// Batches handed to the caller.
    pub batches: usize,
    /// Rows contained in those batches.
    pub rows_processed: usize,
    /// Rows asked for across all page requests, including failed ones.
    pub rows_requested: usize,
    pub termination: Termination,
    pub elapsed: Duration,
}

/// Lazy, finite, non-restartable sequence of batches for one pass.
///
/// Yields `Ok(batch)` per fetched page and at most one `Err` for a fatal fetch
/// failure, after which it is exhausted. [`BatchStream::report`] is available
/// once the stream has stopped on its own.
pub struct BatchStream<'a, S: RowSource + ?Sized> {
    source: &'a S,
    budget: SampleBudget,
    pause: Duration,
    offset: RowOffset,
    rows_processed: usize,
    rows_requested: usize,
    batches: usize,
    started: Instant,
    termination: Option<Termination>,
    failed: bool,
}

impl<'a, S: RowSource + ?Sized> BatchStream<'a, S> {
    fn new(source: &'a S, budget: SampleBudget, pause: Duration) -> Self {
        Self {
            source,
            budget,
            pause,
            offset: 0,
            rows_processed: 0,
            rows_requested: 0,
            batches: 0,
            started: Instant::now(),
            termination: None,
            failed: false,
        }
    }

    /// Budget driving this pass.
    pub fn budget(&self) -> &SampleBudget {
        &self.budget
    }

    /// Offset the next page request would start at.
    pub fn offset(&self) -> RowOffset {
        self.offset
    }

    /// Rows yielded so far.
    pub fn rows_processed(&self) -> usize {
        self.rows_processed
    }

    /// Final counters, or `None` while the pass is still running or failed.
    pub fn report(&self) -> Option<SampleReport> {
        let termination = self.termination?;
        Some(SampleReport {
            batches: self.batches,
            rows_processed: self.rows_processed,
            rows_requested: self.rows_requested,
            termination,
            elapsed: self.started.elapsed(),
        })
    }

    fn limit_reached(&self) -> Option<Termination> {
        if self.rows_processed >= self.budget.target_rows {
            return Some(Termination::TargetReached);
        }
        if self.batches >= self.budget.max_batches {
            return Some(Termination::MaxBatches);
        }
        if let Some(limit) = self.budget.time_budget
            && self.started.elapsed() >= limit
        {
            return Some(Termination::TimeBudget);
        }
        None
    }

    fn stop(&mut self, termination: Termination) -> Option<Result<Batch, PulseError>> {
        self.termination = Some(termination);
        None
    }
}

impl<S: RowSource + ?Sized> Iterator for BatchStream<'_, S> {
    type Item = Result<Batch, PulseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.termination.is_some() || self.failed {
            return None;
        }
        if let Some(termination) = self.limit_reached() {
            return self.stop(termination);
        }
        if self.batches > 0 && !self.pause.is_zero() {
            thread::sleep(self.pause);
        }

        let remaining = self.budget.target_rows - self.rows_processed;
        let length = self.budget.batch_size.min(remaining);
        self.rows_requested += length;
        let outcome = match self
            .source
            .fetch_batch(self.offset, length, self.budget.fetch_timeout)
        {
            Ok(outcome) => outcome,
            Err(err) => {
                self.failed = true;
                return Some(Err(err));
            }
        };

        match outcome {
            FetchOutcome::Batch(batch) if batch.is_empty() => self.stop(Termination::EndOfData),
            FetchOutcome::Batch(batch) => {
                self.offset += batch.len();
                self.rows_processed += batch.len();
                self.batches += 1;
                Some(Ok(batch))
            }
            FetchOutcome::EndOfData => self.stop(Termination::EndOfData),
            FetchOutcome::RateLimited => {
                self.stop(Termination::Interrupted(Interruption::RateLimited))
            }
            FetchOutcome::TimedOut => self.stop(Termination::Interrupted(Interruption::TimedOut)),
        }
    }
}

/// Folded state plus provenance of the pass that produced it.
#[derive(Clone, Debug)]
pub struct Collected<A> {
    pub state: A,
    pub report: SampleReport,
    /// Passes run, `1` or `2`.
    pub attempts: usize,
    /// Budget of the pass that produced `state`.
    pub budget: SampleBudget,
}

/// Drives a [`RowSource`] through budgeted sampling passes.
pub struct AdaptiveSampler<S> {
    source: S,
    inter_batch_pause: Duration,
}

impl<S: RowSource> AdaptiveSampler<S> {
    /// Create a sampler with the default inter-batch pause.
    pub fn new(source: S) -> Self {
        Self {
            source,
            inter_batch_pause: DEFAULT_INTER_BATCH_PAUSE,
        }
    }

    /// Override the pause slept between consecutive page requests.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.inter_batch_pause = pause;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Start a pass over `budget` without fetching anything yet.
    pub fn stream(&self, budget: SampleBudget) -> Result<BatchStream<'_, S>, PulseError> {
        budget.validate()?;
        Ok(BatchStream::new(
            &self.source,
            budget,
            self.inter_batch_pause,
        ))
    }

    /// Run one pass, handing every batch to `sink`.
    ///
    /// Interruptions are reported through `SampleReport::termination`; only
    /// fatal fetch errors are returned as `Err`.
    pub fn sample<F>(&self, budget: &SampleBudget, mut sink: F) -> Result<SampleReport, PulseError>
    where
        F: FnMut(&Batch),
    {
        let mut stream = self.stream(budget.clone())?;
        for batch in stream.by_ref() {
            sink(&batch?);
        }
        stream.report().ok_or_else(|| {
            PulseError::Worker("sampling pass ended without a termination reason".into())
        })
    }

    /// Run a pass folding into `init()`, retrying once with a downsized budget.
    ///
    /// Each pass folds into fresh state, so rows from an interrupted pass are
    /// never counted together with the retry's rows. A second interruption is
    /// returned as `PulseError::RetryExhausted`.
    pub fn collect<A, Init, Fold>(
        &self,
        budget: &SampleBudget,
        init: Init,
        mut fold: Fold,
    ) -> Result<Collected<A>, PulseError>
    where
        Init: Fn() -> A,
        Fold: FnMut(&mut A, &Batch),
    {
        let source_id = self.source.id();
        let mut budget = budget.clone();
        let mut attempt = 1usize;
        loop {
            let mut state = init();
            info!(
                "[pulse:sampler] pass {} start source='{}' target={} batch_size={} max_batches={}",
                attempt, source_id, budget.target_rows, budget.batch_size, budget.max_batches
            );
            let report = self.sample(&budget, |batch| fold(&mut state, batch))?;

            let Termination::Interrupted(reason) = report.termination else {
                info!(
                    "[pulse:sampler] pass {} done source='{}' rows={} batches={} reason={:?} elapsed={:.2}s",
                    attempt,
                    source_id,
                    report.rows_processed,
                    report.batches,
                    report.termination,
                    report.elapsed.as_secs_f64()
                );
                return Ok(Collected {
                    state,
                    report,
                    attempts: attempt,
                    budget,
                });
            };

            warn!(
                "[pulse:sampler] pass {} {} source='{}' after rows={} batches={}",
                attempt, reason, source_id, report.rows_processed, report.batches
            );
            if attempt >= MAX_SAMPLING_PASSES {
                return Err(PulseError::RetryExhausted {
                    attempts: attempt,
                    reason: reason.to_string(),
                    rows_processed: report.rows_processed,
                });
            }
            budget = budget.downsized();
            attempt += 1;
            info!(
                "[pulse:sampler] retrying with downsized target={} source='{}'",
                budget.target_rows, source_id
            );
        }
    }
}
