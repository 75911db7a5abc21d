use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aggregate::{CategoryCount, DateCount, Histograms};
use crate::cache::{Cached, ResultCache};
use crate::config::{DashboardConfig, SampleBudget};
use crate::errors::PulseError;
use crate::metrics::{Summary, summarize};
use crate::sampler::AdaptiveSampler;
use crate::source::RowSource;

/// Body returned by the statistics endpoint.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    /// Category counts, largest first.
    pub source_breakdown: Vec<CategoryCount>,
    /// Daily counts, oldest first.
    pub time_series: Vec<DateCount>,
    /// Rows aggregated by this request; absent when served from cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_count: Option<usize>,
    pub cached: bool,
    /// When the aggregation was computed.
    pub generated_at: DateTime<Utc>,
    pub summary: Summary,
}

impl DashboardResponse {
    fn from_entry(entry: &Cached<Histograms>, cached: bool, processed: Option<usize>) -> Self {
        Self {
            source_breakdown: entry.value.category_breakdown(),
            time_series: entry.value.time_series(),
            processed_count: processed,
            cached,
            generated_at: entry.created_at,
            summary: summarize(&entry.value),
        }
    }
}

/// Cache-fronted sample-and-aggregate query.
///
/// Concurrent misses each run their own sampling pass; whichever finishes
/// last owns the cache slot.
pub struct DashboardQuery<S> {
    sampler: AdaptiveSampler<S>,
    cache: Arc<ResultCache<Histograms>>,
    budget: SampleBudget,
}

impl<S: RowSource> DashboardQuery<S> {
    pub fn new(
        sampler: AdaptiveSampler<S>,
        cache: Arc<ResultCache<Histograms>>,
        budget: SampleBudget,
    ) -> Self {
        Self {
            sampler,
            cache,
            budget,
        }
    }

    /// Wire a source into a query using the configured pause, TTL and budget.
    pub fn from_config(source: S, config: &DashboardConfig) -> Self {
        Self::new(
            AdaptiveSampler::new(source).with_pause(config.inter_batch_pause),
            Arc::new(ResultCache::new(config.cache_ttl)),
            config.budget.clone(),
        )
    }

    pub fn sampler(&self) -> &AdaptiveSampler<S> {
        &self.sampler
    }

    pub fn cache(&self) -> &ResultCache<Histograms> {
        &self.cache
    }

    /// Serve fresh cached statistics, or sample, aggregate, and cache new ones.
    ///
    /// Errors leave the cache untouched; an expired entry is never served as a
    /// fallback.
    ///
    /// A pass that folded no rows is returned with `processedCount: 0` and is
    /// not stored; the next request samples again.
    pub fn handle(&self) -> Result<DashboardResponse, PulseError> {
        if let Some(entry) = self.cache.get() {
            debug!(
                "[pulse:query] cache hit created_at={}",
                entry.created_at.to_rfc3339()
            );
            return Ok(DashboardResponse::from_entry(&entry, true, None));
        }
        debug!("[pulse:query] cache miss; sampling source='{}'", self.sampler.source().id());

        let collected = self
            .sampler
            .collect(&self.budget, Histograms::new, Histograms::fold_batch)
            .inspect_err(|err| warn!("[pulse:query] sampling failed: {err}"))?;
        let rows = collected.report.rows_processed;
        info!(
            "[pulse:query] aggregated rows={} categories={} time_points={} attempts={}",
            rows,
            collected.state.categories().len(),
            collected.state.time_points(),
            collected.attempts
        );

        if collected.state.is_empty() {
            warn!("[pulse:query] sample was empty; result not cached");
            let entry = Cached {
                value: collected.state,
                created_at: self.cache.now(),
            };
            return Ok(DashboardResponse::from_entry(&entry, false, Some(rows)));
        }
        let entry = self.cache.put(collected.state);
        Ok(DashboardResponse::from_entry(&entry, false, Some(rows)))
    }
}
