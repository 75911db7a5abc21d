use serde::Serialize;

use crate::aggregate::Histograms;
use crate::types::CategoryLabel;

/// Aggregate shape of the category histogram.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySkew {
    pub categories: usize,
    /// Share of the largest category.
    pub max_share: f64,
    /// Largest count over smallest count.
    pub ratio: f64,
    /// Shares ordered like the breakdown chart.
    pub per_category: Vec<CategoryShare>,
}

/// Per-category share of the sample, as shown on the breakdown chart.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CategoryShare {
    pub name: CategoryLabel,
    pub count: u64,
    pub share: f64,
}

/// Headline numbers shown next to the charts.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Records counted in the category histogram.
    pub total_records: usize,
    /// Distinct category labels.
    pub categories: usize,
    /// Distinct dates in the time series.
    pub time_points: usize,
    /// Share of the largest category, `0.0` for an empty sample.
    pub dominant_share: f64,
    /// Largest over smallest category count, `0.0` for an empty sample.
    pub imbalance_ratio: f64,
    /// Per-category percentages for the breakdown chart.
    pub shares: Vec<CategoryShare>,
}

/// Compute skew metrics from category counts.
pub fn category_skew(histograms: &Histograms) -> Option<CategorySkew> {
    let counts = histograms.categories();
    if counts.is_empty() {
        return None;
    }
    let total: u64 = counts.values().sum();
    let min = counts.values().copied().min().unwrap_or(0);
    let max = counts.values().copied().max().unwrap_or(0);
    let share_of = |count: u64| {
        if total == 0 {
            0.0
        } else {
            count as f64 / total as f64
        }
    };
    // Folded labels always carry a count of at least one.
    let ratio = max as f64 / min.max(1) as f64;
    let mut per_category: Vec<CategoryShare> = counts
        .iter()
        .map(|(name, count)| CategoryShare {
            name: name.clone(),
            count: *count,
            share: share_of(*count),
        })
        .collect();
    per_category.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    Some(CategorySkew {
        categories: counts.len(),
        max_share: share_of(max),
        ratio,
        per_category,
    })
}

/// Headline numbers for a histogram state.
pub fn summarize(histograms: &Histograms) -> Summary {
    let time_points = histograms.time_points();
    match category_skew(histograms) {
        Some(skew) => Summary {
            total_records: histograms.records(),
            categories: skew.categories,
            time_points,
            dominant_share: skew.max_share,
            imbalance_ratio: skew.ratio,
            shares: skew.per_category,
        },
        None => Summary {
            total_records: histograms.records(),
            categories: 0,
            time_points,
            dominant_share: 0.0,
            imbalance_ratio: 0.0,
            shares: Vec::new(),
        },
    }
}
