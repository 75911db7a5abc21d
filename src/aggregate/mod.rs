//! Pure folding of fetched batches into summary histograms.
//!
//! `Histograms` is a commutative counter state: folding the same set of
//! batches in any order, or merging partial states in any grouping, yields
//! equal results. Malformed records never abort a fold; they land in the
//! `unknown` category and contribute no date.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::constants::aggregate::{
    CATEGORY_FIELD, DATE_KEY_FORMAT, TIMESTAMP_FIELD, UNKNOWN_CATEGORY,
};
use crate::data::{Batch, Record};
use crate::types::CategoryLabel;

/// Timestamp parsing helpers.
pub mod timestamps;

pub use timestamps::{parse_timestamp_str, utc_date_of};

/// Running category and date tallies.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Histograms {
    categories: IndexMap<CategoryLabel, u64>,
    dates: BTreeMap<NaiveDate, u64>,
    records: usize,
}

/// One slice of the category breakdown chart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub name: CategoryLabel,
    pub value: u64,
}

/// One point of the daily time series chart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DateCount {
    /// UTC date formatted as `YYYY-MM-DD`.
    pub date: String,
    pub count: u64,
}

impl Histograms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one batch into the tallies.
    pub fn fold(mut self, batch: &Batch) -> Self {
        self.fold_batch(batch);
        self
    }

    /// In-place variant of [`Histograms::fold`].
    pub fn fold_batch(&mut self, batch: &Batch) {
        for record in &batch.records {
            self.fold_record(record);
        }
    }

    /// Count a single record.
    pub fn fold_record(&mut self, record: &Record) {
        let label = category_label(record.get(CATEGORY_FIELD));
        *self.categories.entry(label).or_insert(0) += 1;
        if let Some(date) = record.get(TIMESTAMP_FIELD).and_then(utc_date_of) {
            *self.dates.entry(date).or_insert(0) += 1;
        }
        self.records += 1;
    }

    /// Add another partial state into this one.
    pub fn merge(&mut self, other: &Histograms) {
        for (label, count) in &other.categories {
            *self.categories.entry(label.clone()).or_insert(0) += count;
        }
        for (date, count) in &other.dates {
            *self.dates.entry(*date).or_insert(0) += count;
        }
        self.records += other.records;
    }

    /// Number of records folded so far.
    pub fn records(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Count for one category label.
    pub fn category_count(&self, label: &str) -> u64 {
        self.categories.get(label).copied().unwrap_or(0)
    }

    /// Count for one UTC date.
    pub fn date_count(&self, date: NaiveDate) -> u64 {
        self.dates.get(&date).copied().unwrap_or(0)
    }

    /// Raw category tallies in first-seen order.
    pub fn categories(&self) -> &IndexMap<CategoryLabel, u64> {
        &self.categories
    }

    /// Number of distinct dates with at least one record.
    pub fn time_points(&self) -> usize {
        self.dates.len()
    }

    /// Category counts sorted by count descending, then label ascending.
    pub fn category_breakdown(&self) -> Vec<CategoryCount> {
        let mut breakdown: Vec<CategoryCount> = self
            .categories
            .iter()
            .map(|(name, value)| CategoryCount {
                name: name.clone(),
                value: *value,
            })
            .collect();
        breakdown.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.name.cmp(&b.name)));
        breakdown
    }

    /// Daily counts in ascending date order.
    pub fn time_series(&self) -> Vec<DateCount> {
        self.dates
            .iter()
            .map(|(date, count)| DateCount {
                date: date.format(DATE_KEY_FORMAT).to_string(),
                count: *count,
            })
            .collect()
    }
}

/// Category label for a raw `source` value.
///
/// Strings are trimmed; numbers and booleans are stringified; anything else,
/// or an empty result, maps to `unknown`.
fn category_label(value: Option<&Value>) -> CategoryLabel {
    let label = match value {
        Some(Value::String(raw)) => raw.trim().to_string(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        _ => String::new(),
    };
    if label.is_empty() {
        UNKNOWN_CATEGORY.to_string()
    } else {
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn batch(offset: usize, values: Vec<Value>) -> Batch {
        Batch::new(offset, values.into_iter().map(Record::from_value).collect())
    }

    #[test]
    fn missing_and_empty_source_count_as_unknown() {
        let histograms = Histograms::new().fold(&batch(
            0,
            vec![
                json!({ "timestamp": "2024-01-01T00:00:00Z" }),
                json!({ "source": "" }),
                json!({ "source": "   " }),
                json!({ "source": null }),
                json!({ "source": ["x"] }),
            ],
        ));
        assert_eq!(histograms.category_count(UNKNOWN_CATEGORY), 5);
        assert_eq!(histograms.records(), 5);
    }

    #[test]
    fn unparseable_timestamp_counts_category_only() {
        let histograms = Histograms::new().fold(&batch(
            0,
            vec![json!({ "source": "A", "timestamp": "not-a-date" })],
        ));
        assert_eq!(histograms.category_count("A"), 1);
        assert_eq!(histograms.time_points(), 0);
        assert!(histograms.time_series().is_empty());
    }

    #[test]
    fn out_of_range_epochs_count_category_only() {
        let histograms = Histograms::new().fold(&batch(
            0,
            vec![
                json!({ "source": "A", "timestamp": i64::MIN }),
                json!({ "source": "A", "timestamp": -1.0e30 }),
                json!({ "source": "A", "timestamp": i64::MAX }),
            ],
        ));
        assert_eq!(histograms.category_count("A"), 3);
        assert_eq!(histograms.records(), 3);
        assert_eq!(histograms.time_points(), 0);
    }

    #[test]
    fn wrapped_rows_are_unwrapped_before_counting() {
        let histograms = Histograms::new().fold(&batch(
            0,
            vec![json!({ "row_idx": 0, "row": { "source": "wrapped", "timestamp": 1_704_067_200 } })],
        ));
        assert_eq!(histograms.category_count("wrapped"), 1);
        assert_eq!(
            histograms.date_count(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
            1
        );
    }

    #[test]
    fn scalar_labels_are_stringified() {
        let histograms = Histograms::new().fold(&batch(
            0,
            vec![json!({ "source": 42 }), json!({ "source": true })],
        ));
        assert_eq!(histograms.category_count("42"), 1);
        assert_eq!(histograms.category_count("true"), 1);
    }

    #[test]
    fn fold_order_does_not_change_result() {
        let batches = vec![
            batch(
                0,
                vec![
                    json!({ "source": "A", "timestamp": "2024-01-01T00:00:00Z" }),
                    json!({ "source": "B" }),
                ],
            ),
            batch(2, vec![json!({ "source": "A", "timestamp": "2024-01-02T08:00:00Z" })]),
            batch(3, vec![json!({ "source": "C", "timestamp": "bogus" })]),
        ];
        let forward = batches.iter().fold(Histograms::new(), Histograms::fold);
        let backward = batches.iter().rev().fold(Histograms::new(), Histograms::fold);
        let rotated = [&batches[1], &batches[2], &batches[0]]
            .into_iter()
            .fold(Histograms::new(), Histograms::fold);
        assert_eq!(forward, backward);
        assert_eq!(forward, rotated);

        let mut merged = Histograms::new().fold(&batches[2]);
        merged.merge(&Histograms::new().fold(&batches[0]).fold(&batches[1]));
        assert_eq!(forward, merged);
    }

    #[test]
    fn breakdown_sorts_by_count_then_label_and_series_by_date() {
        let histograms = Histograms::new().fold(&batch(
            0,
            vec![
                json!({ "source": "b", "timestamp": "2024-02-01" }),
                json!({ "source": "a", "timestamp": "2024-01-15" }),
                json!({ "source": "c", "timestamp": "2024-02-01" }),
                json!({ "source": "c" }),
            ],
        ));
        assert_eq!(
            histograms.category_breakdown(),
            vec![
                CategoryCount { name: "c".into(), value: 2 },
                CategoryCount { name: "a".into(), value: 1 },
                CategoryCount { name: "b".into(), value: 1 },
            ]
        );
        assert_eq!(
            histograms.time_series(),
            vec![
                DateCount { date: "2024-01-15".into(), count: 1 },
                DateCount { date: "2024-02-01".into(), count: 2 },
            ]
        );
        let total: u64 = histograms.categories().values().sum();
        assert_eq!(total as usize, histograms.records());
    }
}
