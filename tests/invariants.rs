use std::time::Duration;

use serde_json::json;

use dataset_pulse::{
    AdaptiveSampler, Batch, Histograms, InMemorySource, Record, SampleBudget, ScriptedReply,
    ScriptedSource, Termination,
};

fn build_record(idx: usize) -> Record {
    let source = ["web", "api", "cli"][idx % 3];
    Record::from_value(json!({
        "source": source,
        "timestamp": format!("2024-03-{:02}T12:00:00Z", 1 + idx % 5),
    }))
}

fn build_batches(count: usize, per_batch: usize) -> Vec<Batch> {
    (0..count)
        .map(|batch_idx| {
            let offset = batch_idx * per_batch;
            Batch::new(offset, (offset..offset + per_batch).map(build_record).collect())
        })
        .collect()
}

#[test]
fn page_requests_never_exceed_remote_ceiling() {
    let records: Vec<Record> = (0..1_000).map(build_record).collect();
    let sampler = AdaptiveSampler::new(InMemorySource::new("memory", records))
        .with_pause(Duration::ZERO);
    for target in [1, 99, 100, 101, 250, 999] {
        let budget = SampleBudget::for_target(target);
        let mut sizes = Vec::new();
        let report = sampler
            .sample(&budget, |batch| sizes.push(batch.len()))
            .unwrap();
        assert!(sizes.iter().all(|size| (1..=100).contains(size)));
        assert_eq!(report.rows_processed, target);
        assert_eq!(report.termination, Termination::TargetReached);
    }
}

#[test]
fn scripted_requests_stay_within_ceiling_under_default_budget() {
    let source = ScriptedSource::repeating(
        "scripted",
        ScriptedReply::Rows((0..150).map(|idx| json!({ "source": idx })).collect()),
    );
    let sampler = AdaptiveSampler::new(source).with_pause(Duration::ZERO);
    let report = sampler.sample(&SampleBudget::default(), |_| {}).unwrap();
    assert_eq!(report.rows_processed, 500);
    assert_eq!(report.batches, 5);
    assert!(
        sampler
            .source()
            .requests()
            .iter()
            .all(|request| request.length <= 100)
    );
}

#[test]
fn fold_is_independent_of_batch_order() {
    let batches = build_batches(6, 7);
    let forward = batches.iter().fold(Histograms::new(), Histograms::fold);
    let backward = batches.iter().rev().fold(Histograms::new(), Histograms::fold);
    let mut interleaved = Histograms::new();
    for idx in [3, 0, 5, 1, 4, 2] {
        interleaved.fold_batch(&batches[idx]);
    }
    assert_eq!(forward, backward);
    assert_eq!(forward, interleaved);
    assert_eq!(forward.category_breakdown(), backward.category_breakdown());
    assert_eq!(forward.time_series(), interleaved.time_series());
}

#[test]
fn merged_partial_folds_equal_single_fold() {
    let batches = build_batches(4, 10);
    let whole = batches.iter().fold(Histograms::new(), Histograms::fold);
    let left = batches[..2].iter().fold(Histograms::new(), Histograms::fold);
    let right = batches[2..].iter().fold(Histograms::new(), Histograms::fold);
    let mut merged = right.clone();
    merged.merge(&left);
    assert_eq!(merged, whole);
    assert_eq!(whole.records(), 40);
}

#[test]
fn histogram_totals_match_rows_processed() {
    let records: Vec<Record> = (0..237).map(build_record).collect();
    let sampler = AdaptiveSampler::new(InMemorySource::new("memory", records))
        .with_pause(Duration::ZERO);
    let collected = sampler
        .collect(&SampleBudget::default(), Histograms::new, Histograms::fold_batch)
        .unwrap();
    assert_eq!(collected.report.termination, Termination::EndOfData);
    assert_eq!(collected.report.rows_processed, 237);
    let category_total: u64 = collected.state.categories().values().sum();
    let date_total: u64 = collected
        .state
        .time_series()
        .iter()
        .map(|point| point.count)
        .sum();
    assert_eq!(category_total, 237);
    assert_eq!(date_total, 237);
}

#[test]
fn downsized_budget_never_grows() {
    for target in [1, 2, 3, 50, 100, 101, 500, 10_000] {
        let budget = SampleBudget::for_target(target);
        let smaller = budget.downsized();
        assert!(smaller.target_rows <= budget.target_rows);
        assert!(smaller.target_rows >= 1);
        assert!(smaller.batch_size <= budget.batch_size);
        assert!(smaller.max_batches <= budget.max_batches);
        assert!(smaller.validate().is_ok());
    }
}
