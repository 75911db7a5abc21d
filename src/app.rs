use std::error::Error;
use std::time::Duration;

use clap::{Parser, error::ErrorKind};
use tracing::info;

use crate::config::{DashboardConfig, RemoteConfig, SampleBudget};
use crate::constants::fetch::{
    DEFAULT_CONFIG, DEFAULT_DATASET, DEFAULT_ROWS_ENDPOINT, DEFAULT_SOURCE_ID, DEFAULT_SPLIT,
    MAX_PAGE_LENGTH,
};
use crate::constants::server::DEFAULT_BIND;
use crate::errors::PulseError;
use crate::query::DashboardQuery;
use crate::server::{AppState, router};
use crate::source::DatasetsServerSource;

#[derive(Debug, Parser)]
#[command(
    name = "dataset-pulse",
    disable_help_subcommand = true,
    about = "Serve sampled category and daily-volume statistics for a Hugging Face dataset",
    long_about = "Sample rows from the datasets-server rows endpoint, count them by source label and by UTC day, cache the result, and serve it as JSON.",
    after_help = "Every flag can also be set through the PULSE_* environment variable shown next to it."
)]
/// CLI for the `dataset-pulse` binary.
///
/// Common usage:
/// - Serve on the default address: `dataset-pulse`
/// - Print one aggregation and exit: `dataset-pulse --once`
/// - Sample a different dataset: `dataset-pulse --dataset owner/name --split test`
struct DashboardCli {
    #[arg(long, env = "PULSE_BIND", default_value_t = DEFAULT_BIND.to_string(), help = "HTTP listen address")]
    bind: String,
    #[arg(
        long,
        env = "PULSE_ENDPOINT",
        default_value = DEFAULT_ROWS_ENDPOINT,
        help = "datasets-server rows endpoint"
    )]
    endpoint: String,
    #[arg(long, env = "PULSE_SOURCE_ID", default_value = DEFAULT_SOURCE_ID, help = "Source id used in logs and errors")]
    source_id: String,
    #[arg(long, env = "PULSE_DATASET", default_value = DEFAULT_DATASET, help = "Hugging Face dataset id")]
    dataset: String,
    #[arg(
        long = "dataset-config",
        env = "PULSE_DATASET_CONFIG",
        default_value = DEFAULT_CONFIG,
        help = "Dataset config name"
    )]
    dataset_config: String,
    #[arg(long, env = "PULSE_SPLIT", default_value = DEFAULT_SPLIT, help = "Dataset split name")]
    split: String,
    #[arg(
        long = "target-rows",
        env = "PULSE_TARGET_ROWS",
        default_value_t = 500,
        value_parser = parse_positive_usize,
        help = "Rows each sampling pass aims to read"
    )]
    target_rows: usize,
    #[arg(
        long = "batch-size",
        env = "PULSE_BATCH_SIZE",
        default_value_t = MAX_PAGE_LENGTH,
        value_parser = parse_page_length,
        help = "Rows requested per page (1-100)"
    )]
    batch_size: usize,
    #[arg(
        long = "max-batches",
        env = "PULSE_MAX_BATCHES",
        default_value_t = 10,
        value_parser = parse_positive_usize,
        help = "Upper bound on pages per sampling pass"
    )]
    max_batches: usize,
    #[arg(
        long = "fetch-timeout-secs",
        env = "PULSE_FETCH_TIMEOUT_SECS",
        default_value_t = 25,
        help = "Deadline for each page request"
    )]
    fetch_timeout_secs: u64,
    #[arg(
        long = "time-budget-secs",
        env = "PULSE_TIME_BUDGET_SECS",
        help = "Optional wall-clock bound for a sampling pass"
    )]
    time_budget_secs: Option<u64>,
    #[arg(
        long = "pause-ms",
        env = "PULSE_PAUSE_MS",
        default_value_t = 100,
        help = "Pause between page requests"
    )]
    pause_ms: u64,
    #[arg(
        long = "cache-ttl-secs",
        env = "PULSE_CACHE_TTL_SECS",
        default_value_t = 3600,
        help = "Freshness window of the cached aggregation"
    )]
    cache_ttl_secs: u64,
    #[arg(long, help = "Run one aggregation, print it as JSON, and exit")]
    once: bool,
}

impl DashboardCli {
    fn into_config(self) -> Result<DashboardConfig, PulseError> {
        let budget = SampleBudget {
            target_rows: self.target_rows,
            batch_size: self.batch_size,
            max_batches: self.max_batches,
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            time_budget: self.time_budget_secs.map(Duration::from_secs),
        };
        budget.validate()?;
        Ok(DashboardConfig {
            remote: RemoteConfig {
                source_id: self.source_id,
                endpoint: self.endpoint,
                dataset: self.dataset,
                config: self.dataset_config,
                split: self.split,
            },
            budget,
            inter_batch_pause: Duration::from_millis(self.pause_ms),
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            bind: DashboardConfig::parse_bind(&self.bind)?,
        })
    }
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed = raw
        .parse::<usize>()
        .map_err(|_| format!("Could not parse '{raw}' as a positive integer"))?;
    if parsed == 0 {
        return Err("value must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_page_length(raw: &str) -> Result<usize, String> {
    let parsed = parse_positive_usize(raw)?;
    if parsed > MAX_PAGE_LENGTH {
        return Err(format!(
            "--batch-size must be at most {MAX_PAGE_LENGTH} (remote page ceiling)"
        ));
    }
    Ok(parsed)
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

/// Parse CLI arguments (without the program name) into a configuration.
///
/// Returns `Ok(None)` when help or version output was requested.
pub fn config_from_args<I>(args_iter: I) -> Result<Option<(DashboardConfig, bool)>, Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let Some(cli) = parse_cli::<DashboardCli, _>(
        std::iter::once("dataset-pulse".to_string()).chain(args_iter),
    )?
    else {
        return Ok(None);
    };
    let once = cli.once;
    Ok(Some((cli.into_config()?, once)))
}

/// Entry point for the `dataset-pulse` binary.
pub fn run_dashboard<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let Some((config, once)) = config_from_args(args_iter)? else {
        return Ok(());
    };

    let source = DatasetsServerSource::new(config.remote.clone());
    let query = DashboardQuery::from_config(source, &config);

    if once {
        let response = query.handle()?;
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(config.bind).await?;
        info!(
            "[pulse:server] serving dataset='{}' split='{}' on http://{}",
            config.remote.dataset,
            config.remote.split,
            listener.local_addr()?
        );
        axum::serve(listener, router(AppState::new(query)))
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;
        Ok::<(), Box<dyn Error>>(())
    })
}
