/// Constants used by remote row fetching.
pub mod fetch {
    use std::time::Duration;

    /// Hard page-size ceiling enforced by the datasets-server `/rows` endpoint.
    pub const MAX_PAGE_LENGTH: usize = 100;
    /// Deadline applied to a single page request.
    pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(25);
    /// Status the remote source uses for an offset past the end of the split.
    pub const END_OF_DATA_STATUS: u16 = 422;
    /// Status the remote source uses when throttling callers.
    pub const RATE_LIMITED_STATUS: u16 = 429;
    /// Maximum number of body characters carried in a remote status error.
    pub const ERROR_BODY_PREVIEW_CHARS: usize = 512;
    /// Default datasets-server rows endpoint.
    pub const DEFAULT_ROWS_ENDPOINT: &str = "https://datasets-server.huggingface.co/rows";
    /// Default dataset id.
    pub const DEFAULT_DATASET: &str = "shachardon/ShareLM";
    /// Default dataset config name.
    pub const DEFAULT_CONFIG: &str = "default";
    /// Default split name.
    pub const DEFAULT_SPLIT: &str = "train";
    /// Default source id used in logs and errors.
    pub const DEFAULT_SOURCE_ID: &str = "sharelm";
}

/// Constants used by the adaptive sampler.
pub mod sampler {
    use std::time::Duration;

    /// Default number of rows a sampling pass aims to read.
    pub const DEFAULT_TARGET_ROWS: usize = 500;
    /// Default upper bound on pages per sampling pass.
    pub const DEFAULT_MAX_BATCHES: usize = 10;
    /// Pause between consecutive page requests to stay under remote rate limits.
    pub const DEFAULT_INTER_BATCH_PAUSE: Duration = Duration::from_millis(100);
    /// Divisor applied to the target row count on a downsized retry.
    pub const DOWNSIZE_DIVISOR: usize = 2;
    /// Sampling passes attempted before an interruption becomes fatal.
    pub const MAX_SAMPLING_PASSES: usize = 2;
}

/// Constants used by record aggregation.
pub mod aggregate {
    /// Record field holding the category label.
    pub const CATEGORY_FIELD: &str = "source";
    /// Record field holding the timestamp.
    pub const TIMESTAMP_FIELD: &str = "timestamp";
    /// Category used when the label is absent or empty.
    pub const UNKNOWN_CATEGORY: &str = "unknown";
    /// Wrapper field the datasets-server uses around each row.
    pub const ROW_WRAPPER_FIELD: &str = "row";
    /// Epoch values at or above this are read as milliseconds.
    pub const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;
    /// Output format for date histogram keys.
    pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";
}

/// Constants used by the result cache.
pub mod cache {
    use std::time::Duration;

    /// Freshness window of a cached aggregation.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);
}

/// Constants used by the HTTP surface.
pub mod server {
    use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

    /// Default listen address.
    pub const DEFAULT_BIND: SocketAddr =
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 8080));
    /// Route serving the aggregated statistics.
    pub const STATS_ROUTE: &str = "/api/stats";
    /// Liveness route.
    pub const HEALTH_ROUTE: &str = "/health";
    /// Headline used in error bodies for upstream failures.
    pub const UPSTREAM_ERROR: &str = "Failed to fetch dataset sample";
    /// Headline used in error bodies for local failures.
    pub const INTERNAL_ERROR: &str = "Failed to compute dataset statistics";
}
