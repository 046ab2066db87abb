//! Static startup configuration (spec §6: "Configuration ... is a static
//! struct supplied at startup"). Parsed from the command line, in the
//! teacher's `argh`-based style (`node/src/cli.rs`) rather than an
//! env/file-parsing framework - this worker has no remote config service to
//! pull from.

use argh::FromArgs;

/// the creditscan ingestion worker
#[derive(Debug, FromArgs)]
pub struct Args {
    /// postgres connection string
    #[argh(option)]
    pub database_url: String,

    /// max postgres pool connections. Defaults to 10.
    #[argh(option, default = "10")]
    pub max_db_connections: u32,

    /// number of concurrent job-runner workers. Defaults to 4.
    #[argh(option, default = "4")]
    pub worker_count: usize,

    /// UTC hour (0-23) the rate scheduler fires at daily. Defaults to 6.
    #[argh(option, default = "6")]
    pub rate_fire_hour_utc: u32,

    /// UTC minute (0-59) the rate scheduler fires at daily. Defaults to 0.
    #[argh(option, default = "0")]
    pub rate_fire_minute_utc: u32,

    /// minutes a PROCESSING job can go unmodified before crash resumption
    /// considers it stale. Defaults to 30 (spec §4.4/glossary).
    #[argh(option, default = "30")]
    pub stale_processing_minutes: i64,

    /// seconds the job runner waits, across its full bounded-backoff
    /// sequence, for a just-created job to become visible to a fresh read
    /// (spec §4.3 step 1). Defaults to 1.
    #[argh(option, default = "1")]
    pub job_visibility_timeout_secs: u64,

    /// base URL of the live currency-conversion rate source (C4)
    #[argh(option)]
    pub live_rate_url: String,

    /// base URL of the daily rate-extraction HTML source (C2)
    #[argh(option)]
    pub rate_html_url: String,

    /// base URL of the statement extraction model service
    #[argh(option)]
    pub extractor_url: String,

    /// identifier of the primary extraction model (spec §4.3 step 3)
    #[argh(option, default = "String::from(\"primary\")")]
    pub extractor_primary_model: String,

    /// identifier of the fallback extraction model, tried once if the
    /// primary call fails
    #[argh(option, default = "String::from(\"fallback\")")]
    pub extractor_fallback_model: String,

    /// filesystem root the blob store reads/writes uploaded statements under
    #[argh(option)]
    pub blob_store_root: String,

    /// seconds to wait for in-flight work to finish during shutdown
    /// before giving up and reporting hung tasks.
    #[argh(option, default = "30")]
    pub shutdown_timeout_secs: u64,
}

/// The parsed, immutable configuration the worker is constructed from.
/// A thin wrapper over [`Args`] so call sites don't need to know this
/// came from a CLI - a future config source (env, file) would produce the
/// same struct.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub max_db_connections: u32,
    pub worker_count: usize,
    pub rate_fire_hour_utc: u32,
    pub rate_fire_minute_utc: u32,
    pub stale_processing_minutes: i64,
    pub job_visibility_timeout_secs: u64,
    pub live_rate_url: String,
    pub rate_html_url: String,
    pub extractor_url: String,
    pub extractor_primary_model: String,
    pub extractor_fallback_model: String,
    pub blob_store_root: String,
    pub shutdown_timeout_secs: u64,
}

impl From<Args> for WorkerConfig {
    fn from(args: Args) -> Self {
        Self {
            database_url: args.database_url,
            max_db_connections: args.max_db_connections,
            worker_count: args.worker_count,
            rate_fire_hour_utc: args.rate_fire_hour_utc,
            rate_fire_minute_utc: args.rate_fire_minute_utc,
            stale_processing_minutes: args.stale_processing_minutes,
            job_visibility_timeout_secs: args.job_visibility_timeout_secs,
            live_rate_url: args.live_rate_url,
            rate_html_url: args.rate_html_url,
            extractor_url: args.extractor_url,
            extractor_primary_model: args.extractor_primary_model,
            extractor_fallback_model: args.extractor_fallback_model,
            blob_store_root: args.blob_store_root,
            shutdown_timeout_secs: args.shutdown_timeout_secs,
        }
    }
}
