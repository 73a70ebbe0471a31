use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::debug;

use alertlog::config::RunConfig;
use alertlog::orchestrator::BatchOrchestrator;
use alertlog::storage::JsonlStore;

/// Correlate paired lifecycle events and raise duration alerts
#[derive(Parser)]
#[command(name = "alertlog")]
#[command(about = "Correlates STARTED/FINISHED event pairs from a JSONL log and flags slow pairs", long_about = None)]
struct Cli {
    /// Input file: one JSON event per line
    file: PathBuf,

    /// Raw lines per dispatched batch
    #[arg(long, default_value_t = 100_000)]
    batch_size: u64,

    /// Number of deferral buckets for unmatched records
    #[arg(long, default_value_t = 10)]
    buckets: u32,

    /// Alert when a pair's duration strictly exceeds this many milliseconds
    #[arg(long, default_value_t = 4)]
    threshold: i64,

    /// Parallel batch workers
    #[arg(long, default_value_t = 2)]
    threads: usize,

    /// Cap on raw lines consumed (non-positive means unbounded)
    #[arg(long, default_value_t = 0)]
    max_length: i64,

    /// Directory for deferred-record and alert storage
    #[arg(long, default_value = "alertlog-data")]
    storage_dir: PathBuf,

    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .init();

    debug!("Running with args: {:?}", std::env::args().collect::<Vec<_>>());

    let config = RunConfig::new(cli.file)
        .with_batch_size(cli.batch_size)
        .with_buckets(cli.buckets)
        .with_threshold(cli.threshold)
        .with_thread_pool(cli.threads)
        .with_max_length(cli.max_length);

    let store = Arc::new(JsonlStore::new(cli.storage_dir, config.num_buckets)?);

    // Partial data loss inside the run only surfaces through logs; the exit
    // status distinguishes nothing short of an unreadable input file.
    BatchOrchestrator::new(config, store).run().await?;
    Ok(())
}
