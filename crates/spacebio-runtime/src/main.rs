//! Batch ingestion entry point.
//!
//! Usage: `spacebio [ID_LIST_FILE] [BATCH_SIZE]`
//!
//! The identifier file defaults to `pmc_ids.json`, the batch size to 10.
//! Interrupting a run is safe: identifiers left in `processing` state are
//! picked up again on the next invocation.

use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use spacebio_common::text::format_duration;
use spacebio_common::Config;
use spacebio_runtime::{load_id_list, Services};

const DEFAULT_ID_LIST: &str = "pmc_ids.json";
const DEFAULT_BATCH_SIZE: usize = 10;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if let Err(err) = run().await {
        error!(error = %err, "run aborted");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let id_list = PathBuf::from(args.next().unwrap_or_else(|| DEFAULT_ID_LIST.to_string()));
    let batch_size = match args.next() {
        Some(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("batch size must be a positive integer, got {raw}"))?,
        None => DEFAULT_BATCH_SIZE,
    };

    let cfg = Config::from_env()?;
    let ids = load_id_list(&id_list)?;
    info!(
        ids = ids.len(),
        batch_size,
        file = %id_list.display(),
        "starting batch run"
    );

    let services = Services::init(&cfg).await?;

    let outcome = tokio::select! {
        result = services.scheduler().run(&ids, batch_size) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    services.close().await;

    match outcome {
        Some(result) => {
            let stats = result?;
            info!(
                total = stats.total,
                success = stats.success,
                errors = stats.errors,
                skipped = stats.skipped,
                duration = %format_duration(stats.duration.as_secs_f64()),
                "run complete"
            );
        }
        None => warn!("interrupted, unfinished identifiers will be retried next run"),
    }
    Ok(())
}
