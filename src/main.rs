//! Batch backfill entry point: wire configured clients together, run the
//! sync driver once, print the summary, exit non-zero on fatal error.

use anyhow::{bail, Context};
use tracing::{error, info};

use score_backfill::database::DatabaseConnection;
use score_backfill::{
    config::SourceMode, logging, BackfillConfig, BatchSubmitter, CheckpointSet, FailureLog,
    PointQuerySource, SearchStoreClient, StreamingCursorSource, SyncDriver, Transformer,
};

#[tokio::main]
async fn main() {
    logging::init_logging();

    if let Err(e) = run().await {
        error!(error = %e, "Backfill run aborted");
        eprintln!("score-backfill failed: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = BackfillConfig::load()?;

    let db = DatabaseConnection::connect(&config.database)
        .await
        .context("connecting to relational source")?;
    if !db.health_check().await? {
        bail!("database health check failed");
    }
    info!("Connected to relational source");

    let store = SearchStoreClient::new(config.search_store.clone())
        .context("building search store client")?;

    let transformer = Transformer::new(
        config.sync.excluded_tenant.clone(),
        config.search_store.index_prefix.clone(),
    );
    let submitter = BatchSubmitter::new(store);
    let checkpoint = CheckpointSet::load(&config.sync.checkpoint_path);
    let failure_log = FailureLog::new(&config.sync.failure_log_path);

    let summary = match config.sync.source_mode {
        SourceMode::Point => {
            let source = PointQuerySource::discover(db.pool().clone()).await?;
            SyncDriver::new(
                source,
                transformer,
                submitter,
                checkpoint,
                failure_log,
                config.sync.batch_threshold,
                config.sync.max_units,
            )
            .run()
            .await?
        }
        SourceMode::Streaming => {
            let source =
                StreamingCursorSource::new(db.pool().clone(), config.sync.fetch_batch_rows);
            SyncDriver::new(
                source,
                transformer,
                submitter,
                checkpoint,
                failure_log,
                config.sync.batch_threshold,
                config.sync.max_units,
            )
            .run()
            .await?
        }
    };

    db.close().await;

    println!("Backfill complete: {summary}");
    Ok(())
}
