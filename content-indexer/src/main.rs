//! Content Indexer Main Entry Point
//!
//! Connects to the search engine, provisions the configured partition
//! indexes, reports whether they are in sync and runs the job worker.

use dotenv::dotenv;
use content_indexer::diagnostics::forward_events;
use content_indexer::{Dependencies, IndexingError};
use std::env;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("content_indexer=info,content_index_repository=info"));

    let json = env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .init();

        info!(
            service_name = "content-indexer",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with JSON format"
        );
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .init();

        info!(
            service_name = "content-indexer",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with console output"
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), IndexingError> {
    dotenv().ok();

    init_tracing();

    info!("Starting content indexer");

    let deps = match Dependencies::new().await {
        Ok(deps) => {
            info!("Dependencies initialized successfully");
            deps
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return Err(e);
        }
    };

    let pipeline = &deps.pipeline;
    tokio::spawn(forward_events(pipeline.diagnostics.subscribe(), |event| {
        warn!(event = ?event, "Operator action required");
    }));

    for partition in pipeline
        .repository
        .partitions()
        .await
        .map_err(content_indexer::IndexManagementError::from)?
    {
        if let Err(e) = pipeline
            .index_manager
            .ensure_partition_index(partition.site_id)
            .await
        {
            error!(site_id = partition.site_id, error = %e, "Failed to provision partition index");
            return Err(e.into());
        }
    }
    info!(in_sync = pipeline.drift.is_in_sync().await, "Partition indexes ready");

    let summary = deps.worker.run().await;
    info!(
        indexed = summary.indexed,
        failed = summary.failed,
        "Content indexer stopped"
    );
    Ok(())
}
