pub mod api;
pub mod audit;
pub mod config;
pub mod db;
mod log_audit;
pub mod models;
pub mod pipeline;

use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::IntakeConfig;
use crate::db::{DatabaseError, SharedDatabase};
use crate::pipeline::extraction::{default_ocr_engine, ExtractionDispatcher};
use crate::pipeline::processor::IngestionPipeline;
use crate::pipeline::security::{ClamdScanner, MalwareScanner, NullScanner};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Cannot prepare data directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot open database: {0}")]
    Database(#[from] DatabaseError),
}

/// Assemble the pipeline described by `config`: open the database, create
/// the uploads area, and pick the scanner and OCR engine.
pub fn build_pipeline(config: &IntakeConfig) -> Result<IngestionPipeline, StartupError> {
    std::fs::create_dir_all(config.uploads_dir())?;
    let db = Arc::new(SharedDatabase::open(&config.database_path())?);

    let scanner: Arc<dyn MalwareScanner> = match &config.clamd_addr {
        Some(addr) => Arc::new(ClamdScanner::new(addr.clone(), config.scan_timeout)),
        None => {
            tracing::warn!("No clamd address configured, uploads will not be scanned");
            Arc::new(NullScanner)
        }
    };
    let ocr = default_ocr_engine(config.tessdata_dir.as_deref());

    Ok(IngestionPipeline::new(db, config.uploads_dir())
        .with_scanner(scanner)
        .with_dispatcher(ExtractionDispatcher::with_ocr(ocr))
        .with_limits(config.limits()))
}

/// Binary entry point: logging, configuration, then serve until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = IntakeConfig::from_env();
    tracing::info!(
        data_dir = %config.data_dir.display(),
        bind_addr = %config.bind_addr,
        "Configuration loaded"
    );

    let pipeline = Arc::new(build_pipeline(&config)?);
    let mut server = api::start_server(pipeline, config.bind_addr).await?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Cannot listen for shutdown signal");
    }
    server.shutdown();
    server.wait().await;
    Ok(())
}
