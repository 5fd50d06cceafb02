//! MDT Ingest - CIP case ingestion

use anyhow::{Context, Result};
use clap::Parser;
use mdt_common::logging::{init_logging, LogConfig, LogLevel};
use mdt_ingest::annotation::CellBaseClient;
use mdt_ingest::cli::Cli;
use mdt_ingest::config::IngestConfig;
use mdt_ingest::demographics::LabKeyClient;
use mdt_ingest::orchestrator::BatchOrchestrator;
use mdt_ingest::panels::PanelAppClient;
use mdt_ingest::source::{CaseSource, CipClient, LocalCaseSource};
use mdt_ingest::store::{MemoryStore, PgStore, Store};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("mdt-ingest")
        .filter_directives("sqlx=warn,hyper=warn,reqwest=info")
        .build();

    // Environment variables take precedence over the flags
    let log_config = log_config.merge_env()?;
    let _guard = init_logging(&log_config)?;

    let config = IngestConfig::from_env().context("Invalid configuration")?;

    let source: Arc<dyn CaseSource> = match &cli.case_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "Reading cases from directory");
            Arc::new(LocalCaseSource::new(dir))
        },
        None => {
            config.validate_remote_source()?;
            Arc::new(CipClient::new(&config.cip, &config.http)?)
        },
    };

    let store: Arc<dyn Store> = if cli.memory_store {
        info!("Using in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        let store = PgStore::connect(&config.database)
            .await
            .context("Failed to connect to database")?;
        if cli.migrate {
            store.migrate().await.context("Failed to run migrations")?;
        }
        Arc::new(store)
    };

    let mut orchestrator = BatchOrchestrator::new(
        source,
        store,
        Arc::new(CellBaseClient::new(&config.cellbase, &config.http)?),
        Arc::new(PanelAppClient::new(&config.panelapp, &config.http)?),
        config.pipeline.clone(),
    );

    match &config.labkey {
        Some(labkey) if !cli.skip_demographics => {
            orchestrator = orchestrator.with_demographics(Arc::new(LabKeyClient::new(labkey, &config.http)?));
        },
        None if !cli.skip_demographics => {
            warn!("LABKEY_URL not set, demographics will use placeholder values");
        },
        _ => {},
    }

    let summary = orchestrator.run(&cli.run_options()).await?;
    info!("\n{}", summary);
    Ok(())
}
