//! logvigil -- Multi-tenant security log ingestion and anomaly alerting.
//!
//! This crate provides the core library for the ingestion pipeline: tenant
//! resolution, durable event storage, external anomaly scoring, anomaly
//! materialization, and real-time alert publishing.

pub mod alerts;
pub mod api;
pub mod config;
pub mod ingest;
pub mod scoring;
pub mod storage;
pub mod tenant;

use std::sync::Arc;

use anyhow::Result;

use crate::config::VigilConfig;

/// Start the logvigil daemon: storage, pipeline, and API server.
pub async fn serve(config: VigilConfig) -> Result<()> {
    // 1. Initialize Storage
    tracing::info!(db_path = %config.storage.db_path, "Initializing database");
    let pool = storage::open_pool(&config.storage.db_path)?;

    // 2. Shared alert stream and scoring client
    let alerts = alerts::AlertBus::with_capacity(config.alerts.channel_capacity);
    let scorer = scoring::http::HttpScoreClient::new(&config.scoring)?;

    // 3. Wire the ingestion pipeline
    let tenants = Arc::new(tenant::SqliteTenantDirectory::new(pool.clone()));
    let events = Arc::new(storage::SqliteEventStore::new(pool.clone()));
    let anomalies = Arc::new(storage::SqliteAnomalyStore::new(pool));

    let pipeline = ingest::IngestPipeline::new(
        tenants.clone(),
        events,
        Arc::new(scorer),
        anomalies.clone(),
        Arc::new(alerts.clone()),
        config.scoring.anomaly_threshold,
    );

    let state = api::state::AppState {
        pipeline: Arc::new(pipeline),
        tenants,
        anomalies,
        alerts,
    };

    // 4. Start API Server
    let addr: std::net::SocketAddr = config.server.bind_address.parse()?;
    let app = api::router(state);

    tracing::info!(%addr, scorer = %config.scoring.base_url, "logvigil listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
