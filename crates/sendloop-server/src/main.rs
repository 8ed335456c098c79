//! Sendloop - Bulk email dispatch server entry point

use anyhow::Result;
use sendloop_api::AppState;
use sendloop_common::config::{Config, LoggingConfig};
use sendloop_core::{
    CampaignManager, DispatchRegistry, JobManager, Mailer, ProgressWatcher, RecipientIngestor,
    SmtpMailer, TemplateRenderer,
};
use sendloop_storage::db::DatabasePool;
use sendloop_storage::JobStatus;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first, logging setup reads from it
    let config = Config::load()?;

    // Initialize logging
    init_logging(&config.logging);

    info!("Starting Sendloop server...");

    // Initialize database
    let db_pool = DatabasePool::new(&config.database).await?;
    info!("Database connection established");

    // Run migrations
    db_pool.migrate().await?;
    info!("Database migrations completed");

    // Initialize outbound SMTP transport
    let mailer: Arc<dyn Mailer> = Arc::new(SmtpMailer::new(&config.smtp, &config.sender)?);
    info!("SMTP transport configured for {}", config.smtp.host);

    // Initialize core managers
    let jobs = Arc::new(JobManager::new(db_pool.clone(), mailer.clone(), &config));
    let campaigns = Arc::new(CampaignManager::new(db_pool.clone(), mailer.clone(), &config));
    let registry = DispatchRegistry::new(jobs.clone(), config.dispatch.auto_drive);
    let watcher = Arc::new(ProgressWatcher::new(
        jobs.clone(),
        config.dispatch.progress_poll_interval_ms,
    ));
    let ingestor = Arc::new(RecipientIngestor::new(
        config.limits.max_rows,
        config.limits.max_csv_bytes,
    ));
    let renderer = Arc::new(TemplateRenderer::new(
        config.sender.unsubscribe_base_url.clone(),
    ));

    if config.api.api_key_sha256.is_none() {
        warn!("No API key digest configured; all API requests are accepted unauthenticated");
    }

    // Pick up a job that was mid-dispatch when the server last stopped
    resume_active_job(&jobs, &registry, &watcher).await;

    let state = Arc::new(AppState {
        db_pool: db_pool.clone(),
        jobs,
        campaigns,
        registry: registry.clone(),
        watcher,
        ingestor,
        renderer,
        api_key_sha256: config.api.api_key_sha256.clone(),
        max_recipient_lists: config.limits.max_recipient_lists,
    });

    // Start API server
    let app = sendloop_api::create_router(state, &config.api);
    let bind = format!("{}:{}", config.server.bind_address, config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("Starting API server on {}", bind);

    let api_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    info!("Sendloop server started successfully");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    // Cleanup
    api_handle.abort();
    registry.shutdown().await;

    info!("Sendloop server shutdown complete");

    Ok(())
}

/// Restart dispatch for a job left in processing state by an earlier run
async fn resume_active_job(
    jobs: &Arc<JobManager>,
    registry: &DispatchRegistry,
    watcher: &Arc<ProgressWatcher>,
) {
    match jobs.job_overview().await {
        Ok((_, Some(active))) if active.status_enum() == Some(JobStatus::Processing) => {
            info!("Resuming dispatch for job {}", active.id);
            registry.start(active.id).await;
            if let Err(e) = watcher.monitor(active.id).await {
                warn!("Progress monitor for job {} failed to start: {}", active.id, e);
            }
        }
        Ok(_) => {}
        Err(e) => warn!("Could not check for an interrupted job: {}", e),
    }
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},sendloop=debug", config.level)));

    if config.format == "json" {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(filter)
            .init();
    }
}
