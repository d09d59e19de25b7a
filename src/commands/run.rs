use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, error, info, warn};

use skylog::config::{Config, DatabaseArgs, ReconcileArgs};
use skylog::db;
use skylog::instance_lock::InstanceLock;
use skylog::metrics::{PoolMetricsJob, init_metrics, initialize_reconcile_metrics, start_metrics_server};
use skylog::readsb::ReadsbClient;
use skylog::reconciliation::Reconciler;
use skylog::scheduler::{Scheduler, Trigger};
use skylog::spatial_filter::SpatialFilter;
use skylog::visits_repo::VisitsRepository;

mod shutdown;

const RECONCILE_TRIGGER: &str = "reconcile-visits";
const POOL_METRICS_TRIGGER: &str = "pool-metrics";
const POOL_METRICS_INTERVAL: Duration = Duration::from_secs(10);

#[tracing::instrument(skip_all)]
pub async fn handle_run(database: DatabaseArgs, reconcile: ReconcileArgs) -> Result<()> {
    let config = Config::try_from(reconcile).context("Invalid configuration")?;

    let _instance_lock = InstanceLock::acquire("skylog-run")?;

    info!(
        "Observer at ({:.4}, {:.4}), radius {}km, staleness window {:?}, polling {} every {:?}",
        config.observer.latitude,
        config.observer.longitude,
        config.radius_km,
        config.staleness_window.duration(),
        config.feed_url,
        config.poll_interval
    );

    let pool = db::create_pool(
        &database.database_url,
        database.db_pool_size,
        config.store_timeout,
        Some(db::StatementTimeout(config.store_timeout)),
    )?;
    let applied = db::run_migrations(&pool).await?;
    info!("Database migrations complete ({} applied)", applied);

    let repository = VisitsRepository::new(pool.clone(), config.store_timeout);
    let now_epoch = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
    match repository
        .count_open_visits(now_epoch, config.staleness_window.duration().as_secs_f64())
        .await
    {
        Ok(open) => info!("{} aircraft have an open visit", open),
        Err(e) => warn!("Failed to count open visits: {}", e),
    }

    // Initialize metrics before the server starts so the first scrape sees them
    if let Some(port) = config.metrics_port {
        let handle = init_metrics()?;
        initialize_reconcile_metrics();
        tokio::spawn(
            async move {
                if let Err(e) = start_metrics_server(port, handle).await {
                    error!("{:#}", e);
                }
            }
            .instrument(tracing::info_span!("metrics_server")),
        );
    }

    let client = ReadsbClient::new(config.feed_url.clone(), config.fetch_timeout)
        .context("Failed to build feed client")?;
    let reconciler = Reconciler::new(
        Arc::new(client),
        Arc::new(repository),
        SpatialFilter::new(config.observer, config.radius_km),
        config.staleness_window,
    );

    let mut scheduler = Scheduler::new();
    scheduler
        .add_trigger(Trigger::new(
            RECONCILE_TRIGGER,
            config.poll_interval,
            Arc::new(reconciler),
        ))
        .add_trigger(Trigger::new(
            POOL_METRICS_TRIGGER,
            POOL_METRICS_INTERVAL,
            Arc::new(PoolMetricsJob::new(pool)),
        ));

    shutdown::spawn_shutdown_handler(scheduler.cancellation_token());
    scheduler.run().await;

    info!("Shutdown complete");
    Ok(())
}
