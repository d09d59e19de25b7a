use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{Router, extract::State, routing::get};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tracing::info;

use crate::scheduler::ScheduledJob;
use crate::visits_repo::PgPool;

/// Install the Prometheus recorder
/// Returns a handle that renders the current metrics for scraping
pub fn init_metrics() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        // Buckets: 10ms .. 10s, cycles are dominated by the feed request and two DB round trips
        .set_buckets_for_metric(
            Matcher::Full("reconcile.cycle_duration_ms".to_string()),
            &[
                10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0,
            ],
        )
        .context("Failed to set buckets for reconcile.cycle_duration_ms")?
        .install_recorder()
        .context("Failed to install Prometheus recorder")
}

/// Initialize reconciliation metrics to zero so they are exported before the first cycle
pub fn initialize_reconcile_metrics() {
    metrics::counter!("reconcile.cycles_total").absolute(0);
    metrics::counter!("reconcile.cycle_failures_total", "stage" => "fetch").absolute(0);
    metrics::counter!("reconcile.cycle_failures_total", "stage" => "classify").absolute(0);
    metrics::counter!("reconcile.visits_inserted_total").absolute(0);
    metrics::counter!("reconcile.visits_updated_total").absolute(0);
    metrics::counter!("reconcile.write_failures_total", "op" => "insert").absolute(0);
    metrics::counter!("reconcile.write_failures_total", "op" => "update").absolute(0);
    metrics::gauge!("reconcile.aircraft_in_range").set(0.0);

    metrics::gauge!("db_pool.total_connections").set(0.0);
    metrics::gauge!("db_pool.active_connections").set(0.0);
    metrics::gauge!("db_pool.idle_connections").set(0.0);
}

/// Serve `/metrics` on the given port until the process exits
pub async fn start_metrics_server(port: u16, handle: PrometheusHandle) -> Result<()> {
    let app = Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(handle);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting metrics server on http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind metrics server to {}", addr))?;

    axum::serve(listener, app)
        .await
        .context("Metrics server failed")
}

async fn render_metrics(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

/// Reports database pool state as gauges
pub struct PoolMetricsJob {
    pool: PgPool,
}

impl PoolMetricsJob {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScheduledJob for PoolMetricsJob {
    async fn run(&self) -> Result<()> {
        let state = self.pool.state();
        let active = state.connections.saturating_sub(state.idle_connections);

        metrics::gauge!("db_pool.total_connections").set(state.connections as f64);
        metrics::gauge!("db_pool.active_connections").set(active as f64);
        metrics::gauge!("db_pool.idle_connections").set(state.idle_connections as f64);
        Ok(())
    }
}
