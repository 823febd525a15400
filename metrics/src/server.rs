use crate::SharedMetrics;
use anyhow::{Error as AnyhowError, Result};
use axum::{Router, extract::State, routing::get};
use std::net::{IpAddr, SocketAddr};
use tracing::info;

#[derive(Clone, Debug)]
pub struct MetricsServerConfig {
    pub metrics_address: IpAddr,
    pub metrics_port: u16,
}

impl From<&MetricsServerConfig> for SocketAddr {
    fn from(config: &MetricsServerConfig) -> Self {
        SocketAddr::from((config.metrics_address, config.metrics_port))
    }
}

async fn prometheus_metrics_handler(State(metrics): State<SharedMetrics>) -> String {
    metrics.gather()
}

pub fn router(metrics: SharedMetrics) -> Router {
    Router::new()
        .route("/metrics", get(prometheus_metrics_handler))
        .with_state(metrics)
}

pub async fn run_metrics_server(config: MetricsServerConfig, metrics: SharedMetrics) -> Result<()> {
    let addr = SocketAddr::from(&config);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Metrics server listening");

    axum::serve(listener, router(metrics).into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(AnyhowError::new)?;

    Ok(())
}
