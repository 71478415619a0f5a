use crate::cli::ServeArgs;
use crate::infra::{sample_requirements, AppState, InMemoryGateway};
use crate::routes::with_pipeline_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use hiring_pipeline::config::AppConfig;
use hiring_pipeline::error::AppError;
use hiring_pipeline::pipeline::{PipelineStore, TransitionController};
use hiring_pipeline::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(secs) = args.fresh_secs.take() {
        config.store.fresh_for = Duration::from_secs(secs);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let gateway = if args.seed {
        InMemoryGateway::seeded(sample_requirements(Utc::now()))
    } else {
        InMemoryGateway::default()
    };
    let store = PipelineStore::new(Arc::new(gateway), config.store.clone());
    let controller = Arc::new(TransitionController::new(store));

    let app = with_pipeline_routes(controller)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        fresh_secs = config.store.fresh_for.as_secs(),
        "hiring pipeline service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
