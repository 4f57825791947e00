use crate::cli::ServeArgs;
use crate::demo::seed_directory;
use crate::infra::{
    AppState, FlatTravelScore, HaversineVerifier, InMemoryCareDirectory, InMemoryVisitRepository,
};
use crate::routes::with_scheduling_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use careflow::config::AppConfig;
use careflow::error::AppError;
use careflow::scheduling::VisitScheduler;
use careflow::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repository = Arc::new(InMemoryVisitRepository::default());
    let directory = Arc::new(InMemoryCareDirectory::default());
    seed_directory(&directory);
    let verifier = Arc::new(HaversineVerifier::new(config.evv.service_radius_meters));
    let scheduler = Arc::new(VisitScheduler::new(
        repository,
        directory,
        verifier,
        Arc::new(FlatTravelScore),
    ));

    let app = with_scheduling_routes(scheduler)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "visit scheduling service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
