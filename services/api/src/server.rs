use crate::cli::ServeArgs;
use crate::infra::{AppState, OfficeNotifier};
use crate::routes::with_service_routes;
use admissions::config::AppConfig;
use admissions::error::AppError;
use admissions::telemetry;
use admissions::workflows::applications::{
    AdmissionsServices, InMemoryAdmissionsRepository, LocalObjectStore,
};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

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

    let store = Arc::new(
        LocalObjectStore::new(&config.storage.root, config.storage.public_base_url.clone())
            .await?,
    );
    let notifier = Arc::new(OfficeNotifier::from_config(&config.notify)?);
    if config.admin_token.is_none() {
        warn!("ADMIN_API_TOKEN is not set; admin routes will reject every request");
    }

    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        store: Arc::clone(&store),
    };

    let services = Arc::new(AdmissionsServices::new(
        Arc::new(InMemoryAdmissionsRepository::seeded()),
        store,
        notifier,
        config.workflow_settings(),
        config.admin_token.clone(),
    ));

    let app = with_service_routes(services)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        academic_year = %config.admissions.academic_year,
        "admissions service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
