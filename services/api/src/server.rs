use crate::cli::ServeArgs;
use crate::infra::{memory_hub, AppState};
use crate::routes::with_volunteer_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use volunteer_hub::config::AppConfig;
use volunteer_hub::error::AppError;
use volunteer_hub::telemetry;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let hub = memory_hub();
    let shutdown = CancellationToken::new();
    let sweeper = hub
        .sweeper(config.sweeper.interval)
        .spawn(shutdown.clone());

    let app = with_volunteer_routes(hub)
        .layer(Extension(app_state))
        .layer(prometheus_layer);
    readiness_flag.store(true, Ordering::Release);

    info!(
        environment = config.environment.label(),
        %addr,
        sweep_interval_secs = config.sweeper.interval.as_secs(),
        "volunteer hub ready"
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await;

    readiness_flag.store(false, Ordering::Release);
    shutdown.cancel();
    if let Err(err) = sweeper.await {
        warn!(error = %err, "expiration sweeper ended abnormally");
    }
    served?;
    Ok(())
}

/// Resolves on ctrl-c or once `shutdown` is cancelled elsewhere, cancelling it either way.
pub(crate) async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("shutdown signal received"),
            Err(err) => {
                error!(error = %err, "unable to listen for ctrl-c");
                shutdown.cancelled().await;
            }
        },
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}
