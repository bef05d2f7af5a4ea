use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::info;
use warp::Filter;

use sfu::call_service::CallService;
use sfu::chat::ChatHub;
use sfu::coordinator::SfuCoordinator;
use sfu::metrics::register_metrics;
use sfu::transport::{self, ConnectionRegistry};

mod config;
mod logging;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::validate_env().unwrap_or_else(|e| {
        eprintln!("Environment validation failed: {}", e);
        std::process::exit(1);
    });

    logging::init(&cfg.rust_log);
    register_metrics();

    let coordinator = SfuCoordinator::new();
    let connections = Arc::new(ConnectionRegistry::new());
    let chat_hub = Arc::new(ChatHub::new());
    let call_service = Arc::new(CallService::new(coordinator.clone()));

    {
        let connections = connections.clone();
        coordinator
            .set_signal_callback(move |_session_id, participant_id, signal| {
                connections.send_signal(&participant_id, signal);
            })
            .await;
    }

    let metrics_route = warp::path("metrics").and(warp::get()).map(|| {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = vec![];
        let metric_families = prometheus::gather();
        encoder.encode(&metric_families, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    });

    let metrics_port = cfg.metrics_port;
    let metrics_handle = tokio::spawn(async move {
        info!("Metrics server listening on 0.0.0.0:{}", metrics_port);
        warp::serve(metrics_route.or(sfu::health::route()))
            .run(([0, 0, 0, 0], metrics_port))
            .await;
    });

    let ws_routes = transport::routes(call_service, chat_hub, connections);
    let addr: std::net::SocketAddr = format!("0.0.0.0:{}", cfg.port).parse()?;
    info!("SFU server listening on {}", addr);

    let (_, server) = warp::serve(ws_routes).bind_with_graceful_shutdown(addr, async {
        signal::ctrl_c().await.expect("failed to install CTRL+C signal handler");
        info!("received shutdown signal (SIGINT/SIGTERM)");
    });
    let server_handle = tokio::spawn(server);

    server_handle.await?;

    info!("shutting down SFU - closing active peer connections...");
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, coordinator.shutdown())
        .await
        .is_err()
    {
        tracing::warn!("graceful shutdown timed out after {:?}", SHUTDOWN_TIMEOUT);
    }
    info!("SFU shutdown complete");

    metrics_handle.abort();
    Ok(())
}
