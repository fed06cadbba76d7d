mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{Method, header::CONTENT_TYPE};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

use atelier_db::{Database, Schema};
use atelier_services::config::Settings;
use atelier_services::push::HttpPushService;

use crate::routes::AppStateInner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atelier_server=debug,atelier_services=debug,tower_http=debug".into()),
        )
        .init();

    let settings = Settings::from_env()?;
    let push_endpoint = match settings.require_push_endpoint() {
        Ok(endpoint) => endpoint.to_string(),
        Err(e) => {
            eprintln!("FATAL: {}", e);
            eprintln!("       Notifications cannot be delivered without a push gateway.");
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    let db = Arc::new(Database::open(&settings.db_path)?);
    let push = Arc::new(HttpPushService::new(push_endpoint, settings.push_api_key.clone()));

    let state = Arc::new(AppStateInner {
        db,
        schema: Schema::new(settings.data_root.clone()),
        push,
    });

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    let app = routes::router(state).layer(cors);

    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port).parse()?;
    info!("Atelier server listening on {}", addr);
    info!("Serving data root {}", settings.data_root);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
