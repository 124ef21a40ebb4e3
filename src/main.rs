//! Arcade relay binary entrypoint wiring the WebSocket relay, health, docs, and optional TLS.

use std::net::SocketAddr;

use anyhow::Context;
use arcade_relay::{
    config::AppConfig,
    routes,
    services::relay_service,
    state::{AppState, SharedState},
    tls::{self, TlsListener},
};
use axum::{
    Router,
    http::{HeaderValue, Method},
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let (app_state, inbox) = AppState::new(config.clone());

    tokio::spawn(relay_service::run(app_state.clone(), inbox));
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state, &config.allowed_origins);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();

    match tls::load_acceptor(&config.tls_cert_path, &config.tls_key_path) {
        Ok(acceptor) => {
            info!(%addr, "starting server with TLS");
            let listener = TlsListener::new(listener, acceptor, config.tls_handshake_timeout)
                .context("starting TLS listener")?;
            axum::serve(listener, service)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("serving axum over TLS")?;
        }
        Err(err) => {
            warn!(
                error = %err,
                cert = %config.tls_cert_path.display(),
                key = %config.tls_key_path.display(),
                "TLS unavailable; serving plain HTTP"
            );
            info!(%addr, "starting server");
            axum::serve(listener, service)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("serving axum")?;
        }
    }

    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState, allowed_origins: &[String]) -> Router<()> {
    routes::router(state)
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}

/// Restrict cross-origin access to the configured origins.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(origin = %origin, error = %err, "ignoring invalid CORS origin");
                None
            }
        })
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
