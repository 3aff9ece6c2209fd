//! Hearing Herald API server binary entrypoint.

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use herald_common::config::AppConfig;
use herald_notifier::{WebDriverConfig, WebDriverConnector};

use herald_api::routes::create_router;
use herald_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (also reads .env, which may set RUST_LOG)
    let config = AppConfig::from_env()?;

    // Initialize tracing; the guard flushes the log file on exit
    let _log_guard = init_tracing(&config)?;

    tracing::info!("Starting Hearing Herald API server...");

    // Automation channel: one browser session per dispatch run
    let connector = WebDriverConnector::new(WebDriverConfig::from_app_config(&config));
    tracing::info!(webdriver_url = %config.webdriver_url, "WebDriver connector configured");

    // Build application state and seed default templates/settings
    let state = AppState::new(config.clone(), Arc::new(connector));
    state.prepare().await?;
    let dispatcher = Arc::clone(&state.dispatcher);

    // Build router
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("API server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Received shutdown signal, stopping gracefully..."),
                Err(e) => {
                    tracing::error!(error = %e, "Cannot listen for shutdown signal");
                    std::future::pending::<()>().await;
                }
            }
        })
        .await?;

    if dispatcher.tracker().is_running() {
        tracing::warn!(
            progress = dispatcher.status().progress,
            "Shutting down with a dispatch run in progress; it will not resume"
        );
    }

    tracing::info!("Hearing Herald API server stopped.");
    Ok(())
}

/// Log to stdout and to `herald.log` in the configured log directory.
fn init_tracing(config: &AppConfig) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(&config.log_dir)?;
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix("herald")
        .filename_suffix("log")
        .build(&config.log_dir)?;
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("herald_api=debug,herald_engine=debug,herald_notifier=debug,tower_http=debug")
    });
    let registry = tracing_subscriber::registry().with(filter).with(
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_writer),
    );

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    Ok(guard)
}
