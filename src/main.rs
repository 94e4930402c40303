use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use feedrouter::api::rest::{create_router, ApiState};
use feedrouter::config::loader::AppConfig;
use feedrouter::feed::adapter::ProviderAdapter;
use feedrouter::observability::metrics::register_metrics;
use feedrouter::router::engine::RouterEngine;
use feedrouter::utils::task_supervisor::TaskSupervisor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let env = std::env::var("FEEDROUTER_ENV").unwrap_or_else(|_| "default".to_string());
    let config = AppConfig::load(&env).context("loading configuration")?;
    register_metrics();

    let engine = Arc::new(RouterEngine::new(&config));
    let mut supervisor = TaskSupervisor::new();

    supervisor.spawn(
        "health_sweeper",
        engine.clone().run_sweeper(supervisor.shutdown_signal()),
    );
    supervisor.spawn(
        "broadcast_flush",
        engine.throttler().run(supervisor.shutdown_signal()),
    );
    for provider in config.enabled_providers() {
        let adapter = ProviderAdapter::from_config(
            provider,
            engine.clone(),
            config.backoff.clone(),
            supervisor.shutdown_signal(),
        );
        supervisor.spawn(format!("adapter_{}", provider.provider_id), adapter.run());
    }

    let state = Arc::new(ApiState {
        engine: engine.clone(),
    });
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.server.bind_addr))?;
    tracing::info!(addr = %config.server.bind_addr, "feed router listening");

    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("shutdown signal received");
            })
            .await
    });

    let mut task_check = tokio::time::interval(Duration::from_secs(30));
    loop {
        tokio::select! {
            result = &mut server => {
                result.context("server task panicked")??;
                break;
            }
            _ = task_check.tick() => {
                if let Err(e) = supervisor.check_health() {
                    tracing::error!(error = %e, "background task failure detected");
                }
            }
        }
    }

    supervisor.shutdown_all(Duration::from_secs(5)).await;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("FEEDROUTER_LOG_JSON").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
