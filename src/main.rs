use anyhow::Context;
use restyle::config::Settings;
use restyle::server::build_router;
use restyle::util::{env_bind_addr, init_tracing, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // A missing or malformed upstream credential refuses to start the
    // process; it must never surface as a per-request 500.
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            tracing::error!("Configuration error: {err}");
            std::process::exit(1);
        }
    };
    tracing::info!(
        environment = %settings.environment,
        model = %settings.openai_model,
        "configuration loaded"
    );

    let state = Arc::new(AppState::from_settings(settings));

    // Periodic eviction of idle rate-limit buckets keeps the identifier map
    // bounded by active-client cardinality.
    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(600));
        tick.tick().await; // the first tick completes immediately
        loop {
            tick.tick().await;
            let evicted = sweeper.limiter.sweep();
            if evicted > 0 {
                tracing::debug!(evicted, "evicted idle rate-limit buckets");
            }
        }
    });

    let addr = env_bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("restyle listening on http://{addr}");

    axum::serve(
        listener,
        build_router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
