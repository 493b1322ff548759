use axum::routing::{delete, get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::config::RelayConfig;
use crate::routes::{self, RelayState};

/// Rate-limit buckets idle this long are dropped by the sweeper.
const BUCKET_IDLE_SECS: f64 = 600.0;

/// Build and run the relay server until ctrl-c.
pub async fn run(config: RelayConfig) -> anyhow::Result<()> {
    let state = Arc::new(RelayState::new(config.clone()));
    let sweeper = spawn_sweeper(state.clone());

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("agora-relay listening on {}", listener.local_addr()?);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.abort();
    info!("agora-relay stopped");
    Ok(())
}

/// Build the router (exported for testing). Serve it with
/// `into_make_service_with_connect_info::<SocketAddr>()`; the unauthenticated
/// routes rate-limit by client address.
pub fn router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/v1/challenge", get(routes::get_challenge))
        .route("/v1/register", post(routes::register))
        .route("/v1/peers", get(routes::get_peers))
        .route("/v1/send", post(routes::send))
        .route("/v1/messages", get(routes::get_messages))
        .route("/v1/disconnect", delete(routes::disconnect))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Periodically drop expired sessions, stale challenges, and idle rate-limit
/// buckets. Authentication also checks expiry lazily, so the sweep only
/// bounds memory.
pub fn spawn_sweeper(state: Arc<RelayState>) -> JoinHandle<()> {
    let period = Duration::from_secs(state.config.sweep_interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let sessions = state.sessions.sweep_expired();
            let challenges = state.challenges.evict_expired();
            let buckets = state.rate_limiter.evict_stale(BUCKET_IDLE_SECS)
                + state.client_limiter.evict_stale(BUCKET_IDLE_SECS);
            if sessions + challenges + buckets > 0 {
                debug!(sessions, challenges, buckets, "expired entries swept");
            }
        }
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
