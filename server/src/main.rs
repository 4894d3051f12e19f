mod cleanup;
mod config;
mod registry;
mod relay;
mod state;
mod ws;

use std::net::SocketAddr;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::Method,
    routing::get,
};
use config::Config;
use state::AppState;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use sketchrelay_shared::{RoomId, RoomInfoResponse};

/// GET /api/rooms/:id - Room occupancy and creator liveness
async fn get_room(
    Path(room_id): Path<RoomId>,
    State(state): State<AppState>,
) -> Json<RoomInfoResponse> {
    let registry = state.registry.read().await;
    Json(RoomInfoResponse {
        exists: registry.contains_room(&room_id),
        has_creator: registry.has_creator(&room_id),
        occupancy: registry.occupancy_count(&room_id),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load("config.toml").await?;

    let state = AppState::new(&config.relay);

    // Spawn room garbage collection task
    cleanup::spawn_cleanup_task(state.clone());

    // CORS configuration for browser clients
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any);

    let app = Router::new()
        .route("/api/rooms/{id}", get(get_room))
        .route("/ws", get(ws::ws_handler))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind(config.server.bind)
        .await
        .context("failed to bind to address")?;
    info!("Server listening on http://{}", config.server.bind);

    let shutdown = state.shutdown.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
        shutdown.cancel();
    })
    .await
    .context("server error")?;

    Ok(())
}
