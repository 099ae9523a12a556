mod auth;
mod config;
mod error;
mod model;
mod pages;
mod routes;
mod store;
mod utils;

use auth::{require_token, AccessGate};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::{serve, Router};
use config::{listen_address, Config, TokenTransport};
use dotenvy::dotenv;
use error::StartupError;
use routes::{
    create_link, dashboard, delete_link, edit_link, login, login_page, logout,
    method_not_allowed, redirect, AppState,
};
use store::create_link_store;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_TRACING_LEVEL: &str = "shortlinks=debug";

#[tokio::main]
async fn main() {
    _ = dotenv();
    configure_tracing();
    if let Err(err) = run().await {
        tracing::error!("Shutting down: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    let config = Config::load()?;
    let server_address = listen_address()?;
    let store = create_link_store(&config.store).await?;
    let state = AppState::new(config, store)?;
    let listener = create_listener(&server_address).await?;
    serve(listener, create_router(state)).await?;
    Ok(())
}

fn configure_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or(DEFAULT_TRACING_LEVEL.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn create_listener(server_address: &str) -> Result<TcpListener, StartupError> {
    let listener = TcpListener::bind(server_address).await?;
    tracing::info!("Short links server listening on {}", server_address);
    Ok(listener)
}

fn create_router(state: AppState) -> Router {
    let endpoints = state.config.reserved_management_endpoints.clone();
    let link_gate = AccessGate::new(state.authority.clone(), state.transport());
    let session_gate = AccessGate::new(state.authority.clone(), TokenTransport::Cookie);
    Router::new()
        .route(
            "/create",
            post(create_link)
                .route_layer(from_fn_with_state(link_gate.clone(), require_token))
                .fallback(method_not_allowed),
        )
        .route(
            "/edit",
            post(edit_link)
                .route_layer(from_fn_with_state(link_gate.clone(), require_token))
                .fallback(method_not_allowed),
        )
        .route(
            "/delete",
            post(delete_link)
                .route_layer(from_fn_with_state(link_gate, require_token))
                .fallback(method_not_allowed),
        )
        .route(&endpoints.login, get(login_page).post(login))
        .route(&endpoints.logout, get(logout).post(logout))
        .route(
            &endpoints.dashboard,
            get(dashboard).route_layer(from_fn_with_state(session_gate, require_token)),
        )
        .fallback(redirect)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
