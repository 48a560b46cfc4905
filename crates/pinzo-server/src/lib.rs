//! Pinzo Server library.
//!
//! This crate provides the HTTP side of Pinzo:
//! - Session gate (transport normalization, sign-in redirects)
//! - Bookmark REST API scoped to the signed-in user
//! - Change relay fanning store changes out to live `/ws/changes` clients
//! - JWT session verification

pub mod auth;
pub mod cdc;
pub mod config;
pub mod error;
pub mod gate;
pub mod relay;
pub mod routes;
pub mod state;
pub mod ws;

use axum::{middleware, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use config::{Args, ServerConfig};
pub use error::AppError;
pub use gate::{GateDecision, SessionGate};
pub use relay::{ChangeRelay, RelayStats, Subscription};
pub use state::AppState;

/// Create the Axum router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .merge(routes::health::routes())
        // Screens
        .merge(routes::pages::routes())
        // Sign-in flow
        .merge(routes::auth::routes())
        // REST API
        .merge(routes::bookmarks::routes())
        // Live change feed
        .route("/ws/changes", get(ws::ws_changes))
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    gate::session_gate,
                )),
        )
        .with_state(state)
}
