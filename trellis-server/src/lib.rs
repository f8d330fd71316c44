//! # Trellis Server
//!
//! HTTP and websocket front end for the Trellis network inventory.
//!
//! The server wires the ingestion pipeline from `trellis-core` to an
//! axum router: scan and SNMP poll triggers, the on-demand topology
//! read, and a websocket feed that tells viewers when the graph may
//! have changed.

pub mod errors;
pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::AppState;

use axum::{Router, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Assemble the full application router around a prepared state.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .merge(routes::create_api_router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
