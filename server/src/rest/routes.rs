//! Route-Definitionen fuer die REST-API

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::rest::handlers;
use crate::state::AppState;

/// Erstellt den vollstaendigen Router inkl. Middleware
///
/// `/metrics` und `/health` werden nur mit `observability = true` eingehaengt.
pub fn router(state: AppState, cors_origins: &[String], observability: bool) -> Router {
    let max_upload = state.richtlinie.max_groesse;

    let mut app = Router::new()
        // Items
        .route(
            "/v1/items",
            post(handlers::items::hochladen).layer(DefaultBodyLimit::max(max_upload)),
        )
        .route("/v1/items", get(handlers::items::auflisten))
        .route("/v1/items/:id", get(handlers::items::abrufen))
        .route("/v1/metadata", post(handlers::items::besitzer_setzen))
        // Schluesselverteilung
        .route("/v1/keys", get(handlers::schluessel::verteilen))
        // Signal-Relay
        .route("/v1/signal", post(handlers::signal::ablegen))
        .route("/v1/signal", get(handlers::signal::abholen))
        .with_state(state.clone());

    if observability {
        app = app.merge(handoff_observability::observability_router(
            state.metriken.clone(),
            state.health.clone(),
        ));
    }

    app.layer(axum::middleware::from_fn_with_state(
        state.metriken.clone(),
        handoff_observability::timing_middleware,
    ))
    .layer(handoff_observability::request_timing_layer())
    .layer(cors_layer(cors_origins))
}

/// CORS: entweder spezifische Origins oder Any
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}
