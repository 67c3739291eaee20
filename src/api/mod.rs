//! Admin HTTP server -- axum routes, status pages, and middleware.

mod pages;
mod routes;
pub mod state;

use axum::http::StatusCode;
use axum::Router;
use tower_http::trace::TraceLayer;

use self::state::AppState;

/// Build the admin router: health, metrics, ad-hoc check triggers, and
/// status pages.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::admin_routes())
        .merge(pages::page_routes())
        .nest("/api/v1", routes::api_routes())
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn fallback() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "not found")
}
