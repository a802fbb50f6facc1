//! WebAPI - HTTP surface
//!
//! ## Responsibilities
//!
//! - HTTP routes for the category router
//! - Request body parsing
//! - Response formatting

mod routes;

pub use routes::create_router;

use axum::extract::State;
use axum::response::{Html, IntoResponse};
use axum::Json;

use crate::category_store::Category;
use crate::models::HealthResponse;
use crate::state::AppState;

/// Liveness banner
pub async fn home() -> Html<&'static str> {
    Html(
        "<h3>IoT-Enabled Perishable Food Quality Cloud Router Active</h3>\
         <p>Use /set_category, /get_category, or /data</p>",
    )
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_category: state.router.active_category().await.map(String::from),
        categories: state
            .router
            .endpoints()
            .categories()
            .map(Category::to_string)
            .collect(),
    };

    Json(response)
}
