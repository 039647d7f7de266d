pub mod acronyms;
pub mod categories;
pub mod error;
pub mod state;
pub mod users;

use axum::{
    Json, Router,
    routing::{get, post},
};
use serde_json::{Value, json};

pub use error::ApiError;
pub use state::{AppState, AppStateInner};

/// JSON API routes. Layers (CORS, tracing) are added by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/acronyms",
            get(acronyms::list_acronyms).post(acronyms::create_acronym),
        )
        .route("/api/acronyms/search", get(acronyms::search_acronyms))
        .route(
            "/api/acronyms/{id}",
            get(acronyms::get_acronym)
                .put(acronyms::update_acronym)
                .delete(acronyms::delete_acronym),
        )
        .route("/api/acronyms/{id}/creator", get(acronyms::get_creator))
        .route("/api/acronyms/{id}/categories", get(acronyms::get_categories))
        .route(
            "/api/acronyms/{id}/categories/{category_id}",
            post(acronyms::attach_category),
        )
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route("/api/users/{id}", get(users::get_user).delete(users::delete_user))
        .route("/api/users/{id}/acronyms", get(users::get_user_acronyms))
        .route(
            "/api/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route("/api/categories/{id}", get(categories::get_category))
        .route(
            "/api/categories/{id}/acronyms",
            get(categories::get_category_acronyms),
        )
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
