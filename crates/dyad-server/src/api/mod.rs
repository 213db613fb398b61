//! HTTP facade mounted under `/api`.

pub mod apps;
pub mod chats;
pub mod error;
pub mod settings;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::app_state::AppState;

pub use error::{ApiError, ApiResult};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route(
            "/settings",
            get(settings::get_settings).patch(settings::patch_settings),
        )
        .route("/apps", get(apps::list_apps).post(apps::create_app))
        .route("/apps/:app_id", get(apps::get_app).delete(apps::delete_app))
        .route("/chats", get(chats::list_chats).post(chats::create_chat))
        .route("/chats/:chat_id", get(chats::get_chat))
}

/// `GET /api/health`
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}
