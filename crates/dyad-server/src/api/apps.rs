//! App routes. Placeholders until app persistence lands on this side.

use axum::extract::Path;
use axum::Json;
use serde_json::{json, Value};

pub async fn list_apps() -> Json<Value> {
    Json(json!({ "apps": [] }))
}

pub async fn get_app(Path(app_id): Path<String>) -> Json<Value> {
    Json(json!({ "appId": app_id }))
}

pub async fn create_app(Json(body): Json<Value>) -> Json<Value> {
    tracing::debug!(fields = body.as_object().map_or(0, |o| o.len()), "create app");
    Json(json!({ "success": true, "appId": "new-app-id" }))
}

pub async fn delete_app(Path(app_id): Path<String>) -> Json<Value> {
    tracing::debug!(%app_id, "delete app");
    Json(json!({ "success": true }))
}
