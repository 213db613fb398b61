use axum::extract::State;
use axum::Json;

use dyad_core::settings::{SettingsPatch, UserSettings};
use dyad_core::DyadError;

use crate::api::error::ApiResult;
use crate::app_state::AppState;

/// `GET /api/settings`
pub async fn get_settings(State(app): State<AppState>) -> ApiResult<Json<UserSettings>> {
    let store = app.settings();
    let settings = tokio::task::spawn_blocking(move || store.read())
        .await
        .map_err(|e| DyadError::Internal(format!("settings task failed: {e}")))??;
    Ok(Json(settings))
}

/// `PATCH /api/settings`: merge the given top-level keys, answer with the full record.
pub async fn patch_settings(
    State(app): State<AppState>,
    Json(patch): Json<SettingsPatch>,
) -> ApiResult<Json<UserSettings>> {
    let keys: Vec<String> = patch.keys().cloned().collect();
    let store = app.settings();
    let settings = tokio::task::spawn_blocking(move || store.write(patch))
        .await
        .map_err(|e| DyadError::Internal(format!("settings task failed: {e}")))??;
    tracing::info!(?keys, "settings updated");
    Ok(Json(settings))
}
