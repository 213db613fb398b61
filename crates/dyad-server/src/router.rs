//! Axum router wiring: `/ws` upgrade plus the `/api` facade.

use axum::{routing::get, Router};

use crate::{api, app_state::AppState, transport};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(transport::ws::ws_upgrade))
        .nest("/api", api::routes())
        .with_state(state)
}
