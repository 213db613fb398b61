//! Chat routes. Streaming itself runs over `/ws`.

use axum::extract::Path;
use axum::Json;
use serde_json::{json, Value};

pub async fn list_chats() -> Json<Value> {
    Json(json!({ "chats": [] }))
}

pub async fn get_chat(Path(chat_id): Path<String>) -> Json<Value> {
    Json(json!({ "chatId": chat_id }))
}

pub async fn create_chat(Json(body): Json<Value>) -> Json<Value> {
    tracing::debug!(fields = body.as_object().map_or(0, |o| o.len()), "create chat");
    Json(json!({ "success": true, "chatId": "new-chat-id" }))
}
