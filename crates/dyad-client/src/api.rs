//! HTTP half of the client: the `/api` routes served next to `/ws`.
//!
//! Error bodies (`{ "error": <code>, "message": <text> }`) are mapped back to
//! the matching `DyadError` variant, so callers see the same codes over HTTP
//! as over the stream channel.

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use dyad_core::error::{ClientCode, DyadError, Result};
use dyad_core::settings::{SettingsPatch, UserSettings};

/// Environment variable holding the `/api` base URL.
pub const API_URL_ENV: &str = "DYAD_API_URL";
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3000/api";

/// Platform reported by the web build.
pub const SYSTEM_PLATFORM: &str = "web";

/// `GET /api/health`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Health {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base: String,
    http: reqwest::Client,
}

impl ApiClient {
    /// Client for `base_url`, e.g. `http://127.0.0.1:3000/api`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| DyadError::Internal(format!("http client init failed: {e}")))?;
        Ok(Self::with_http(base_url, http))
    }

    pub fn with_http(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        let base = base_url.into().trim_end_matches('/').to_owned();
        Self { base, http }
    }

    /// `DYAD_API_URL`, falling back to the local default.
    pub fn from_env() -> Result<Self> {
        match std::env::var(API_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => Self::new(url.trim()),
            _ => Self::new(DEFAULT_API_URL),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    pub async fn health(&self) -> Result<Health> {
        self.call(Method::GET, "/health", None::<&()>).await
    }

    /// Server package version, as reported by `/health`.
    pub async fn app_version(&self) -> Result<String> {
        Ok(self.health().await?.version)
    }

    pub fn system_platform(&self) -> &'static str {
        SYSTEM_PLATFORM
    }

    pub async fn get_user_settings(&self) -> Result<UserSettings> {
        self.call(Method::GET, "/settings", None::<&()>).await
    }

    /// Merges `patch` into the stored record; returns the persisted record.
    pub async fn set_user_settings(&self, patch: &SettingsPatch) -> Result<UserSettings> {
        self.call(Method::PATCH, "/settings", Some(patch)).await
    }

    pub async fn list_apps(&self) -> Result<Value> {
        self.call(Method::GET, "/apps", None::<&()>).await
    }

    pub async fn get_app(&self, app_id: &str) -> Result<Value> {
        self.call(Method::GET, &format!("/apps/{app_id}"), None::<&()>).await
    }

    pub async fn create_app(&self, app: &Value) -> Result<Value> {
        self.call(Method::POST, "/apps", Some(app)).await
    }

    pub async fn delete_app(&self, app_id: &str) -> Result<Value> {
        self.call(Method::DELETE, &format!("/apps/{app_id}"), None::<&()>).await
    }

    pub async fn list_chats(&self) -> Result<Value> {
        self.call(Method::GET, "/chats", None::<&()>).await
    }

    pub async fn get_chat(&self, chat_id: &str) -> Result<Value> {
        self.call(Method::GET, &format!("/chats/{chat_id}"), None::<&()>).await
    }

    pub async fn create_chat(&self, chat: &Value) -> Result<Value> {
        self.call(Method::POST, "/chats", Some(chat)).await
    }

    async fn call<B, T>(&self, method: Method, endpoint: &str, body: Option<&B>) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{endpoint}", self.base);
        let mut req = self.http.request(method.clone(), &url);
        if let Some(body) = body {
            req = req.json(body);
        }

        let res = req.send().await.map_err(|e| {
            tracing::debug!(%method, %url, error = %e, "api request failed");
            DyadError::Internal(format!("request to {url} failed: {e}"))
        })?;

        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .map_err(|e| DyadError::Internal(format!("reading response from {url} failed: {e}")))?;

        if !status.is_success() {
            let err = remote_error(status, &bytes);
            tracing::debug!(%method, %url, %status, error = %err, "api error response");
            return Err(err);
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| DyadError::Internal(format!("unexpected response from {url}: {e}")))
    }
}

/// Rebuilds the server-side error from an `{error, message}` body.
fn remote_error(status: StatusCode, body: &[u8]) -> DyadError {
    let Ok(ErrorBody { error, message }) = serde_json::from_slice::<ErrorBody>(body) else {
        return DyadError::Internal(format!("request failed with status {status}"));
    };

    match ClientCode::parse(&error) {
        Some(ClientCode::BadRequest) => DyadError::BadRequest(message),
        Some(ClientCode::UnknownType) => DyadError::UnknownMessageType(message),
        Some(ClientCode::StreamActive) => DyadError::StreamActive(message),
        Some(ClientCode::InvalidSettings) => DyadError::InvalidSettings(message),
        Some(ClientCode::Io) => DyadError::Io(std::io::Error::other(message)),
        _ => DyadError::Internal(format!("{error}: {message}")),
    }
}
