use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{DyadError, Result};

pub const DEFAULT_THEME_ID: &str = "default";
pub const DEFAULT_TEMPLATE_ID: &str = "react";
pub const ZOOM_FACTOR_RANGE: RangeInclusive<f64> = 0.5..=3.0;

/// Full user settings record. Every key is always present once read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub selected_model: LargeLanguageModel,
    pub provider_settings: BTreeMap<String, ProviderSetting>,
    pub telemetry_consent: TelemetryConsent,
    pub telemetry_user_id: String,
    pub has_run_before: bool,
    pub experiments: BTreeMap<String, bool>,
    pub is_running: bool,
    pub enable_auto_update: bool,
    pub release_channel: ReleaseChannel,
    pub enable_native_git: bool,
    pub check_for_problems: ProblemCheckMode,
    pub selected_theme: String,
    pub default_template: String,
    pub local_models: LocalModels,
    pub zoom_factor: f64,
    pub is_test_mode: bool,
    pub github_personal_access_token: Option<String>,
    pub openai_key: Option<String>,
    pub anthropic_key: Option<String>,
    pub google_key: Option<String>,
    pub vertex_settings: Option<VertexSettings>,
    pub azure_settings: Option<AzureSettings>,
    pub amazon_settings: Option<AmazonSettings>,
    pub groq_key: Option<String>,
    pub deepseek_key: Option<String>,
    pub xai_key: Option<String>,
    pub ai_settings: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LargeLanguageModel {
    pub name: String,
    pub provider: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSetting {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<Secret>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryConsent {
    OptedIn,
    OptedOut,
    Unset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseChannel {
    Stable,
    Beta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProblemCheckMode {
    OnDemand,
    Always,
    Never,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalModels {
    pub ollama: LocalModel,
    pub lmstudio: LocalModel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalModel {
    pub enabled: bool,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VertexSettings {
    pub project_id: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureSettings {
    pub resource_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmazonSettings {
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
}

impl UserSettings {
    /// Default record with a fresh telemetry id.
    pub fn defaults() -> Self {
        Self::defaults_with_user_id(Uuid::new_v4().to_string())
    }

    pub fn defaults_with_user_id(telemetry_user_id: String) -> Self {
        Self {
            selected_model: LargeLanguageModel {
                name: "auto".into(),
                provider: "auto".into(),
            },
            provider_settings: BTreeMap::new(),
            telemetry_consent: TelemetryConsent::Unset,
            telemetry_user_id,
            has_run_before: false,
            experiments: BTreeMap::new(),
            is_running: false,
            enable_auto_update: false,
            release_channel: ReleaseChannel::Stable,
            enable_native_git: false,
            check_for_problems: ProblemCheckMode::OnDemand,
            selected_theme: DEFAULT_THEME_ID.into(),
            default_template: DEFAULT_TEMPLATE_ID.into(),
            local_models: LocalModels {
                ollama: LocalModel {
                    enabled: false,
                    base_url: "http://localhost:11434".into(),
                },
                lmstudio: LocalModel {
                    enabled: false,
                    base_url: "http://localhost:1234".into(),
                },
            },
            zoom_factor: 1.0,
            is_test_mode: false,
            github_personal_access_token: None,
            openai_key: None,
            anthropic_key: None,
            google_key: None,
            vertex_settings: None,
            azure_settings: None,
            amazon_settings: None,
            groq_key: None,
            deepseek_key: None,
            xai_key: None,
            ai_settings: None,
        }
    }

    /// Checks the constraints serde alone cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.selected_model.name.trim().is_empty() || self.selected_model.provider.trim().is_empty()
        {
            return Err(invalid("selectedModel.name and selectedModel.provider must not be empty"));
        }
        if self.telemetry_user_id.trim().is_empty() {
            return Err(invalid("telemetryUserId must not be empty"));
        }
        if self.selected_theme.trim().is_empty() {
            return Err(invalid("selectedTheme must not be empty"));
        }
        if self.default_template.trim().is_empty() {
            return Err(invalid("defaultTemplate must not be empty"));
        }
        if !self.zoom_factor.is_finite() || !ZOOM_FACTOR_RANGE.contains(&self.zoom_factor) {
            return Err(invalid(&format!(
                "zoomFactor must be between {} and {}",
                ZOOM_FACTOR_RANGE.start(),
                ZOOM_FACTOR_RANGE.end()
            )));
        }
        for (name, model) in [
            ("ollama", &self.local_models.ollama),
            ("lmstudio", &self.local_models.lmstudio),
        ] {
            if !is_http_url(&model.base_url) {
                return Err(invalid(&format!(
                    "localModels.{name}.baseUrl must be an http(s) url"
                )));
            }
        }
        if self.experiments.keys().any(|k| k.is_empty()) {
            return Err(invalid("experiments keys must not be empty"));
        }
        if let Some(v) = &self.vertex_settings {
            if v.project_id.is_empty() || v.location.is_empty() {
                return Err(invalid("vertexSettings requires projectId and location"));
            }
        }
        if let Some(a) = &self.azure_settings {
            if a.resource_name.is_empty() {
                return Err(invalid("azureSettings requires resourceName"));
            }
        }
        if let Some(a) = &self.amazon_settings {
            if a.region.is_empty() {
                return Err(invalid("amazonSettings requires region"));
            }
        }
        Ok(())
    }
}

fn is_http_url(s: &str) -> bool {
    let rest = s
        .strip_prefix("http://")
        .or_else(|| s.strip_prefix("https://"));
    matches!(rest, Some(host) if !host.is_empty())
}

fn invalid(msg: &str) -> DyadError {
    DyadError::InvalidSettings(msg.to_owned())
}
