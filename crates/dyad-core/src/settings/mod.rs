//! User settings persistence (read-merge-validate-write).

pub mod schema;
pub mod store;

pub use schema::{
    AmazonSettings, AzureSettings, LargeLanguageModel, LocalModel, LocalModels, ProblemCheckMode,
    ProviderSetting, ReleaseChannel, Secret, TelemetryConsent, UserSettings, VertexSettings,
};
pub use store::{SettingsPatch, SettingsStore, SETTINGS_FILE_NAME};
