use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};

use crate::error::{DyadError, Result};

use super::schema::UserSettings;

pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Top-level keys to replace. Nested objects are replaced whole, not merged.
pub type SettingsPatch = Map<String, Value>;

/// File-backed settings with default backfill and validation.
///
/// Writes from one process are serialized by an internal lock. Separate
/// processes sharing the file still race: the last full-record write wins.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    defaults: UserSettings,
    write_lock: Mutex<()>,
}

impl SettingsStore {
    /// Store backed by `<dir>/settings.json`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_defaults(dir, UserSettings::defaults())
    }

    pub fn with_defaults(dir: impl Into<PathBuf>, defaults: UserSettings) -> Self {
        Self {
            path: dir.into().join(SETTINGS_FILE_NAME),
            defaults,
            write_lock: Mutex::new(()),
        }
    }

    /// Store under the platform user-data directory (`<data_dir>/dyad`).
    pub fn at_default_location() -> Result<Self> {
        let dir = dirs::data_dir()
            .ok_or_else(|| DyadError::Internal("no platform data directory".into()))?;
        Ok(Self::new(dir.join("dyad")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn defaults(&self) -> &UserSettings {
        &self.defaults
    }

    /// Current record. Materializes the file on first use.
    ///
    /// Content errors (unreadable, not JSON, schema violation) fall back to the
    /// default record. Only failures while creating the file propagate.
    pub fn read(&self) -> Result<UserSettings> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return self.materialize(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read settings, using defaults");
                return Ok(self.defaults.clone());
            }
        };

        match self.merge_with_defaults(&raw) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "invalid settings file, using defaults");
                Ok(self.defaults.clone())
            }
        }
    }

    /// Read-merge-write. Returns the record that was persisted.
    pub fn write(&self, patch: SettingsPatch) -> Result<UserSettings> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| DyadError::Internal("settings write lock poisoned".into()))?;

        let current = self.read()?;
        let mut merged = to_object(&current)?;
        for (key, value) in patch {
            if !merged.contains_key(&key) {
                return Err(DyadError::BadRequest(format!("unknown settings key: {key}")));
            }
            merged.insert(key, value);
        }

        let next = from_object(merged)?;
        next.validate()?;
        self.persist(&next)?;
        tracing::debug!(path = %self.path.display(), "settings written");
        Ok(next)
    }

    fn materialize(&self) -> Result<UserSettings> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.persist(&self.defaults)?;
        tracing::info!(path = %self.path.display(), "created default settings");
        Ok(self.defaults.clone())
    }

    fn merge_with_defaults(&self, raw: &str) -> Result<UserSettings> {
        let parsed: Value = serde_json::from_str(raw)
            .map_err(|e| DyadError::InvalidSettings(format!("not valid json: {e}")))?;
        let Value::Object(parsed) = parsed else {
            return Err(DyadError::InvalidSettings(
                "settings file must contain a JSON object".into(),
            ));
        };

        let mut merged = to_object(&self.defaults)?;
        merged.extend(parsed);

        let settings = from_object(merged)?;
        settings.validate()?;
        Ok(settings)
    }

    fn persist(&self, settings: &UserSettings) -> Result<()> {
        let body = serde_json::to_string_pretty(settings)
            .map_err(|e| DyadError::Internal(format!("settings encode failed: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        if let Err(e) = fs::write(&tmp, body).and_then(|()| fs::rename(&tmp, &self.path)) {
            // leaves a directory in the way untouched
            let _ = fs::remove_file(&tmp);
            tracing::warn!(path = %self.path.display(), error = %e, "failed to persist settings");
            return Err(e.into());
        }
        Ok(())
    }
}

fn to_object(settings: &UserSettings) -> Result<Map<String, Value>> {
    match serde_json::to_value(settings) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(DyadError::Internal("settings did not encode to an object".into())),
        Err(e) => Err(DyadError::Internal(format!("settings encode failed: {e}"))),
    }
}

fn from_object(map: Map<String, Value>) -> Result<UserSettings> {
    serde_json::from_value(Value::Object(map))
        .map_err(|e| DyadError::InvalidSettings(e.to_string()))
}
