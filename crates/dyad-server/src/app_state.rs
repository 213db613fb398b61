//! Shared application state.
//!
//! Owns the config, the settings store, the consent broker and the dispatcher
//! with the built-in services registered.

use std::sync::Arc;

use dyad_core::error::Result;
use dyad_core::settings::SettingsStore;

use crate::config::DyadConfig;
use crate::dispatch::Dispatcher;
use crate::services::{ChatGenerator, ConsentBroker, ConsentService, PlaceholderGenerator, StreamService};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    consent: Arc<ConsentBroker>,
    dispatcher: Arc<Dispatcher>,
}

struct AppStateInner {
    cfg: DyadConfig,
    settings: Arc<SettingsStore>,
}

impl AppState {
    /// Build application state with the placeholder generator and the settings
    /// directory named in config (platform data dir when unset).
    pub fn new(cfg: DyadConfig) -> Result<Self> {
        let settings = match &cfg.settings.dir {
            Some(dir) => SettingsStore::new(dir),
            None => SettingsStore::at_default_location()?,
        };
        let generator = Arc::new(PlaceholderGenerator::from_config(&cfg.stream));
        Ok(Self::with_parts(cfg, settings, generator))
    }

    pub fn with_parts(
        cfg: DyadConfig,
        settings: SettingsStore,
        generator: Arc<dyn ChatGenerator>,
    ) -> Self {
        let dispatcher = Dispatcher::new();
        dispatcher.register(Arc::new(StreamService::new(generator)));
        dispatcher.register(Arc::new(ConsentService::new()));

        tracing::debug!(
            kinds = ?dispatcher.registered_kinds(),
            settings = %settings.path().display(),
            "app state ready"
        );

        Self {
            inner: Arc::new(AppStateInner {
                cfg,
                settings: Arc::new(settings),
            }),
            consent: Arc::new(ConsentBroker::new()),
            dispatcher: Arc::new(dispatcher),
        }
    }

    pub fn cfg(&self) -> &DyadConfig {
        &self.inner.cfg
    }

    pub fn settings(&self) -> Arc<SettingsStore> {
        Arc::clone(&self.inner.settings)
    }

    pub fn consent(&self) -> Arc<ConsentBroker> {
        Arc::clone(&self.consent)
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }
}
