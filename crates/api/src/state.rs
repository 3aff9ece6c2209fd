//! Shared application state for the Axum API server.

use std::sync::Arc;

use herald_common::config::AppConfig;
use herald_common::store::{SettingsStore, TemplateStore, UploadStore};
use herald_engine::{DispatchSettings, DispatchWorker, Dispatcher, SendThrottle};
use herald_notifier::ChannelConnector;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub dispatcher: Arc<Dispatcher>,
    pub templates: TemplateStore,
    pub settings: SettingsStore,
    pub uploads: UploadStore,
}

impl AppState {
    /// Build state with a dispatcher configured from `config`.
    pub fn new(config: AppConfig, connector: Arc<dyn ChannelConnector>) -> Self {
        let templates = TemplateStore::new(&config.template_dir);
        let worker = DispatchWorker::new(
            templates,
            connector,
            DispatchSettings::from_app_config(&config),
        )
        .with_throttle(SendThrottle::from_secs(config.send_interval_secs));

        Self::with_dispatcher(config, Dispatcher::new(worker))
    }

    /// Build state around an existing dispatcher.
    pub fn with_dispatcher(config: AppConfig, dispatcher: Dispatcher) -> Self {
        Self {
            templates: TemplateStore::new(&config.template_dir),
            settings: SettingsStore::new(&config.settings_path),
            uploads: UploadStore::new(&config.upload_dir),
            dispatcher: Arc::new(dispatcher),
            config,
        }
    }

    /// Create directories and default files the routes expect.
    pub async fn prepare(&self) -> Result<(), herald_common::error::AppError> {
        self.uploads.ensure_dir().await?;
        tokio::fs::create_dir_all(&self.config.log_dir).await?;
        self.templates.ensure_defaults().await?;
        self.settings.ensure_defaults().await?;
        Ok(())
    }
}
