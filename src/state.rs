//! Application state shared across handlers.

use std::sync::Arc;

use crate::auth::JwtKeys;
use crate::config::AppConfig;
use crate::services::EventPublisher;
use crate::storage::Storage;

/// Cheaply cloneable handle to shared resources.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    storage: Storage,
    jwt: JwtKeys,
    events: EventPublisher,
}

impl AppState {
    pub fn new(config: AppConfig, storage: Storage, events: EventPublisher) -> Self {
        let jwt = JwtKeys::from_config(&config.auth);
        Self { inner: Arc::new(AppStateInner { config, storage, jwt, events }) }
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig { &self.inner.config }

    #[must_use]
    pub fn storage(&self) -> &Storage { &self.inner.storage }

    #[must_use]
    pub fn jwt(&self) -> &JwtKeys { &self.inner.jwt }

    #[must_use]
    pub fn events(&self) -> &EventPublisher { &self.inner.events }
}
