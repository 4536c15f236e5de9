// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    mail::{Mailer, mailer_from_config},
    services::notifier::Notifier,
    store::{StoreBackend, StoreRegistry},
    utils::token::{RandomTokens, TokenSource},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub stores: StoreRegistry,
    pub notifier: Notifier,
    pub tokens: Arc<dyn TokenSource>,
}

impl AppState {
    /// State with the mail transport and token source picked from `config`.
    pub fn new(config: Config, backend: Arc<dyn StoreBackend>) -> Self {
        let mailer = mailer_from_config(&config.mail);
        Self::with_parts(config, backend, mailer, Arc::new(RandomTokens))
    }

    pub fn with_parts(
        config: Config,
        backend: Arc<dyn StoreBackend>,
        mailer: Arc<dyn Mailer>,
        tokens: Arc<dyn TokenSource>,
    ) -> Self {
        let notifier = Notifier::new(mailer, &config.mail);
        Self {
            stores: StoreRegistry::new(backend),
            notifier,
            tokens,
            config,
        }
    }
}

impl FromRef<AppState> for StoreRegistry {
    fn from_ref(state: &AppState) -> Self {
        state.stores.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
