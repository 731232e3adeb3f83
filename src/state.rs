//! Shared application state for all routes.

use crate::crud::DataContext;
use crate::settings::Settings;
use crate::storage::FileStorage;
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Store, query cache and retry policy.
    pub data: DataContext,
    pub storage: Arc<dyn FileStorage>,
    /// Secret for privileged routes; `None` disables them.
    pub service_key: Option<String>,
}

impl AppState {
    pub fn new(data: DataContext, storage: Arc<dyn FileStorage>, service_key: Option<String>) -> Self {
        AppState {
            data,
            storage,
            service_key,
        }
    }

    pub fn from_settings(store: Arc<dyn Store>, storage: Arc<dyn FileStorage>, settings: &Settings) -> Self {
        AppState::new(
            DataContext::from_settings(store, settings),
            storage,
            settings.service_key.clone(),
        )
    }
}
