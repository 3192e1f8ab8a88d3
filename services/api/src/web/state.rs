//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use std::sync::Arc;

use casa_core::ports::{DatabaseService, EmailService, PhotoStoreService};

use crate::config::Config;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub email: Arc<dyn EmailService>,
    pub photos: Arc<dyn PhotoStoreService>,
}
