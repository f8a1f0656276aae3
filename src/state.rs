use std::sync::Arc;

use crate::config::Settings;
use crate::database::Repository;
use crate::tenant::TenantRegistry;

/// Application state shared across handlers and the scheduler.
/// `repo` is None when the database could not be initialized; the
/// process then serves in degraded mode instead of crashing.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub registry: Arc<TenantRegistry>,
    pub repo: Option<Arc<Repository>>,
}
