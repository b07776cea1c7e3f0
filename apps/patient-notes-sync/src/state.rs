//! Application state management

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::groups::GroupService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    groups: GroupService,
}

impl AppState {
    pub fn new(config: Config, db: SqlitePool) -> Self {
        let groups = GroupService::new(db, config.groups.clone());

        Self {
            inner: Arc::new(AppStateInner { config, groups }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the group service
    pub fn groups(&self) -> &GroupService {
        &self.inner.groups
    }
}
