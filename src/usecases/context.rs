use std::sync::Arc;

use crate::{
    infra::{config::AppConfig, storage_layout::StorageLayout},
    rules::{HighlightSession, RuleStore},
};

#[derive(Debug)]
pub struct AppContext {
    pub config: AppConfig,
    pub layout: StorageLayout,
    pub rules: Arc<RuleStore>,
    pub sessions: HighlightSession,
}

impl AppContext {
    pub fn new(config: AppConfig, layout: StorageLayout, rules: Arc<RuleStore>) -> Self {
        let sessions = HighlightSession::new(Arc::clone(&rules));
        Self {
            config,
            layout,
            rules,
            sessions,
        }
    }
}
