use std::{path::Path, sync::Arc};

use crate::{
    infra::{
        self,
        config::{AppConfig, FileConfigAdapter},
        contracts::ConfigAdapter,
        error::AppError,
        file_store::FileKeyValueStore,
        storage_layout::StorageLayout,
    },
    rules::RuleStore,
    usecases::context::AppContext,
};

pub fn bootstrap(config_path: Option<&Path>) -> Result<AppContext, AppError> {
    let config = load_config(&FileConfigAdapter::new(config_path))?;
    infra::logging::init(&config.logging)?;

    build_context(config)
}

fn load_config(adapter: &dyn ConfigAdapter) -> Result<AppConfig, AppError> {
    adapter.load().map_err(AppError::Other)
}

/// Wires the rule store to the configured rules file.
pub fn build_context(config: AppConfig) -> Result<AppContext, AppError> {
    let layout = StorageLayout::resolve(&config.storage)?;
    layout.ensure_dirs()?;

    let storage = Arc::new(FileKeyValueStore::new(layout.rules_file.clone()));
    let rules = Arc::new(RuleStore::new(storage));

    Ok(AppContext::new(config, layout, rules))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::rule::{BlacklistEntry, Pattern, RuleSet},
        infra::{config::StorageConfig, stubs::StubConfigAdapter},
        test_support::env_lock,
    };

    #[test]
    fn loads_default_config_when_file_is_missing() {
        let adapter = FileConfigAdapter::new(Some(Path::new("./missing-config.toml")));
        let config = load_config(&adapter).expect("config should load from defaults");

        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn context_rules_persist_to_configured_file() {
        let _guard = env_lock();
        let root = tempfile::tempdir().expect("tempdir");
        let rules_file = root.path().join("state").join("rules.toml");
        let config = AppConfig {
            storage: StorageConfig {
                rules_file: Some(rules_file.clone()),
            },
            ..AppConfig::default()
        };

        let context = build_context(config.clone()).expect("context should build");
        context
            .rules
            .commit(RuleSet::Blacklist(vec![BlacklistEntry::new(Pattern::plain("spam"))]))
            .expect("commit should succeed");
        assert!(rules_file.exists());

        let reopened = build_context(config).expect("context should rebuild");
        assert_eq!(reopened.rules.load().blacklist_entries().count(), 1);
    }

    #[test]
    fn context_builds_from_any_config_adapter() {
        let _guard = env_lock();
        let root = tempfile::tempdir().expect("tempdir");
        let mut config = load_config(&StubConfigAdapter).expect("stub config should load");
        config.storage.rules_file = Some(root.path().join("rules.toml"));

        let context = build_context(config).expect("context should build");

        assert_eq!(context.config.hub, AppConfig::default().hub);
        assert_eq!(context.layout.rules_file, root.path().join("rules.toml"));
        assert!(context.rules.load().is_empty());
    }
}
