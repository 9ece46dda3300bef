//! Bridge from `sqlgate_config::Config` to domain types.
//!
//! The config crate depends on no other sqlgate crate, so every conversion
//! into registries, validators and gateways happens here, once.

use std::sync::Arc;

use anyhow::Context as _;
use sqlgate_approval::{
    ContextTracker, Gateway, PassthroughTranslator, PendingOperationStore, RiskAssessor,
    SafetyValidator, Translator,
};
use sqlgate_config::Config;
use sqlgate_core::DatabaseRegistry;
use sqlgate_storage::{SqliteExecutor, StatementExecutor};
use sqlgate_telemetry::{LogConfig, LogFormat};

/// Convert `[databases]` to a [`DatabaseRegistry`] with resolved paths.
#[must_use]
pub(crate) fn to_registry(cfg: &Config) -> DatabaseRegistry {
    cfg.database_paths()
        .into_iter()
        .fold(DatabaseRegistry::new(), |registry, (id, path)| {
            registry.with_database(id, path)
        })
}

/// Convert `[safety]` to a [`SafetyValidator`].
#[must_use]
pub(crate) fn to_validator(cfg: &Config) -> SafetyValidator {
    SafetyValidator::new(&cfg.safety.denylist)
}

/// Convert `[risk]` to a [`RiskAssessor`].
#[must_use]
pub(crate) fn to_assessor(cfg: &Config) -> RiskAssessor {
    RiskAssessor::new(cfg.risk.sensitive_domains.clone())
}

/// Convert `[logging]` to a [`LogConfig`].
#[must_use]
pub(crate) fn to_log_config(cfg: &Config) -> LogConfig {
    let format = cfg
        .logging
        .format
        .parse::<LogFormat>()
        .unwrap_or(LogFormat::Compact);

    let mut lc = LogConfig::new(&cfg.logging.level).with_format(format);
    if let Some(dir) = cfg.log_dir() {
        lc = lc.with_file_logging(dir, "sqlgate");
    }

    cfg.logging
        .directives
        .iter()
        .fold(lc, |lc, d| lc.with_directive(d))
}

/// Open the pending store and wire a gateway over SQLite.
///
/// # Errors
///
/// Returns an error if the pending store cannot be opened.
pub(crate) fn build_gateway(cfg: &Config) -> anyhow::Result<Gateway> {
    build_gateway_with(cfg, Arc::new(PassthroughTranslator))
}

/// Like [`build_gateway`] with a caller-supplied translator.
///
/// # Errors
///
/// Returns an error if the pending store cannot be opened.
pub(crate) fn build_gateway_with(
    cfg: &Config,
    translator: Arc<dyn Translator>,
) -> anyhow::Result<Gateway> {
    let registry = Arc::new(to_registry(cfg));
    let pending_path = cfg.pending_db_path();
    let store = PendingOperationStore::open(&pending_path).with_context(|| {
        format!("failed to open pending store at {}", pending_path.display())
    })?;
    let executor: Arc<dyn StatementExecutor> = Arc::new(SqliteExecutor::new(Arc::clone(&registry)));

    Ok(Gateway::new(registry, Arc::new(store), executor, translator)
        .with_validator(to_validator(cfg))
        .with_assessor(to_assessor(cfg))
        .with_context_tracker(Arc::new(ContextTracker::new(cfg.gateway.context_capacity)))
        .with_prompt_turns(cfg.gateway.prompt_turns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlgate_core::{DatabaseId, OperationKind, RiskLevel};
    use sqlgate_telemetry::LogTarget;
    use std::path::PathBuf;

    #[test]
    fn test_registry_resolves_against_data_dir() {
        let cfg = Config::default();
        let registry = to_registry(&cfg);
        assert_eq!(registry.len(), 5);
        assert_eq!(
            registry.path_of(&DatabaseId::new_unchecked("hr")),
            Some(PathBuf::from("data/hr.db").as_path())
        );
    }

    #[test]
    fn test_validator_uses_configured_denylist() {
        let mut cfg = Config::default();
        cfg.safety.denylist = vec!["vacuum".to_owned()];
        let validator = to_validator(&cfg);
        assert!(!validator.validate("VACUUM;", OperationKind::Read).safe);
        assert!(validator.validate("SELECT 1;", OperationKind::Read).safe);
    }

    #[test]
    fn test_assessor_uses_configured_domains() {
        let mut cfg = Config::default();
        cfg.risk.sensitive_domains.clear();
        let assessment = to_assessor(&cfg).assess(
            "UPDATE accounts SET a = 1 WHERE id = 1;",
            OperationKind::Update,
            &DatabaseId::new_unchecked("finance"),
        );
        assert_eq!(assessment.level, RiskLevel::Low);
    }

    #[test]
    fn test_log_config_format_and_directives() {
        let mut cfg = Config::default();
        cfg.logging.format = "json".to_owned();
        cfg.logging.directives = vec!["sqlgate_approval=debug".to_owned()];
        let lc = to_log_config(&cfg);
        assert_eq!(lc.format, LogFormat::Json);
        assert_eq!(lc.directives, vec!["sqlgate_approval=debug"]);
        assert_eq!(lc.target, LogTarget::Stderr);
    }

    #[test]
    fn test_log_dir_switches_to_file_target() {
        let mut cfg = Config::default();
        cfg.logging.dir = Some(PathBuf::from("/var/log/sqlgate"));
        let lc = to_log_config(&cfg);
        assert_eq!(lc.target, LogTarget::File(PathBuf::from("/var/log/sqlgate")));
        assert_eq!(lc.file_prefix, "sqlgate");
    }

    #[test]
    fn test_build_gateway_creates_pending_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::default();
        cfg.gateway.data_dir = dir.path().to_path_buf();

        let gateway = build_gateway(&cfg).unwrap();
        assert!(dir.path().join("pending.db").exists());
        assert_eq!(gateway.registry().len(), 5);
        assert!(gateway.list(None).unwrap().is_empty());
    }
}
