use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use samadhaan_policy_engine::{Clock, PolicyEngine, PolicyPaths, SystemClock};

use crate::mediator::NegotiationMediator;

/// Deployment-level mediator configuration, normally loaded from a
/// YAML file next to the policy directory.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MediatorConfig {
    pub policy_rules_path: PathBuf,
    pub mandatory_docs_path: PathBuf,
}

impl MediatorConfig {
    /// Conventional file names inside one policy directory.
    pub fn in_dir(dir: impl AsRef<Path>) -> MediatorConfig {
        let dir = dir.as_ref();
        MediatorConfig {
            policy_rules_path: dir.join("policy_rules.yaml"),
            mandatory_docs_path: dir.join("mandatory_docs.yaml"),
        }
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<MediatorConfig> {
        serde_yaml::from_str(content).context("Parsing mediator config")
    }
}

impl From<&MediatorConfig> for PolicyPaths {
    fn from(config: &MediatorConfig) -> PolicyPaths {
        PolicyPaths {
            policy_rules: config.policy_rules_path.clone(),
            mandatory_docs: config.mandatory_docs_path.clone(),
        }
    }
}

/// Builds a mediator from configuration. Policy files must load and
/// validate; a broken policy is fatal here, never at suggestion time.
pub fn create_mediator(config: MediatorConfig) -> anyhow::Result<Arc<NegotiationMediator>> {
    create_mediator_with_clock(config, Arc::new(SystemClock))
}

pub fn create_mediator_with_clock(
    config: MediatorConfig,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<Arc<NegotiationMediator>> {
    let engine = PolicyEngine::load(PolicyPaths::from(&config), clock.now()).with_context(|| {
        format!(
            "Loading policy files {} and {}",
            config.policy_rules_path.display(),
            config.mandatory_docs_path.display()
        )
    })?;
    Ok(Arc::new(NegotiationMediator::with_clock(
        Arc::new(engine),
        clock,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempdir::TempDir;

    #[test]
    fn config_roundtrips_through_yaml() {
        let config = MediatorConfig::in_dir("config");
        let serialized = serde_yaml::to_string(&config).unwrap();
        let parsed = MediatorConfig::from_yaml(&serialized).unwrap();
        assert_eq!(parsed.policy_rules_path, config.policy_rules_path);
        assert_eq!(parsed.mandatory_docs_path, config.mandatory_docs_path);
    }

    #[test]
    fn creates_mediator_from_empty_policy_files() {
        let dir = TempDir::new("factory").unwrap();
        fs::write(dir.path().join("policy_rules.yaml"), "").unwrap();
        fs::write(dir.path().join("mandatory_docs.yaml"), "").unwrap();

        let mediator = create_mediator(MediatorConfig::in_dir(dir.path())).unwrap();
        assert_eq!(mediator.engine().snapshot().version(), "1.0.0");
    }

    #[test]
    fn missing_policy_files_are_fatal() {
        let dir = TempDir::new("factory-missing").unwrap();
        assert!(create_mediator(MediatorConfig::in_dir(dir.path())).is_err());
    }

    #[test]
    fn shipped_sample_config_loads() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR"));
        let content = fs::read_to_string(root.join("config/mediator.yaml")).unwrap();
        let mut config = MediatorConfig::from_yaml(&content).unwrap();
        config.policy_rules_path = root.join(&config.policy_rules_path);
        config.mandatory_docs_path = root.join(&config.mandatory_docs_path);

        let mediator = create_mediator(config).unwrap();
        let snapshot = mediator.engine().snapshot();
        assert_eq!(snapshot.version(), "1.0.0");
        assert!(!snapshot.mandatory_documents("payment_delay").is_empty());
    }
}
