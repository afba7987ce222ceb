//! Configuration management for Bastion
//!
//! Engine policy is loaded from several sources, highest precedence first:
//! 1. Environment variables (`BASTION_` prefix, `__` between sections)
//! 2. bastion.local.toml (local overrides, not committed)
//! 3. bastion.toml (project config)
//! 4. ~/.config/bastion/config.toml (user defaults)
//! 5. Built-in defaults
//!
//! Only engine knobs live here. Users, roles and permissions belong to the
//! directory store.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main Bastion configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BastionConfig {
    pub session: SessionConfig,
    pub hierarchy: HierarchyConfig,
    pub delegation: DelegationConfig,
    pub audit: AuditConfig,
    pub directory: DirectoryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Activate every assigned role when the caller names none.
    pub activate_all_roles: bool,
    /// Re-run temporal checks on active roles before each access decision.
    pub revalidate_on_access: bool,
    /// Check the user's own constraint for trusted sessions too.
    pub trusted_requires_user_constraint: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            activate_all_roles: true,
            revalidate_on_access: true,
            trusted_requires_user_constraint: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    /// Longest allowed parent chain in any hierarchy.
    pub max_depth: usize,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self { max_depth: 64 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelegationConfig {
    /// When false every delegated administration check is refused.
    pub enabled: bool,
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Emit a tracing event for every access decision.
    pub enabled: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Journal file for the in-memory directory; volatile when unset.
    pub journal: Option<PathBuf>,
}

impl BastionConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Configuration for tests: no audit events, volatile directory.
    pub fn testing() -> Self {
        Self {
            audit: AuditConfig { enabled: false },
            ..Default::default()
        }
    }

    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();

        if let Some(journal) = &self.directory.journal {
            if journal.is_relative() {
                self.directory.journal = Some(base.join(journal));
            }
        }
    }

    /// Rejects values the engines cannot run with.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.hierarchy.max_depth == 0 {
            return Err(ConfigError::ValidationError(
                "hierarchy.max_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BastionConfig::default();
        assert!(config.session.activate_all_roles);
        assert!(config.session.revalidate_on_access);
        assert_eq!(config.hierarchy.max_depth, 64);
        assert!(config.delegation.enabled);
        assert!(config.audit.enabled);
        assert!(config.directory.journal.is_none());
    }

    #[test]
    fn test_testing_config() {
        let config = BastionConfig::testing();
        assert!(!config.audit.enabled);
        assert!(config.session.activate_all_roles);
    }

    #[test]
    fn test_zero_depth_is_invalid() {
        let mut config = BastionConfig::default();
        config.hierarchy.max_depth = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_path_resolution() {
        let mut config = BastionConfig::default();
        config.directory.journal = Some(PathBuf::from("data/directory.jsonl"));
        config.resolve_paths("/srv/bastion");

        assert_eq!(
            config.directory.journal,
            Some(PathBuf::from("/srv/bastion/data/directory.jsonl"))
        );
    }

    #[test]
    fn test_toml_round_trip() {
        let config = BastionConfig::testing();
        let text = toml::to_string(&config).expect("serialize");
        let back: BastionConfig = toml::from_str(&text).expect("deserialize");
        assert_eq!(back, config);
    }
}
