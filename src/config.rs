//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Config file: `--config <path>`, else `$XDG_CONFIG_HOME/taxonomy/taxonomy.toml`
//! 3. Environment variables: `TAXONOMY_*` prefix

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::{Action, PermissionPolicy, Policy, Role};

/// Permission table overrides, one role list per action.
///
/// Lists are applied onto the built-in table with union semantics;
/// an entry `"!role"` revokes that role's grant.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PolicyConfig {
    pub create: Vec<String>,
    pub update: Vec<String>,
    pub delete: Vec<String>,
    #[serde(rename = "move")]
    pub move_nodes: Vec<String>,
}

impl PolicyConfig {
    fn overrides_for(&self, action: Action) -> &[String] {
        match action {
            Action::Create => &self.create,
            Action::Update => &self.update,
            Action::Delete => &self.delete,
            Action::Move => &self.move_nodes,
        }
    }

    pub fn is_empty(&self) -> bool {
        Action::ALL
            .into_iter()
            .all(|action| self.overrides_for(action).is_empty())
    }

    /// Merge role names with union semantics and negation support.
    ///
    /// - Items from overlay are added to base
    /// - Items prefixed with `!` remove the corresponding item from the result
    /// - Duplicates are de-duplicated
    ///
    /// # Examples
    /// ```ignore
    /// merge_roles(&[Admin], &["node_lead"])          // → [Admin, NodeLead]
    /// merge_roles(&[Admin, NodeManager], &["!admin"]) // → [NodeManager]
    /// ```
    pub fn merge_roles(base: &[Role], overlay: &[String]) -> Result<Vec<Role>, ApplicationError> {
        let mut result: BTreeSet<Role> = base.iter().copied().collect();

        for entry in overlay {
            let (negated, name) = match entry.strip_prefix('!') {
                Some(name) => (true, name),
                None => (false, entry.as_str()),
            };
            let role: Role = name.parse().map_err(|e| ApplicationError::Config {
                message: format!("policy: {e}"),
            })?;
            if negated {
                result.remove(&role);
            } else {
                result.insert(role);
            }
        }

        Ok(result.into_iter().collect())
    }

    /// Apply the overrides onto the built-in permission table.
    pub fn to_policy(&self) -> Result<PermissionPolicy, ApplicationError> {
        let defaults = PermissionPolicy::default();
        let mut policy = PermissionPolicy::default();
        for action in Action::ALL {
            let overlay = self.overrides_for(action);
            if overlay.is_empty() {
                continue;
            }
            let base: Vec<Role> = Role::ALL
                .into_iter()
                .filter(|role| defaults.allowed(*role, action))
                .collect();
            policy = policy.with_grant(action, Self::merge_roles(&base, overlay)?);
        }
        Ok(policy)
    }
}

/// Unified configuration for taxonomy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Node store document (default: ~/.taxonomy/taxonomy.toml)
    pub store_path: PathBuf,
    /// Caller role used when none is given on the command line
    pub role: Role,
    /// Permission table overrides
    pub policy: PolicyConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            role: Role::User,
            policy: PolicyConfig::default(),
        }
    }
}

/// Get the default store document (~/.taxonomy/taxonomy.toml).
fn default_store_path() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".taxonomy"))
        .unwrap_or_else(|| PathBuf::from("~/.taxonomy"))
        .join("taxonomy.toml")
}

/// Get the XDG config directory for taxonomy.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "taxonomy").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("taxonomy.toml"))
}

/// Expand `~`, `$VAR` and `${VAR}` in a path-like string.
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

impl Settings {
    /// Load settings with layered precedence.
    ///
    /// An explicit `config_file` must exist; the global file is optional.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut settings = match config_file {
            Some(path) => {
                if !path.exists() {
                    return Err(ApplicationError::Config {
                        message: format!("config file not found: {}", path.display()),
                    });
                }
                Self::from_file(path)?
            }
            None => match global_config_path() {
                Some(global) if global.exists() => Self::from_file(&global)?,
                _ => Self::default(),
            },
        };

        settings = Self::apply_env_overrides(settings)?;
        settings.expand_paths();
        Ok(settings)
    }

    /// Defaults overlaid with a single TOML file; environment is ignored.
    pub fn from_file(path: &Path) -> Result<Self, ApplicationError> {
        let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
            message: format!("read {}: {}", path.display(), e),
        })?;
        let mut settings: Self = toml::from_str(&content).map_err(|e| ApplicationError::Config {
            message: format!("parse {}: {}", path.display(), e),
        })?;
        settings.expand_paths();
        Ok(settings)
    }

    /// Apply TAXONOMY_* environment variables as explicit overrides.
    ///
    /// Env vars replace values (not merge) - they are explicit user overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let builder = Config::builder().add_source(
            Environment::with_prefix("TAXONOMY")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("policy.create")
                .with_list_parse_key("policy.update")
                .with_list_parse_key("policy.delete")
                .with_list_parse_key("policy.move")
                .try_parsing(true),
        );

        let config = builder.build().map_err(config_err)?;

        if let Ok(val) = config.get_string("store_path") {
            settings.store_path = PathBuf::from(val);
        }
        if let Ok(val) = config.get_string("role") {
            settings.role = val.parse().map_err(|e| ApplicationError::Config {
                message: format!("TAXONOMY_ROLE: {e}"),
            })?;
        }
        if let Ok(val) = config.get::<Vec<String>>("policy.create") {
            settings.policy.create = val;
        }
        if let Ok(val) = config.get::<Vec<String>>("policy.update") {
            settings.policy.update = val;
        }
        if let Ok(val) = config.get::<Vec<String>>("policy.delete") {
            settings.policy.delete = val;
        }
        if let Ok(val) = config.get::<Vec<String>>("policy.move") {
            settings.policy.move_nodes = val;
        }

        Ok(settings)
    }

    fn expand_paths(&mut self) {
        let expanded = expand_path(self.store_path.to_string_lossy().as_ref());
        self.store_path = PathBuf::from(expanded);
    }

    /// Effective permission policy: built-in table plus configured overrides.
    pub fn permission_policy(&self) -> Result<PermissionPolicy, ApplicationError> {
        self.policy.to_policy()
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# taxonomy configuration
#
# Locations (by precedence, lowest to highest):
#   File: ~/.config/taxonomy/taxonomy.toml or --config <path>
#   Env:  TAXONOMY_* environment variables (explicit overrides)
#         e.g. TAXONOMY_ROLE=admin, TAXONOMY_POLICY__DELETE=node_manager

# Node store document
# store_path = "~/.taxonomy/taxonomy.toml"

# Caller role when --role is not given: admin | node_manager | node_lead | user
# role = "user"

[policy]
# Role lists are merged onto the built-in table; "!role" revokes a grant.
#
#   action | admin | node_manager | node_lead | user
#   create |  yes  |     yes      |    no     |  no
#   update |  yes  |     yes      |    yes    |  no
#   delete |  yes  |     no       |    no     |  no
#   move   |  yes  |     yes      |    no     |  no
#
# delete = ["node_manager"]
# update = ["!node_lead"]
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_no_config_when_defaulting_then_user_role_and_home_store() {
        let settings = Settings::default();
        assert_eq!(settings.role, Role::User);
        assert!(settings.store_path.to_string_lossy().contains(".taxonomy"));
        assert!(settings.policy.is_empty());
    }

    #[test]
    fn given_tilde_in_store_path_when_expand_paths_then_expands_to_home() {
        let mut settings = Settings {
            store_path: PathBuf::from("~/data/taxonomy.toml"),
            ..Settings::default()
        };

        settings.expand_paths();

        assert!(
            !settings.store_path.to_string_lossy().starts_with('~'),
            "tilde should be expanded: {}",
            settings.store_path.display()
        );
    }

    #[test]
    fn test_merge_roles_union() {
        let result = PolicyConfig::merge_roles(&[Role::Admin], &["node_lead".to_string()]).unwrap();
        assert_eq!(result, vec![Role::Admin, Role::NodeLead]);
    }

    #[test]
    fn test_merge_roles_negation() {
        let result = PolicyConfig::merge_roles(
            &[Role::Admin, Role::NodeManager],
            &["!admin".to_string(), "node_manager".to_string()],
        )
        .unwrap();
        assert_eq!(result, vec![Role::NodeManager]);
    }

    #[test]
    fn test_merge_roles_unknown_role_is_config_error() {
        let err = PolicyConfig::merge_roles(&[], &["superuser".to_string()]).unwrap_err();
        assert!(matches!(err, ApplicationError::Config { .. }));
    }

    #[test]
    fn given_empty_overrides_then_policy_equals_default() {
        let policy = PolicyConfig::default().to_policy().unwrap();
        assert_eq!(policy, PermissionPolicy::default());
    }

    #[test]
    fn given_settings_when_serialized_then_template_keys_round_trip() {
        let settings = Settings::default();
        let toml = settings.to_toml().unwrap();
        let back: Settings = toml::from_str(&toml).unwrap();
        assert_eq!(back, settings);
    }
}
