use crate::diagnostics::Severity;
use crate::CoreError;
use serde::{Deserialize, Serialize};
use stackplan_schema::write_atomic;
use std::collections::BTreeSet;
use std::path::Path;

/// File name looked up next to the manifest when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "stackplan.toml";

/// Engine policy knobs. Everything has a default, so an empty file is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub validation: ValidationPolicy,
    #[serde(default)]
    pub exposure: ExposurePolicy,
    #[serde(default)]
    pub proxy: ProxySettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationPolicy {
    /// Severity when an active service depends on one outside the plan.
    #[serde(default = "warning")]
    pub inactive_dependency: Severity,
    /// Severity when service-declared and profile-declared membership disagree.
    #[serde(default = "warning")]
    pub membership_disagreement: Severity,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            inactive_dependency: Severity::Warning,
            membership_disagreement: Severity::Warning,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExposurePolicy {
    /// Container ports of the proxy that stay bound in public mode.
    #[serde(default = "default_entry_ports")]
    pub public_entry_ports: BTreeSet<u16>,
}

impl Default for ExposurePolicy {
    fn default() -> Self {
        Self {
            public_entry_ports: default_entry_ports(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxySettings {
    /// Variable holding the ACME contact address. Empty omits the options block.
    #[serde(default = "default_acme_email_env")]
    pub acme_email_env: String,
    /// Glob imported at the end of the routing document. Empty omits it.
    #[serde(default = "default_addons_import")]
    pub addons_import: String,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            acme_email_env: default_acme_email_env(),
            addons_import: default_addons_import(),
        }
    }
}

fn warning() -> Severity {
    Severity::Warning
}

fn default_entry_ports() -> BTreeSet<u16> {
    BTreeSet::from([80, 443])
}

fn default_acme_email_env() -> String {
    "LETSENCRYPT_EMAIL".to_owned()
}

fn default_addons_import() -> String {
    "/etc/caddy/addons/*.conf".to_owned()
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| CoreError::Config(format!("invalid config {}: {e}", path.display())))
    }

    /// Load `stackplan.toml` from `dir` if it exists, defaults otherwise.
    pub fn load_or_default(dir: &Path) -> Result<Self, CoreError> {
        let path = dir.join(DEFAULT_CONFIG_FILE);
        if path.is_file() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CoreError::Config(format!("cannot serialize config: {e}")))?;
        write_atomic(path, content.as_bytes()).map_err(|source| CoreError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    #[must_use]
    pub fn with_strict_dependencies(mut self) -> Self {
        self.validation.inactive_dependency = Severity::Error;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let config = EngineConfig::default();
        assert_eq!(config.validation.inactive_dependency, Severity::Warning);
        assert_eq!(config.validation.membership_disagreement, Severity::Warning);
        assert!(config.exposure.public_entry_ports.contains(&80));
        assert!(config.exposure.public_entry_ports.contains(&443));
        assert_eq!(config.proxy.acme_email_env, "LETSENCRYPT_EMAIL");
    }

    #[test]
    fn empty_file_yields_defaults() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn partial_file_overrides_only_given_keys() {
        let config: EngineConfig = toml::from_str(
            r#"
[validation]
inactive_dependency = "error"

[exposure]
public_entry_ports = [8443]
"#,
        )
        .unwrap();
        assert_eq!(config.validation.inactive_dependency, Severity::Error);
        assert_eq!(config.validation.membership_disagreement, Severity::Warning);
        assert_eq!(config.exposure.public_entry_ports, BTreeSet::from([8443]));
        assert_eq!(config.proxy, ProxySettings::default());
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(toml::from_str::<EngineConfig>("[validation]\nstrict = true\n").is_err());
    }

    #[test]
    fn config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        let config = EngineConfig::default().with_strict_dependencies();
        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), config);
        assert_eq!(EngineConfig::load_or_default(dir.path()).unwrap(), config);
    }

    #[test]
    fn load_or_default_without_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            EngineConfig::load_or_default(dir.path()).unwrap(),
            EngineConfig::default()
        );
    }
}
