use crate::config::ExposurePolicy;
use crate::resolve::{EffectiveBinding, ResolvedPlan};
use serde::{Deserialize, Serialize};
use stackplan_schema::{ProfileName, ServiceName, ServiceSpec};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Network exposure of the generated stack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExposureMode {
    /// Every declared binding is published.
    #[default]
    Private,
    /// Only the reverse proxy's entry ports are published.
    Public,
}

impl ExposureMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Public => "public",
        }
    }
}

impl fmt::Display for ExposureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExposureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "private" => Ok(Self::Private),
            "public" => Ok(Self::Public),
            other => Err(format!(
                "unknown exposure mode '{other}' (expected private or public)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedService {
    pub name: ServiceName,
    pub spec: ServiceSpec,
    /// Bindings that will be published on the host.
    pub bindings: Vec<EffectiveBinding>,
    /// Declared bindings held back by the exposure mode.
    pub withheld: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedSet {
    pub profile: ProfileName,
    pub mode: ExposureMode,
    pub project_name: String,
    pub proxy_service: Option<ServiceName>,
    /// Ordered by service name.
    pub services: Vec<PlannedService>,
}

impl PlannedSet {
    pub fn get(&self, name: &str) -> Option<&PlannedService> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn published_bindings(&self) -> usize {
        self.services.iter().map(|s| s.bindings.len()).sum()
    }
}

/// Applies an [`ExposureMode`] to a resolved plan.
#[derive(Debug, Clone)]
pub struct ExposurePlanner {
    entry_ports: BTreeSet<u16>,
}

impl ExposurePlanner {
    pub fn new(policy: &ExposurePolicy) -> Self {
        Self {
            entry_ports: policy.public_entry_ports.clone(),
        }
    }

    /// Keep only what `mode` allows on the host. The manifest is never touched;
    /// the returned set is a fresh copy.
    ///
    /// In public mode only the proxy's entry ports survive. The proxy is
    /// `global.proxy_service` when set, otherwise any reverse-proxied service.
    pub fn plan(&self, resolved: &ResolvedPlan, mode: ExposureMode) -> PlannedSet {
        let is_entry = |name: &ServiceName| {
            resolved
                .proxy_service
                .as_ref()
                .is_none_or(|proxy| proxy == name)
        };
        let services = resolved
            .services
            .iter()
            .map(|service| {
                let bindings: Vec<EffectiveBinding> = match mode {
                    ExposureMode::Private => service.bindings.clone(),
                    ExposureMode::Public
                        if service.spec.reverse_proxy && is_entry(&service.name) =>
                    {
                        service
                            .bindings
                            .iter()
                            .filter(|b| self.entry_ports.contains(&b.container_port))
                            .copied()
                            .collect()
                    }
                    ExposureMode::Public => Vec::new(),
                };
                let withheld = service.bindings.len() - bindings.len();
                if withheld > 0 {
                    debug!("{mode} exposure withholds {withheld} binding(s) of {}", service.name);
                }
                PlannedService {
                    name: service.name.clone(),
                    spec: service.spec.clone(),
                    bindings,
                    withheld,
                }
            })
            .collect();

        PlannedSet {
            profile: resolved.profile.clone(),
            mode,
            project_name: resolved.project_name.clone(),
            proxy_service: resolved.proxy_service.clone(),
            services,
        }
    }
}

/// Plan with the default entry ports (80 and 443).
pub fn plan(resolved: &ResolvedPlan, mode: ExposureMode) -> PlannedSet {
    ExposurePlanner::new(&ExposurePolicy::default()).plan(resolved, mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::resolve;
    use stackplan_schema::{parse_manifest_str, ManifestFormat};

    fn resolved() -> ResolvedPlan {
        let manifest = parse_manifest_str(
            r#"{
  "services": {
    "app": {
      "enabled": true,
      "reverse_proxy": false,
      "profiles": ["all"],
      "ports": [{ "host_port": 3000, "container_port": 3000 }]
    },
    "proxy": {
      "enabled": true,
      "reverse_proxy": true,
      "profiles": ["all"],
      "ports": [
        { "host_ip": "0.0.0.0", "host_port": 80, "container_port": 80 },
        { "host_ip": "0.0.0.0", "host_port": 443, "container_port": 443 },
        { "host_port": 2019, "container_port": 2019 }
      ]
    },
    "ui": {
      "enabled": true,
      "reverse_proxy": true,
      "profiles": ["all"],
      "ports": [{ "host_port": 8080, "container_port": 8080 }]
    }
  }
}"#,
            ManifestFormat::Json,
        )
        .unwrap();
        resolve(&manifest, "all").unwrap()
    }

    #[test]
    fn private_passes_everything_through() {
        let r = resolved();
        let planned = plan(&r, ExposureMode::Private);
        assert_eq!(planned.published_bindings(), 5);
        assert!(planned.services.iter().all(|s| s.withheld == 0));
    }

    #[test]
    fn public_keeps_only_proxy_entry_ports() {
        let r = resolved();
        let planned = plan(&r, ExposureMode::Public);
        let proxy = planned.get("proxy").unwrap();
        let ports: Vec<u16> = proxy.bindings.iter().map(|b| b.container_port).collect();
        assert_eq!(ports, vec![80, 443]);
        assert_eq!(proxy.withheld, 1);
        assert!(planned.get("ui").unwrap().bindings.is_empty());
    }

    #[test]
    fn public_never_binds_non_proxy_services() {
        let r = resolved();
        let planned = plan(&r, ExposureMode::Public);
        for service in &planned.services {
            if !service.spec.reverse_proxy {
                assert!(service.bindings.is_empty(), "{}", service.name);
            }
        }
    }

    #[test]
    fn public_keeps_services_in_the_set() {
        let r = resolved();
        let planned = plan(&r, ExposureMode::Public);
        assert_eq!(planned.services.len(), r.services.len());
    }

    fn resolved_with_proxy_service() -> ResolvedPlan {
        let manifest = parse_manifest_str(
            r#"{
  "global": { "proxy_service": "caddy" },
  "services": {
    "caddy": {
      "enabled": true,
      "reverse_proxy": true,
      "ports": [{ "host_ip": "0.0.0.0", "host_port": 80, "container_port": 80 }]
    },
    "portal": {
      "enabled": true,
      "reverse_proxy": true,
      "ports": [{ "host_ip": "0.0.0.0", "host_port": 8000, "container_port": 80 }]
    }
  }
}"#,
            ManifestFormat::Json,
        )
        .unwrap();
        resolve(&manifest, "all").unwrap()
    }

    #[test]
    fn public_binds_only_the_named_proxy() {
        let planned = plan(&resolved_with_proxy_service(), ExposureMode::Public);
        assert_eq!(planned.get("caddy").unwrap().bindings.len(), 1);
        let portal = planned.get("portal").unwrap();
        assert!(portal.bindings.is_empty());
        assert_eq!(portal.withheld, 1);
    }

    #[test]
    fn private_still_binds_proxied_backends() {
        let planned = plan(&resolved_with_proxy_service(), ExposureMode::Private);
        assert_eq!(planned.get("portal").unwrap().bindings.len(), 1);
    }

    #[test]
    fn custom_entry_ports() {
        let r = resolved();
        let planner = ExposurePlanner::new(&ExposurePolicy {
            public_entry_ports: BTreeSet::from([8080]),
        });
        let planned = planner.plan(&r, ExposureMode::Public);
        assert_eq!(planned.get("ui").unwrap().bindings.len(), 1);
        assert!(planned.get("proxy").unwrap().bindings.is_empty());
    }

    #[test]
    fn planning_leaves_resolved_plan_untouched() {
        let r = resolved();
        let before = r.clone();
        let _ = plan(&r, ExposureMode::Public);
        assert_eq!(r, before);
    }

    #[test]
    fn mode_parses_and_displays() {
        assert_eq!("PUBLIC".parse::<ExposureMode>().unwrap(), ExposureMode::Public);
        assert_eq!(ExposureMode::Private.to_string(), "private");
        assert!("open".parse::<ExposureMode>().is_err());
    }
}
