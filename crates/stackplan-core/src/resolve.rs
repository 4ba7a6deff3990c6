use crate::diagnostics::BindingKey;
use crate::CoreError;
use serde::Serialize;
use stackplan_schema::{
    Manifest, PortBinding, ProfileName, Protocol, ServiceName, ServiceSpec, ALL_PROFILES,
};
use std::fmt;
use std::net::IpAddr;

/// How a service came to belong to a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Membership {
    /// The service lists the profile by name.
    ServiceDeclared,
    /// The service lists the `all` sentinel, or `all` was requested and is not
    /// defined as a profile of its own.
    Wildcard,
    /// The profile lists the service in `included_services`.
    ProfileListed,
}

/// A port binding with the host address default already applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EffectiveBinding {
    pub host_ip: IpAddr,
    pub host_port: u16,
    pub container_port: u16,
    pub protocol: Protocol,
}

impl EffectiveBinding {
    pub fn resolve(binding: &PortBinding, default_host_ip: IpAddr) -> Self {
        Self {
            host_ip: binding.effective_host_ip(default_host_ip),
            host_port: binding.host_port,
            container_port: binding.container_port,
            protocol: binding.protocol,
        }
    }

    pub fn key(&self) -> BindingKey {
        BindingKey {
            host_ip: self.host_ip,
            host_port: self.host_port,
            protocol: self.protocol,
        }
    }
}

/// Compose short syntax: `host_ip:host_port:container_port/protocol`.
impl fmt::Display for EffectiveBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.host_ip {
            IpAddr::V4(ip) => write!(f, "{ip}:")?,
            IpAddr::V6(ip) => write!(f, "[{ip}]:")?,
        }
        write!(
            f,
            "{}:{}/{}",
            self.host_port, self.container_port, self.protocol
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedService {
    pub name: ServiceName,
    pub spec: ServiceSpec,
    pub bindings: Vec<EffectiveBinding>,
}

/// Services that are enabled and belong to the requested profile.
///
/// Built from a manifest snapshot and owned by the caller; nothing in it points
/// back into the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPlan {
    pub profile: ProfileName,
    pub project_name: String,
    pub proxy_service: Option<ServiceName>,
    /// Ordered by service name.
    pub services: Vec<ResolvedService>,
}

impl ResolvedPlan {
    pub fn names(&self) -> Vec<&ServiceName> {
        self.services.iter().map(|s| &s.name).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedService> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// True if `profile` can be resolved: it is defined, or it is the `all` sentinel.
pub fn is_known_profile(manifest: &Manifest, profile: &str) -> bool {
    profile == ALL_PROFILES || manifest.profiles.contains_key(profile)
}

/// The one rule deciding whether a service belongs to a profile.
///
/// Ignores the enabled flag; see [`active_services`] for the combined filter.
pub fn membership(
    manifest: &Manifest,
    profile: &str,
    name: &ServiceName,
    spec: &ServiceSpec,
) -> Option<Membership> {
    if profile == ALL_PROFILES && !manifest.profiles.contains_key(ALL_PROFILES) {
        return Some(Membership::Wildcard);
    }
    if spec.profiles.contains(profile) {
        return Some(Membership::ServiceDeclared);
    }
    if spec.profiles.contains(ALL_PROFILES) {
        return Some(Membership::Wildcard);
    }
    manifest
        .profile(profile)
        .filter(|p| p.included_services.contains(name))
        .map(|_| Membership::ProfileListed)
}

/// Enabled services belonging to `profile`, in name order.
pub fn active_services<'m>(
    manifest: &'m Manifest,
    profile: &'m str,
) -> impl Iterator<Item = (&'m ServiceName, &'m ServiceSpec)> + 'm {
    manifest
        .enabled_services()
        .filter(move |(name, spec)| membership(manifest, profile, name, spec).is_some())
}

pub fn resolve(manifest: &Manifest, profile: &str) -> Result<ResolvedPlan, CoreError> {
    if !is_known_profile(manifest, profile) {
        return Err(CoreError::UnknownProfile(profile.to_owned()));
    }
    let default_ip = manifest.global.default_host_ip;
    let services = active_services(manifest, profile)
        .map(|(name, spec)| ResolvedService {
            name: name.clone(),
            spec: spec.clone(),
            bindings: spec
                .ports
                .iter()
                .map(|p| EffectiveBinding::resolve(p, default_ip))
                .collect(),
        })
        .collect();

    Ok(ResolvedPlan {
        profile: ProfileName::new(profile),
        project_name: manifest.global.project_name.clone(),
        proxy_service: manifest.global.proxy_service.clone(),
        services,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackplan_schema::{parse_manifest_str, ManifestFormat};

    fn manifest() -> Manifest {
        parse_manifest_str(
            r#"{
  "global": { "default_host_ip": "127.0.0.1" },
  "services": {
    "a": { "enabled": true, "profiles": ["cpu"], "ports": [{ "host_port": 5678, "container_port": 5678 }] },
    "b": { "enabled": true, "profiles": ["gpu"] },
    "c": { "enabled": true, "profiles": ["all"] },
    "d": { "enabled": false, "profiles": ["all"] },
    "e": { "enabled": true },
    "f": { "enabled": true, "ports": [{ "host_ip": "${default_host_ip}", "host_port": 1, "container_port": 2, "protocol": "udp" }] }
  },
  "profiles": {
    "cpu": { "included_services": ["e"] },
    "gpu": {}
  }
}"#,
            ManifestFormat::Json,
        )
        .unwrap()
    }

    #[test]
    fn includes_declared_wildcard_and_listed_members() {
        let m = manifest();
        let plan = resolve(&m, "cpu").unwrap();
        let names: Vec<&str> = plan.names().into_iter().map(ServiceName::as_str).collect();
        assert_eq!(names, vec!["a", "c", "e"]);
    }

    #[test]
    fn excludes_disabled_services() {
        let m = manifest();
        let plan = resolve(&m, "gpu").unwrap();
        assert!(!plan.contains("d"));
        assert!(plan.contains("b"));
        assert!(plan.contains("c"));
    }

    #[test]
    fn undefined_all_selects_every_enabled_service() {
        let m = manifest();
        let plan = resolve(&m, "all").unwrap();
        let names: Vec<&str> = plan.names().into_iter().map(ServiceName::as_str).collect();
        assert_eq!(names, vec!["a", "b", "c", "e", "f"]);
    }

    #[test]
    fn unknown_profile_fails() {
        let m = manifest();
        assert!(matches!(
            resolve(&m, "tpu"),
            Err(CoreError::UnknownProfile(p)) if p == "tpu"
        ));
    }

    #[test]
    fn resolution_is_deterministic() {
        let m = manifest();
        assert_eq!(resolve(&m, "cpu").unwrap(), resolve(&m, "cpu").unwrap());
    }

    #[test]
    fn applies_default_host_ip_at_resolution_time() {
        let mut m = manifest();
        let before = resolve(&m, "cpu").unwrap();
        assert_eq!(before.get("a").unwrap().bindings[0].host_ip.to_string(), "127.0.0.1");

        m.global.default_host_ip = "10.0.0.2".parse().unwrap();
        let after = resolve(&m, "cpu").unwrap();
        assert_eq!(after.get("a").unwrap().bindings[0].host_ip.to_string(), "10.0.0.2");
        // The manifest itself still records the omission.
        assert_eq!(m.service("a").unwrap().ports[0].host_ip, None);
    }

    #[test]
    fn placeholder_host_ip_follows_default() {
        let mut m = manifest();
        m.global.default_host_ip = "192.168.1.10".parse().unwrap();
        let plan = resolve(&m, "all").unwrap();
        let binding = plan.get("f").unwrap().bindings[0];
        assert_eq!(binding.to_string(), "192.168.1.10:1:2/udp");
    }

    #[test]
    fn membership_reports_source() {
        let m = manifest();
        let a = ServiceName::new("a");
        let c = ServiceName::new("c");
        let e = ServiceName::new("e");
        assert_eq!(
            membership(&m, "cpu", &a, m.service("a").unwrap()),
            Some(Membership::ServiceDeclared)
        );
        assert_eq!(
            membership(&m, "cpu", &c, m.service("c").unwrap()),
            Some(Membership::Wildcard)
        );
        assert_eq!(
            membership(&m, "cpu", &e, m.service("e").unwrap()),
            Some(Membership::ProfileListed)
        );
        assert_eq!(membership(&m, "gpu", &e, m.service("e").unwrap()), None);
    }

    #[test]
    fn ipv6_binding_is_bracketed() {
        let binding = EffectiveBinding {
            host_ip: "::1".parse().unwrap(),
            host_port: 8080,
            container_port: 80,
            protocol: Protocol::Tcp,
        };
        assert_eq!(binding.to_string(), "[::1]:8080:80/tcp");
    }

    #[test]
    fn plan_does_not_alias_manifest() {
        let mut m = manifest();
        let plan = resolve(&m, "cpu").unwrap();
        m.services.get_mut("a").unwrap().description = "changed".to_owned();
        assert_eq!(plan.get("a").unwrap().spec.description, "");
    }
}
