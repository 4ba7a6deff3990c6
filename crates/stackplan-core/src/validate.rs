//! Manifest validation.
//!
//! Checks run in a fixed order (references, ports, dependency activation,
//! membership, plan shape) and never touch the filesystem, so the same
//! manifest and profile always produce the same diagnostics in the same order.

use crate::config::ValidationPolicy;
use crate::diagnostics::{
    BindingKey, DeclaredBy, Diagnostic, DiagnosticKind, Diagnostics, InactiveReason,
};
use crate::resolve::{active_services, is_known_profile, EffectiveBinding};
use stackplan_schema::{Manifest, ProfileName, ServiceName, ServiceSpec, ALL_PROFILES};
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    policy: ValidationPolicy,
}

impl Validator {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self { policy }
    }

    /// Validate `manifest` for one profile, or for every defined profile when
    /// `profile` is `None` (every enabled service if none are defined).
    pub fn validate(&self, manifest: &Manifest, profile: Option<&str>) -> Diagnostics {
        let mut diags = Diagnostics::new();
        check_references(manifest, &mut diags);

        let scopes: Vec<ProfileName> = match profile {
            Some(p) if is_known_profile(manifest, p) => vec![ProfileName::new(p)],
            Some(p) => {
                diags.push(Diagnostic::error(DiagnosticKind::UnknownProfile {
                    profile: ProfileName::new(p),
                }));
                Vec::new()
            }
            None if manifest.profiles.is_empty() => vec![ProfileName::new(ALL_PROFILES)],
            None => manifest.profiles.keys().cloned().collect(),
        };

        check_ports(manifest, &scopes, &mut diags);
        for scope in &scopes {
            self.check_dependencies(manifest, scope, &mut diags);
        }
        for scope in &scopes {
            self.check_membership(manifest, scope, &mut diags);
        }
        check_plan_shape(manifest, &scopes, &mut diags);
        diags
    }

    /// Only the fatal reference checks; used to gate resolution.
    pub fn references(&self, manifest: &Manifest) -> Diagnostics {
        let mut diags = Diagnostics::new();
        check_references(manifest, &mut diags);
        diags
    }

    fn check_dependencies(
        &self,
        manifest: &Manifest,
        scope: &ProfileName,
        diags: &mut Diagnostics,
    ) {
        let active: BTreeSet<&ServiceName> =
            active_services(manifest, scope).map(|(name, _)| name).collect();
        for (name, spec) in active_services(manifest, scope) {
            for dependency in &spec.depends_on {
                let Some(dep_spec) = manifest.service(dependency) else {
                    continue;
                };
                if active.contains(dependency) {
                    continue;
                }
                let reason = if dep_spec.enabled {
                    InactiveReason::NotInProfile
                } else {
                    InactiveReason::Disabled
                };
                diags.push(Diagnostic::new(
                    self.policy.inactive_dependency,
                    DiagnosticKind::InactiveDependency {
                        service: name.clone(),
                        dependency: dependency.clone(),
                        reason,
                        profile: scope.clone(),
                    },
                ));
            }
        }
    }

    fn check_membership(&self, manifest: &Manifest, scope: &ProfileName, diags: &mut Diagnostics) {
        let Some(profile) = manifest.profile(scope) else {
            return;
        };
        if profile.included_services.is_empty() {
            return;
        }
        for (name, spec) in &manifest.services {
            let declares = spec.profiles.contains(scope);
            let listed = profile.included_services.contains(name);
            let declared_by = if declares && !listed {
                DeclaredBy::Service
            } else if listed
                && !declares
                && !spec.profiles.is_empty()
                && !spec.profiles.contains(ALL_PROFILES)
            {
                DeclaredBy::Profile
            } else {
                continue;
            };
            diags.push(Diagnostic::new(
                self.policy.membership_disagreement,
                DiagnosticKind::MembershipDisagreement {
                    profile: scope.clone(),
                    service: name.clone(),
                    declared_by,
                },
            ));
        }
    }
}

/// Validate with the default policy.
pub fn validate(manifest: &Manifest, profile: Option<&str>) -> Diagnostics {
    Validator::default().validate(manifest, profile)
}

fn check_references(manifest: &Manifest, diags: &mut Diagnostics) {
    for (name, spec) in &manifest.services {
        for dependency in &spec.depends_on {
            if !manifest.services.contains_key(dependency) {
                diags.push(Diagnostic::error(DiagnosticKind::UnknownDependency {
                    service: name.clone(),
                    dependency: dependency.clone(),
                }));
            }
        }
    }
    for (profile, spec) in &manifest.profiles {
        for service in &spec.included_services {
            if !manifest.services.contains_key(service) {
                diags.push(Diagnostic::error(DiagnosticKind::UnknownProfileMember {
                    profile: profile.clone(),
                    service: service.clone(),
                }));
            }
        }
    }
    if let Some(proxy) = &manifest.global.proxy_service {
        if !manifest.services.contains_key(proxy) {
            diags.push(Diagnostic::error(DiagnosticKind::UnknownProxyService {
                service: proxy.clone(),
            }));
        }
    }
    for (name, spec) in &manifest.services {
        for profile in &spec.profiles {
            if !profile.is_all() && !manifest.profiles.contains_key(profile) {
                diags.push(Diagnostic::warning(DiagnosticKind::UnknownServiceProfile {
                    service: name.clone(),
                    profile: profile.clone(),
                }));
            }
        }
    }
}

/// Keys bound more than once among `services`, with the services binding them.
fn collisions<'m>(
    services: impl Iterator<Item = (&'m ServiceName, &'m ServiceSpec)>,
    default_ip: IpAddr,
) -> Vec<(BindingKey, Vec<ServiceName>)> {
    let mut owners: BTreeMap<BindingKey, Vec<ServiceName>> = BTreeMap::new();
    for (name, spec) in services {
        for port in &spec.ports {
            let key = EffectiveBinding::resolve(port, default_ip).key();
            owners.entry(key).or_default().push(name.clone());
        }
    }
    owners
        .into_iter()
        .filter(|(_, names)| names.len() > 1)
        .map(|(key, mut names)| {
            names.dedup();
            (key, names)
        })
        .collect()
}

fn check_ports(manifest: &Manifest, scopes: &[ProfileName], diags: &mut Diagnostics) {
    let default_ip = manifest.global.default_host_ip;

    let mut fatal = Vec::new();
    let mut reported = BTreeSet::new();
    for scope in scopes {
        for (key, services) in collisions(active_services(manifest, scope), default_ip) {
            reported.insert((key, services.clone()));
            fatal.push(Diagnostic::error(DiagnosticKind::PortConflict {
                key,
                services,
                profile: Some(scope.clone()),
            }));
        }
    }

    // Manifest-wide scan, enabled or not: conflicts that would surface once a
    // service is switched on or a profile changes.
    for (key, services) in collisions(manifest.services.iter(), default_ip) {
        if reported.contains(&(key, services.clone())) {
            continue;
        }
        diags.push(Diagnostic::warning(DiagnosticKind::PortConflict {
            key,
            services,
            profile: None,
        }));
    }
    diags.extend(fatal);
}

fn check_plan_shape(manifest: &Manifest, scopes: &[ProfileName], diags: &mut Diagnostics) {
    let proxy = manifest.global.proxy_service.as_ref();
    for (name, spec) in manifest.enabled_services() {
        if spec.reverse_proxy && spec.ports.is_empty() && proxy != Some(name) {
            diags.push(Diagnostic::warning(DiagnosticKind::ProxyWithoutPort {
                service: name.clone(),
            }));
        }
    }
    for scope in scopes {
        if active_services(manifest, scope).next().is_none() {
            diags.push(Diagnostic::warning(DiagnosticKind::EmptyPlan {
                profile: scope.clone(),
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;
    use stackplan_schema::{parse_manifest_str, ManifestFormat};

    fn parse(json: &str) -> Manifest {
        parse_manifest_str(json, ManifestFormat::Json).unwrap()
    }

    fn kinds(diags: &Diagnostics) -> Vec<&'static str> {
        diags.iter().map(|d| d.kind.category()).collect()
    }

    #[test]
    fn clean_manifest_has_no_diagnostics() {
        let m = parse(
            r#"{
  "services": {
    "db": { "enabled": true, "profiles": ["all"], "ports": [{ "host_port": 5432, "container_port": 5432 }] },
    "app": { "enabled": true, "profiles": ["all"], "depends_on": ["db"], "ports": [{ "host_port": 3000, "container_port": 3000 }] }
  },
  "profiles": { "default": {} }
}"#,
        );
        let diags = validate(&m, Some("default"));
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn unknown_dependency_is_fatal() {
        let m = parse(r#"{ "services": { "app": { "enabled": true, "depends_on": ["ghost"] } } }"#);
        let diags = validate(&m, None);
        assert!(diags.has_fatal());
        assert!(diags.iter().any(|d| matches!(
            &d.kind,
            DiagnosticKind::UnknownDependency { service, dependency }
                if service == "app" && dependency == "ghost"
        )));
    }

    #[test]
    fn unknown_profile_member_is_fatal() {
        let m = parse(
            r#"{ "services": { "a": { "enabled": true } }, "profiles": { "cpu": { "included_services": ["a", "zz"] } } }"#,
        );
        let diags = validate(&m, Some("cpu"));
        let fatal: Vec<_> = diags.fatal().collect();
        assert_eq!(fatal.len(), 1);
        assert!(matches!(
            &fatal[0].kind,
            DiagnosticKind::UnknownProfileMember { profile, service }
                if profile == "cpu" && service == "zz"
        ));
    }

    #[test]
    fn unknown_proxy_service_is_fatal() {
        let m = parse(r#"{ "global": { "proxy_service": "caddy" }, "services": {} }"#);
        assert!(validate(&m, None).has_fatal());
    }

    #[test]
    fn unknown_requested_profile_is_fatal() {
        let m = parse(r#"{ "services": { "a": { "enabled": true } } }"#);
        let diags = validate(&m, Some("gpu"));
        assert!(diags.has_fatal());
        assert_eq!(kinds(&diags), vec!["reference"]);
    }

    #[test]
    fn undeclared_service_profile_is_a_warning() {
        let m = parse(
            r#"{ "services": { "a": { "enabled": true, "profiles": ["cpu", "gpu-amd"] } }, "profiles": { "cpu": {} } }"#,
        );
        let diags = validate(&m, Some("cpu"));
        assert!(!diags.has_fatal());
        assert!(diags.iter().any(|d| matches!(
            &d.kind,
            DiagnosticKind::UnknownServiceProfile { profile, .. } if profile == "gpu-amd"
        )));
    }

    #[test]
    fn port_conflict_in_plan_names_both_services() {
        let m = parse(
            r#"{
  "services": {
    "a": { "enabled": true, "profiles": ["default"], "ports": [{ "host_ip": "127.0.0.1", "host_port": 5678, "container_port": 5678 }] },
    "b": { "enabled": true, "profiles": ["default"], "ports": [{ "host_ip": "127.0.0.1", "host_port": 5678, "container_port": 9000 }] }
  },
  "profiles": { "default": {} }
}"#,
        );
        let diags = validate(&m, Some("default"));
        let fatal: Vec<_> = diags.fatal().collect();
        assert_eq!(fatal.len(), 1);
        match &fatal[0].kind {
            DiagnosticKind::PortConflict {
                key,
                services,
                profile,
            } => {
                assert_eq!(key.to_string(), "127.0.0.1:5678/tcp");
                assert_eq!(services, &vec![ServiceName::new("a"), ServiceName::new("b")]);
                assert_eq!(profile.as_deref(), Some("default"));
            }
            other => panic!("unexpected {other:?}"),
        }
        // Not repeated as a manifest-wide warning.
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn omitted_host_ip_collides_with_explicit_default() {
        let m = parse(
            r#"{
  "global": { "default_host_ip": "127.0.0.1" },
  "services": {
    "a": { "enabled": true, "ports": [{ "host_port": 8080, "container_port": 80 }] },
    "b": { "enabled": true, "ports": [{ "host_ip": "127.0.0.1", "host_port": 8080, "container_port": 81 }] }
  }
}"#,
        );
        assert!(validate(&m, None).has_fatal());
    }

    #[test]
    fn different_protocol_or_ip_does_not_conflict() {
        let m = parse(
            r#"{
  "services": {
    "a": { "enabled": true, "ports": [{ "host_port": 443, "container_port": 443 }] },
    "b": { "enabled": true, "ports": [{ "host_port": 443, "container_port": 443, "protocol": "udp" }] },
    "c": { "enabled": true, "ports": [{ "host_ip": "0.0.0.0", "host_port": 443, "container_port": 443 }] }
  }
}"#,
        );
        assert!(validate(&m, None).is_empty());
    }

    #[test]
    fn conflict_with_disabled_service_is_a_warning() {
        let m = parse(
            r#"{
  "services": {
    "a": { "enabled": true, "ports": [{ "host_port": 9000, "container_port": 9000 }] },
    "b": { "enabled": false, "ports": [{ "host_port": 9000, "container_port": 9000 }] }
  }
}"#,
        );
        let diags = validate(&m, None);
        assert!(!diags.has_fatal());
        assert!(diags.iter().any(|d| matches!(
            &d.kind,
            DiagnosticKind::PortConflict { profile: None, .. }
        )));
    }

    #[test]
    fn conflict_across_profiles_is_only_a_warning() {
        let m = parse(
            r#"{
  "services": {
    "cpu-llm": { "enabled": true, "profiles": ["cpu"], "ports": [{ "host_port": 11434, "container_port": 11434 }] },
    "gpu-llm": { "enabled": true, "profiles": ["gpu"], "ports": [{ "host_port": 11434, "container_port": 11434 }] }
  },
  "profiles": { "cpu": {}, "gpu": {} }
}"#,
        );
        let diags = validate(&m, None);
        assert!(!diags.has_fatal(), "{diags:?}");
        assert_eq!(diags.warnings().count(), 1);
    }

    #[test]
    fn duplicate_binding_within_one_service_conflicts() {
        let m = parse(
            r#"{ "services": { "a": { "enabled": true, "ports": [
  { "host_port": 7000, "container_port": 1 },
  { "host_port": 7000, "container_port": 2 }
] } } }"#,
        );
        let diags = validate(&m, None);
        assert!(diags.has_fatal());
        assert_eq!(diags.fatal().next().unwrap().services().len(), 1);
    }

    #[test]
    fn inactive_dependency_is_a_warning_by_default() {
        let m = parse(
            r#"{
  "services": {
    "app": { "enabled": true, "profiles": ["cpu"], "depends_on": ["db", "cache"] },
    "db": { "enabled": false, "profiles": ["cpu"] },
    "cache": { "enabled": true, "profiles": ["gpu"] }
  },
  "profiles": { "cpu": {}, "gpu": {} }
}"#,
        );
        let diags = validate(&m, Some("cpu"));
        assert!(!diags.has_fatal());
        let reasons: Vec<InactiveReason> = diags
            .iter()
            .filter_map(|d| match &d.kind {
                DiagnosticKind::InactiveDependency { reason, .. } => Some(*reason),
                _ => None,
            })
            .collect();
        assert_eq!(
            reasons,
            vec![InactiveReason::NotInProfile, InactiveReason::Disabled]
        );
    }

    #[test]
    fn inactive_dependency_severity_follows_policy() {
        let m = parse(
            r#"{ "services": { "app": { "enabled": true, "depends_on": ["db"] }, "db": { "enabled": false } } }"#,
        );
        let strict = Validator::new(ValidationPolicy {
            inactive_dependency: Severity::Error,
            ..ValidationPolicy::default()
        });
        assert!(strict.validate(&m, None).has_fatal());
        assert!(!validate(&m, None).has_fatal());
    }

    #[test]
    fn membership_disagreement_is_surfaced() {
        let m = parse(
            r#"{
  "services": {
    "a": { "enabled": true, "profiles": ["cpu"] },
    "b": { "enabled": true, "profiles": ["gpu"] },
    "c": { "enabled": true, "profiles": ["all"] },
    "d": { "enabled": true }
  },
  "profiles": {
    "cpu": { "included_services": ["b", "c", "d"] },
    "gpu": {}
  }
}"#,
        );
        let diags = validate(&m, Some("cpu"));
        let found: Vec<(String, DeclaredBy)> = diags
            .iter()
            .filter_map(|d| match &d.kind {
                DiagnosticKind::MembershipDisagreement {
                    service,
                    declared_by,
                    ..
                } => Some((service.to_string(), *declared_by)),
                _ => None,
            })
            .collect();
        assert_eq!(
            found,
            vec![
                ("a".to_owned(), DeclaredBy::Service),
                ("b".to_owned(), DeclaredBy::Profile)
            ]
        );
        assert!(!diags.has_fatal());
    }

    #[test]
    fn proxied_service_without_ports_warns() {
        let m = parse(r#"{ "services": { "ui": { "enabled": true, "reverse_proxy": true } } }"#);
        let diags = validate(&m, None);
        assert_eq!(kinds(&diags), vec!["plan"]);
    }

    #[test]
    fn empty_plan_warns() {
        let m = parse(
            r#"{ "services": { "a": { "enabled": false, "profiles": ["cpu"] } }, "profiles": { "cpu": {} } }"#,
        );
        let diags = validate(&m, Some("cpu"));
        assert!(diags.iter().any(|d| matches!(&d.kind, DiagnosticKind::EmptyPlan { .. })));
    }

    #[test]
    fn validation_is_deterministic() {
        let m = parse(
            r#"{
  "services": {
    "a": { "enabled": true, "depends_on": ["x", "y"], "ports": [{ "host_port": 1, "container_port": 1 }] },
    "b": { "enabled": true, "ports": [{ "host_port": 1, "container_port": 1 }] }
  }
}"#,
        );
        assert_eq!(validate(&m, None), validate(&m, None));
    }
}
