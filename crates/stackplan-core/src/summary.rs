//! Read-only views over a manifest or plan, for listings and status screens.

use crate::expose::PlannedSet;
use serde::Serialize;
use stackplan_schema::{Manifest, ServiceName, ServiceSpec};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Every service grouped by category, both levels in name order.
pub fn services_by_category(
    manifest: &Manifest,
) -> BTreeMap<&str, Vec<(&ServiceName, &ServiceSpec)>> {
    let mut groups: BTreeMap<&str, Vec<_>> = BTreeMap::new();
    for (name, spec) in &manifest.services {
        groups.entry(spec.category.as_str()).or_default().push((name, spec));
    }
    groups
}

/// Service names of a plan grouped by category.
pub fn plan_by_category(planned: &PlannedSet) -> BTreeMap<&str, Vec<&ServiceName>> {
    let mut groups: BTreeMap<&str, Vec<_>> = BTreeMap::new();
    for service in &planned.services {
        groups
            .entry(service.spec.category.as_str())
            .or_default()
            .push(&service.name);
    }
    groups
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessUrl {
    pub service: ServiceName,
    pub url: String,
}

/// Where each reverse-proxied service of the plan can be reached directly
/// from the host, using its first published binding.
pub fn access_urls(planned: &PlannedSet) -> Vec<AccessUrl> {
    planned
        .services
        .iter()
        .filter(|s| s.spec.reverse_proxy)
        .filter(|s| planned.proxy_service.as_ref() != Some(&s.name))
        .filter_map(|s| {
            let binding = s.bindings.first()?;
            Some(AccessUrl {
                service: s.name.clone(),
                url: format!("http://{}:{}", host_label(binding.host_ip), binding.host_port),
            })
        })
        .collect()
}

fn host_label(ip: IpAddr) -> String {
    if ip.is_loopback() || ip.is_unspecified() {
        return "localhost".to_owned();
    }
    match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{v6}]"),
    }
}
