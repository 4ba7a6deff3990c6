use crate::atomic::write_atomic;
use crate::types::{HostIp, ProfileName, Protocol, ServiceName};
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    ParseJson(#[from] serde_json::Error),
    #[error("failed to parse manifest: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("failed to serialize manifest: {0}")]
    SerializeJson(serde_json::Error),
    #[error("failed to serialize manifest: {0}")]
    SerializeToml(#[from] toml::ser::Error),
    #[error("{kind} name must not be empty")]
    EmptyName { kind: &'static str },
    #[error("{kind} '{name}' must match {pattern}")]
    InvalidName {
        kind: &'static str,
        name: String,
        pattern: &'static str,
    },
    #[error("service '{service}' port {index}: {field} must be within 1-65535")]
    InvalidPort {
        service: String,
        index: usize,
        field: &'static str,
    },
    #[error("failed to write manifest {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// On-disk encoding of a manifest, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Json,
    Toml,
}

impl ManifestFormat {
    /// `.toml` files are TOML, everything else is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

/// The declarative service manifest: global settings, services and profiles.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub global: GlobalSettings,
    #[serde(deserialize_with = "unique_keys")]
    pub services: BTreeMap<ServiceName, ServiceSpec>,
    #[serde(default, deserialize_with = "unique_keys")]
    pub profiles: BTreeMap<ProfileName, ProfileSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GlobalSettings {
    #[serde(default = "default_project_name")]
    pub project_name: String,
    #[serde(default = "default_host_ip")]
    pub default_host_ip: IpAddr,
    /// The reverse-proxy service itself; it receives no routing block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_service: Option<ServiceName>,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            project_name: default_project_name(),
            default_host_ip: default_host_ip(),
            proxy_service: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServiceSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub reverse_proxy: bool,
    /// Environment variable holding the public hostname routed to this service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname_env: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub depends_on: BTreeSet<ServiceName>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub profiles: BTreeSet<ProfileName>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortBinding>,
}

impl Default for ServiceSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            description: String::new(),
            category: default_category(),
            reverse_proxy: false,
            hostname_env: None,
            depends_on: BTreeSet::new(),
            profiles: BTreeSet::new(),
            ports: Vec::new(),
        }
    }
}

impl ServiceSpec {
    /// Container port the reverse proxy forwards to: the first declared one.
    pub fn upstream_port(&self) -> Option<u16> {
        self.ports.first().map(|p| p.container_port)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PortBinding {
    /// `None` inherits `global.default_host_ip` when the plan is resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<HostIp>,
    pub host_port: u16,
    pub container_port: u16,
    #[serde(default)]
    pub protocol: Protocol,
}

impl PortBinding {
    pub fn tcp(host_port: u16, container_port: u16) -> Self {
        Self {
            host_ip: None,
            host_port,
            container_port,
            protocol: Protocol::Tcp,
        }
    }

    pub fn effective_host_ip(&self, default: IpAddr) -> IpAddr {
        self.host_ip.map_or(default, |ip| ip.resolve(default))
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProfileSpec {
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub included_services: BTreeSet<ServiceName>,
}

fn default_project_name() -> String {
    "localai".to_owned()
}

fn default_host_ip() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_category() -> String {
    "other".to_owned()
}

/// Compose service keys double as DNS names on the stack network.
fn is_compose_service_name(name: &str) -> bool {
    let mut bytes = name.bytes();
    bytes.next().is_some_and(|b| b.is_ascii_alphanumeric())
        && bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
}

fn is_env_identifier(name: &str) -> bool {
    let mut bytes = name.bytes();
    bytes
        .next()
        .is_some_and(|b| b.is_ascii_alphabetic() || b == b'_')
        && bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Map deserializer that rejects repeated keys instead of keeping the last one.
fn unique_keys<'de, D, K, V>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
where
    D: Deserializer<'de>,
    K: Deserialize<'de> + Ord + fmt::Display,
    V: Deserialize<'de>,
{
    struct UniqueKeys<K, V>(PhantomData<(K, V)>);

    impl<'de, K, V> Visitor<'de> for UniqueKeys<K, V>
    where
        K: Deserialize<'de> + Ord + fmt::Display,
        V: Deserialize<'de>,
    {
        type Value = BTreeMap<K, V>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map with unique keys")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut out = BTreeMap::new();
            while let Some((key, value)) = access.next_entry::<K, V>()? {
                if out.contains_key(&key) {
                    return Err(de::Error::custom(format_args!("duplicate entry '{key}'")));
                }
                out.insert(key, value);
            }
            Ok(out)
        }
    }

    deserializer.deserialize_map(UniqueKeys(PhantomData))
}

impl Manifest {
    pub fn service(&self, name: &str) -> Option<&ServiceSpec> {
        self.services.get(name)
    }

    pub fn profile(&self, name: &str) -> Option<&ProfileSpec> {
        self.profiles.get(name)
    }

    pub fn enabled_services(&self) -> impl Iterator<Item = (&ServiceName, &ServiceSpec)> {
        self.services.iter().filter(|(_, spec)| spec.enabled)
    }

    /// Structural checks serde cannot express: non-empty names, names usable in
    /// the generated documents, non-zero ports.
    pub fn check(&self) -> Result<(), ManifestError> {
        if self.global.project_name.trim().is_empty() {
            return Err(ManifestError::EmptyName { kind: "project" });
        }
        for (name, spec) in &self.services {
            if name.trim().is_empty() {
                return Err(ManifestError::EmptyName { kind: "service" });
            }
            if !is_compose_service_name(name) {
                return Err(ManifestError::InvalidName {
                    kind: "service name",
                    name: name.to_string(),
                    pattern: "[a-zA-Z0-9][a-zA-Z0-9_.-]*",
                });
            }
            if let Some(env) = spec.hostname_env.as_deref() {
                if !is_env_identifier(env) {
                    return Err(ManifestError::InvalidName {
                        kind: "hostname_env",
                        name: env.to_owned(),
                        pattern: "[A-Za-z_][A-Za-z0-9_]*",
                    });
                }
            }
            for (index, port) in spec.ports.iter().enumerate() {
                for (field, value) in [
                    ("host_port", port.host_port),
                    ("container_port", port.container_port),
                ] {
                    if value == 0 {
                        return Err(ManifestError::InvalidPort {
                            service: name.to_string(),
                            index,
                            field,
                        });
                    }
                }
            }
        }
        if self.profiles.keys().any(|name| name.trim().is_empty()) {
            return Err(ManifestError::EmptyName { kind: "profile" });
        }
        Ok(())
    }

    /// Canonical serialized form. JSON is pretty-printed with a trailing newline.
    pub fn to_canonical_string(&self, format: ManifestFormat) -> Result<String, ManifestError> {
        match format {
            ManifestFormat::Json => {
                let mut out =
                    serde_json::to_string_pretty(self).map_err(ManifestError::SerializeJson)?;
                out.push('\n');
                Ok(out)
            }
            ManifestFormat::Toml => Ok(toml::to_string_pretty(self)?),
        }
    }

    /// Persist atomically; the format follows the destination's extension.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), ManifestError> {
        let path = path.as_ref();
        let content = self.to_canonical_string(ManifestFormat::from_path(path))?;
        write_atomic(path, content.as_bytes()).map_err(|source| ManifestError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

pub fn parse_manifest_str(input: &str, format: ManifestFormat) -> Result<Manifest, ManifestError> {
    let manifest: Manifest = match format {
        ManifestFormat::Json => serde_json::from_str(input)?,
        ManifestFormat::Toml => toml::from_str(input)?,
    };
    manifest.check()?;
    Ok(manifest)
}

pub fn parse_manifest_file(path: impl AsRef<Path>) -> Result<Manifest, ManifestError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    parse_manifest_str(&content, ManifestFormat::from_path(path))
}
