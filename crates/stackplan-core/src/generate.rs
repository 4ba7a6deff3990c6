use crate::config::ProxySettings;
use crate::expose::{ExposureMode, PlannedService, PlannedSet};
use crate::CoreError;
use serde::Serialize;
use stackplan_schema::write_atomic;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the reverse-proxy routing document.
pub const PROXY_ARTIFACT_NAME: &str = "Caddyfile.generated";

/// File name of the compose override; embeds the exposure mode so private and
/// public renders can sit side by side.
pub fn compose_artifact_name(mode: ExposureMode) -> String {
    format!("docker-compose.override.{mode}.generated.yml")
}

/// Hostname variables whose names predate the derived convention.
const WELL_KNOWN_HOSTNAMES: &[(&str, &str)] = &[
    ("open-webui", "WEBUI_HOSTNAME"),
    ("langfuse-web", "LANGFUSE_HOSTNAME"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub file_name: String,
    pub content: String,
}

/// The two rendered documents of one generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifacts {
    pub compose_override: Artifact,
    pub proxy_routes: Artifact,
}

impl Artifacts {
    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        [&self.compose_override, &self.proxy_routes].into_iter()
    }

    /// Short blake3 digest over both documents, names included.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for artifact in self.iter() {
            hasher.update(artifact.file_name.as_bytes());
            hasher.update(&[0]);
            hasher.update(artifact.content.as_bytes());
            hasher.update(&[0]);
        }
        let hex = hasher.finalize().to_hex().to_string();
        hex[..12].to_owned()
    }

    /// Write every artifact into `dir`, replacing existing files atomically.
    pub fn write_to_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, CoreError> {
        let mut written = Vec::with_capacity(2);
        for artifact in self.iter() {
            let path = dir.join(&artifact.file_name);
            write_atomic(&path, artifact.content.as_bytes()).map_err(|source| {
                CoreError::Write {
                    path: path.clone(),
                    source,
                }
            })?;
            debug!("wrote {}", path.display());
            written.push(path);
        }
        Ok(written)
    }
}

#[derive(Serialize)]
struct ComposeOverride<'a> {
    name: &'a str,
    services: BTreeMap<&'a str, ComposeService>,
}

#[derive(Serialize)]
struct ComposeService {
    ports: Vec<String>,
}

/// Renders a [`PlannedSet`] into text. Output depends on nothing but the
/// planned set and the proxy settings.
#[derive(Debug, Clone, Default)]
pub struct ArtifactGenerator {
    proxy: ProxySettings,
}

impl ArtifactGenerator {
    pub fn new(proxy: ProxySettings) -> Self {
        Self { proxy }
    }

    pub fn generate(&self, planned: &PlannedSet) -> Result<Artifacts, CoreError> {
        Ok(Artifacts {
            compose_override: Artifact {
                file_name: compose_artifact_name(planned.mode),
                content: render_compose(planned)?,
            },
            proxy_routes: Artifact {
                file_name: PROXY_ARTIFACT_NAME.to_owned(),
                content: self.render_proxy(planned),
            },
        })
    }

    fn render_proxy(&self, planned: &PlannedSet) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "# Generated by stackplan for profile '{}'. Do not edit.",
            planned.profile
        );

        if !self.proxy.acme_email_env.is_empty() {
            let _ = write!(
                out,
                "\n{{\n    email {{${}}}\n}}\n",
                self.proxy.acme_email_env
            );
        }

        for service in routed_services(planned) {
            let Some(port) = service.spec.upstream_port() else {
                continue;
            };
            out.push('\n');
            let description = one_line(&service.spec.description);
            if !description.is_empty() {
                let _ = writeln!(out, "# {description}");
            }
            let _ = write!(
                out,
                "{{${}}} {{\n    reverse_proxy {}:{port}\n}}\n",
                hostname_env(service),
                service.name
            );
        }

        if !self.proxy.addons_import.is_empty() {
            let _ = write!(out, "\nimport {}\n", self.proxy.addons_import);
        }
        out
    }
}

/// Generate with the default proxy settings.
pub fn generate(planned: &PlannedSet) -> Result<Artifacts, CoreError> {
    ArtifactGenerator::default().generate(planned)
}

fn render_compose(planned: &PlannedSet) -> Result<String, CoreError> {
    let services = planned
        .services
        .iter()
        .filter(|s| !s.bindings.is_empty())
        .map(|s| {
            let ports = s.bindings.iter().map(ToString::to_string).collect();
            (s.name.as_str(), ComposeService { ports })
        })
        .collect();
    let doc = ComposeOverride {
        name: &planned.project_name,
        services,
    };
    let body = serde_yaml::to_string(&doc)?;
    Ok(format!(
        "# Generated by stackplan for profile '{}' ({} exposure). Do not edit.\n{body}",
        planned.profile, planned.mode
    ))
}

/// Reverse-proxied services in the plan, minus the proxy itself.
fn routed_services(planned: &PlannedSet) -> impl Iterator<Item = &PlannedService> {
    planned.services.iter().filter(move |s| {
        s.spec.reverse_proxy && planned.proxy_service.as_ref() != Some(&s.name)
    })
}

/// Variable holding the public hostname of `service`.
pub fn hostname_env(service: &PlannedService) -> String {
    if let Some(var) = &service.spec.hostname_env {
        return var.clone();
    }
    derived_hostname_env(service.name.as_str())
}

fn derived_hostname_env(name: &str) -> String {
    if let Some((_, var)) = WELL_KNOWN_HOSTNAMES.iter().find(|(n, _)| *n == name) {
        return (*var).to_owned();
    }
    let snake: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{snake}_HOSTNAME")
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
