pub mod completions;
pub mod dry_run;
pub mod edit;
pub mod generate;
pub mod init;
pub mod list;
pub mod man_pages;
pub mod plan;
pub mod profiles;
pub mod resolve;
pub mod summary;
pub mod validate;

use console::Style;
use stackplan_core::{
    DeclaredBy, Diagnostic, DiagnosticKind, Diagnostics, Engine, InactiveReason, Severity,
};
use stackplan_schema::Manifest;
use std::path::{Path, PathBuf};

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_MANIFEST_ERROR: u8 = 2;
pub const EXIT_REJECTED: u8 = 3;
pub const EXIT_WRITE_ERROR: u8 = 4;

/// Exit code for an error message returned by a command.
pub fn exit_code_for(msg: &str) -> u8 {
    if msg.starts_with("write error:") || msg.contains("failed to write manifest") {
        EXIT_WRITE_ERROR
    } else if msg.starts_with("manifest error:")
        || msg.starts_with("failed to parse manifest")
        || msg.starts_with("failed to read manifest")
    {
        EXIT_MANIFEST_ERROR
    } else if msg.starts_with("rejected by validation:") {
        EXIT_REJECTED
    } else {
        EXIT_FAILURE
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn colorize_severity(severity: Severity) -> String {
    let label = severity.to_string();
    match severity {
        Severity::Error => Style::new().red().bold().apply_to(label).to_string(),
        Severity::Warning => Style::new().yellow().apply_to(label).to_string(),
    }
}

pub fn colorize_enabled(enabled: bool) -> String {
    if enabled {
        Style::new().green().apply_to("enabled").to_string()
    } else {
        Style::new().dim().apply_to("disabled").to_string()
    }
}

/// One-line human description of a diagnostic.
pub fn describe(diagnostic: &Diagnostic) -> String {
    match &diagnostic.kind {
        DiagnosticKind::UnknownDependency {
            service,
            dependency,
        } => format!("{service} depends on unknown service '{dependency}'"),
        DiagnosticKind::UnknownProfileMember { profile, service } => {
            format!("profile {profile} includes unknown service '{service}'")
        }
        DiagnosticKind::UnknownProxyService { service } => {
            format!("global.proxy_service names unknown service '{service}'")
        }
        DiagnosticKind::UnknownProfile { profile } => format!("unknown profile '{profile}'"),
        DiagnosticKind::UnknownServiceProfile { service, profile } => {
            format!("{service} lists undefined profile '{profile}'")
        }
        DiagnosticKind::PortConflict { key, profile, .. } => {
            let names = diagnostic
                .services()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            match profile {
                Some(p) => format!("port {key} bound by {names} in profile {p}"),
                None => format!("port {key} declared by {names}"),
            }
        }
        DiagnosticKind::InactiveDependency {
            service,
            dependency,
            reason,
            profile,
        } => {
            let why = match reason {
                InactiveReason::Disabled => "is disabled",
                InactiveReason::NotInProfile => "is not in the profile",
            };
            format!("{service} depends on {dependency}, which {why} ({profile})")
        }
        DiagnosticKind::MembershipDisagreement {
            profile,
            service,
            declared_by,
        } => match declared_by {
            DeclaredBy::Service => {
                format!("{service} lists profile {profile}, but {profile} does not list {service}")
            }
            DeclaredBy::Profile => {
                format!("profile {profile} lists {service}, but {service} does not list {profile}")
            }
        },
        DiagnosticKind::ProxyWithoutPort { service } => {
            format!("{service} is reverse-proxied but declares no port")
        }
        DiagnosticKind::EmptyPlan { profile } => {
            format!("profile {profile} resolves to no services")
        }
    }
}

/// Print diagnostics to stderr, one per line, tagged with their category.
pub fn print_diagnostics(diagnostics: &Diagnostics) {
    for diagnostic in diagnostics {
        eprintln!(
            "{}[{}]: {}",
            colorize_severity(diagnostic.severity),
            diagnostic.kind.category(),
            describe(diagnostic)
        );
    }
}

/// Directory holding the manifest; generated files and the config live there.
pub fn manifest_dir(manifest: &Path) -> PathBuf {
    match manifest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

pub fn load_manifest(engine: &Engine, path: &Path) -> Result<Manifest, String> {
    engine.load(path).map_err(|e| e.to_string())
}
