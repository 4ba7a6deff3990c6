//! Manifest model for stackplan.
//!
//! This crate defines the schema layer: the service manifest (`Manifest`) with
//! its global settings, services, port bindings and profiles, loading and
//! canonical saving in JSON or TOML, atomic file replacement, and the built-in
//! starter template.

pub mod atomic;
pub mod manifest;
pub mod template;
pub mod types;

pub use atomic::write_atomic;
pub use manifest::{
    parse_manifest_file, parse_manifest_str, GlobalSettings, Manifest, ManifestError,
    ManifestFormat, PortBinding, ProfileSpec, ServiceSpec,
};
pub use template::{get_template, list_templates, Template, BUILTIN_TEMPLATES};
pub use types::{
    HostIp, ProfileName, Protocol, ServiceName, ALL_PROFILES, DEFAULT_HOST_IP_PLACEHOLDER,
};
