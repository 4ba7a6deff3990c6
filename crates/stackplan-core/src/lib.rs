//! Resolution and generation engine for Stackplan service stacks.
//!
//! This crate takes a loaded [`stackplan_schema::Manifest`] through the
//! validate → resolve → plan → generate pipeline and produces the compose
//! override and reverse-proxy routing documents. It also hosts the manifest
//! editor operations, engine policy configuration and read-only summaries.
//! Nothing in here formats human-facing text; findings are structured
//! [`Diagnostic`]s.

pub mod config;
pub mod diagnostics;
pub mod editor;
pub mod engine;
pub mod expose;
pub mod generate;
pub mod resolve;
pub mod summary;
pub mod validate;

pub use config::{
    EngineConfig, ExposurePolicy, ProxySettings, ValidationPolicy, DEFAULT_CONFIG_FILE,
};
pub use diagnostics::{
    BindingKey, DeclaredBy, Diagnostic, DiagnosticKind, Diagnostics, InactiveReason, Severity,
};
pub use editor::ManifestEditor;
pub use engine::{DryRun, Engine, Generated};
pub use expose::{plan, ExposureMode, ExposurePlanner, PlannedService, PlannedSet};
pub use generate::{
    compose_artifact_name, generate, Artifact, ArtifactGenerator, Artifacts, PROXY_ARTIFACT_NAME,
};
pub use resolve::{resolve, EffectiveBinding, Membership, ResolvedPlan, ResolvedService};
pub use summary::{access_urls, plan_by_category, services_by_category, AccessUrl};
pub use validate::{validate, Validator};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("manifest error: {0}")]
    Manifest(#[from] stackplan_schema::ManifestError),
    #[error("unknown profile: {0}")]
    UnknownProfile(String),
    #[error("unknown service: {0}")]
    UnknownService(String),
    #[error("service {service} has no port #{index} ({count} declared)")]
    PortIndexOutOfRange {
        service: String,
        index: usize,
        count: usize,
    },
    #[error("port {key} is already used by {service}")]
    PortInUse {
        key: BindingKey,
        service: String,
    },
    #[error("rejected by validation: {0}")]
    Rejected(Diagnostics),
    #[error("write error: {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("config error: {0}")]
    Config(String),
    #[error("render error: {0}")]
    Render(#[from] serde_yaml::Error),
}
