use crate::config::EngineConfig;
use crate::diagnostics::Diagnostics;
use crate::expose::{ExposureMode, ExposurePlanner, PlannedSet};
use crate::generate::{ArtifactGenerator, Artifacts};
use crate::resolve::ResolvedPlan;
use crate::validate::Validator;
use crate::CoreError;
use serde::Serialize;
use stackplan_schema::{parse_manifest_file, Manifest};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Runs the validate → resolve → plan → generate pipeline.
///
/// The engine holds policy only. Every call works on the manifest snapshot it
/// is handed and allocates its own derived structures, so one engine can serve
/// any number of independent runs.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
}

/// Outcome of a full pipeline run that wrote nothing.
#[derive(Debug, Clone, Serialize)]
pub struct DryRun {
    pub diagnostics: Diagnostics,
    /// `None` when a fatal diagnostic stopped the pipeline.
    pub artifacts: Option<Artifacts>,
}

impl DryRun {
    pub fn is_rejected(&self) -> bool {
        self.artifacts.is_none()
    }
}

/// Outcome of a pipeline run that wrote its artifacts.
#[derive(Debug, Clone, Serialize)]
pub struct Generated {
    /// Non-fatal findings only; fatal ones become [`CoreError::Rejected`].
    pub diagnostics: Diagnostics,
    pub artifacts: Artifacts,
    pub paths: Vec<PathBuf>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Load and structurally check a manifest file.
    pub fn load(&self, path: &Path) -> Result<Manifest, CoreError> {
        info!("loading manifest {}", path.display());
        let manifest = parse_manifest_file(path)?;
        debug!(
            "{} services, {} profiles",
            manifest.services.len(),
            manifest.profiles.len()
        );
        Ok(manifest)
    }

    pub fn validator(&self) -> Validator {
        Validator::new(self.config.validation)
    }

    pub fn validate(&self, manifest: &Manifest, profile: Option<&str>) -> Diagnostics {
        let diagnostics = self.validator().validate(manifest, profile);
        debug!("validation: {diagnostics}");
        diagnostics
    }

    /// Resolve the active service set. Dangling references block resolution.
    pub fn resolve(&self, manifest: &Manifest, profile: &str) -> Result<ResolvedPlan, CoreError> {
        let references = self.validator().references(manifest);
        if references.has_fatal() {
            return Err(CoreError::Rejected(references.fatal().cloned().collect()));
        }
        let resolved = crate::resolve::resolve(manifest, profile)?;
        debug!(
            "profile '{profile}' resolves to {} service(s)",
            resolved.services.len()
        );
        Ok(resolved)
    }

    pub fn plan(&self, resolved: &ResolvedPlan, mode: ExposureMode) -> PlannedSet {
        let planned = ExposurePlanner::new(&self.config.exposure).plan(resolved, mode);
        debug!(
            "{mode} exposure publishes {} binding(s)",
            planned.published_bindings()
        );
        planned
    }

    pub fn generate(&self, planned: &PlannedSet) -> Result<Artifacts, CoreError> {
        ArtifactGenerator::new(self.config.proxy.clone()).generate(planned)
    }

    /// Run the whole pipeline in memory.
    ///
    /// Fatal diagnostics are reported in the result rather than as an error so
    /// the caller can show them next to the warnings.
    pub fn dry_run(
        &self,
        manifest: &Manifest,
        profile: &str,
        mode: ExposureMode,
    ) -> Result<DryRun, CoreError> {
        info!("dry run: profile '{profile}', {mode} exposure");
        let diagnostics = self.validate(manifest, Some(profile));
        if diagnostics.has_fatal() {
            warn!("pipeline stopped: {diagnostics}");
            return Ok(DryRun {
                diagnostics,
                artifacts: None,
            });
        }
        let artifacts = self.render(manifest, profile, mode)?;
        Ok(DryRun {
            diagnostics,
            artifacts: Some(artifacts),
        })
    }

    /// Run the whole pipeline and write both artifacts into `dir`.
    pub fn generate_to_dir(
        &self,
        manifest: &Manifest,
        profile: &str,
        mode: ExposureMode,
        dir: &Path,
    ) -> Result<Generated, CoreError> {
        info!(
            "generating for profile '{profile}', {mode} exposure into {}",
            dir.display()
        );
        let diagnostics = self.validate(manifest, Some(profile));
        if diagnostics.has_fatal() {
            warn!("generation rejected: {diagnostics}");
            return Err(CoreError::Rejected(diagnostics));
        }
        let artifacts = self.render(manifest, profile, mode)?;
        let paths = artifacts.write_to_dir(dir)?;
        Ok(Generated {
            diagnostics,
            artifacts,
            paths,
        })
    }

    fn render(
        &self,
        manifest: &Manifest,
        profile: &str,
        mode: ExposureMode,
    ) -> Result<Artifacts, CoreError> {
        let resolved = self.resolve(manifest, profile)?;
        let planned = self.plan(&resolved, mode);
        let artifacts = self.generate(&planned)?;
        info!("artifacts fingerprint {}", artifacts.fingerprint());
        Ok(artifacts)
    }
}
