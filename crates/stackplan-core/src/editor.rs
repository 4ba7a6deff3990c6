use crate::diagnostics::{BindingKey, Diagnostics};
use crate::resolve::EffectiveBinding;
use crate::validate::Validator;
use crate::CoreError;
use stackplan_schema::{parse_manifest_file, HostIp, Manifest, ServiceSpec};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Mutates the enabled flags and port bindings of a manifest file.
///
/// Edits apply to an in-memory copy; nothing reaches disk until [`save`]
/// re-validates the whole manifest.
///
/// [`save`]: ManifestEditor::save
#[derive(Debug, Clone)]
pub struct ManifestEditor {
    path: PathBuf,
    manifest: Manifest,
    dirty: bool,
}

impl ManifestEditor {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();
        let manifest = parse_manifest_file(&path)?;
        Ok(Self::from_manifest(path, manifest))
    }

    pub fn from_manifest(path: impl Into<PathBuf>, manifest: Manifest) -> Self {
        Self {
            path: path.into(),
            manifest,
            dirty: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn service_mut(&mut self, name: &str) -> Result<&mut ServiceSpec, CoreError> {
        self.manifest
            .services
            .get_mut(name)
            .ok_or_else(|| CoreError::UnknownService(name.to_owned()))
    }

    /// Returns whether the flag changed.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<bool, CoreError> {
        let spec = self.service_mut(name)?;
        if spec.enabled == enabled {
            return Ok(false);
        }
        spec.enabled = enabled;
        self.dirty = true;
        debug!("{name}: enabled = {enabled}");
        Ok(true)
    }

    /// Flip the enabled flag and return the new value.
    pub fn toggle(&mut self, name: &str) -> Result<bool, CoreError> {
        let enabled = !self.service_mut(name)?.enabled;
        self.set_enabled(name, enabled)?;
        Ok(enabled)
    }

    /// Change the host side of one binding (`index` counts from zero).
    ///
    /// Fails with [`CoreError::PortInUse`] when the new host socket is already
    /// taken by another enabled service.
    pub fn set_port(
        &mut self,
        name: &str,
        index: usize,
        host_ip: Option<HostIp>,
        host_port: Option<u16>,
    ) -> Result<(), CoreError> {
        let spec = self
            .manifest
            .service(name)
            .ok_or_else(|| CoreError::UnknownService(name.to_owned()))?;
        let count = spec.ports.len();
        let mut binding = *spec
            .ports
            .get(index)
            .ok_or_else(|| CoreError::PortIndexOutOfRange {
                service: name.to_owned(),
                index,
                count,
            })?;
        if let Some(ip) = host_ip {
            binding.host_ip = Some(ip);
        }
        if let Some(port) = host_port {
            binding.host_port = port;
        }

        let mut candidate = self.manifest.clone();
        if let Some(spec) = candidate.services.get_mut(name) {
            spec.ports[index] = binding;
        }
        candidate.check()?;

        let key = EffectiveBinding::resolve(&binding, candidate.global.default_host_ip).key();
        if let Some(owner) = occupant(&candidate, name, key) {
            return Err(CoreError::PortInUse {
                key,
                service: owner,
            });
        }

        self.manifest = candidate;
        self.dirty = true;
        debug!("{name}: port #{index} now {key}");
        Ok(())
    }

    /// Validate the whole manifest and write it back atomically.
    ///
    /// Fatal diagnostics reject the save and leave the file untouched;
    /// warnings are returned.
    pub fn save(&mut self, validator: &Validator) -> Result<Diagnostics, CoreError> {
        let diagnostics = validator.validate(&self.manifest, None);
        if diagnostics.has_fatal() {
            return Err(CoreError::Rejected(diagnostics));
        }
        self.manifest.write_to_file(&self.path)?;
        self.dirty = false;
        info!("saved {}", self.path.display());
        Ok(diagnostics)
    }
}

/// First enabled service other than `except` binding `key`.
fn occupant(manifest: &Manifest, except: &str, key: BindingKey) -> Option<String> {
    let default_ip = manifest.global.default_host_ip;
    manifest
        .enabled_services()
        .filter(|(name, _)| name.as_str() != except)
        .find(|(_, spec)| {
            spec.ports
                .iter()
                .any(|p| EffectiveBinding::resolve(p, default_ip).key() == key)
        })
        .map(|(name, _)| name.to_string())
}
