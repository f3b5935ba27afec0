//! Device probes: one-shot enumerations of attached UWB devices.

use crate::error::DiscoveryError;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::trace;
use uwb_session::DeviceIdentity;

/// Enumerates the devices present right now.
///
/// Probes block; the agent runs them on tokio's blocking pool.
pub trait DeviceProbe: Send + Sync + std::fmt::Debug {
    /// Identities of every device currently present
    fn probe(&self) -> Result<Vec<DeviceIdentity>, DiscoveryError>;
}

/// Lists device nodes in a directory whose names start with a prefix,
/// e.g. `/dev/uwb*`
#[derive(Debug, Clone)]
pub struct DirectoryProbe {
    directory: PathBuf,
    prefix: String,
}

impl DirectoryProbe {
    /// Probe `directory` for entries named `prefix*`
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
        }
    }

    /// Directory being probed
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl DeviceProbe for DirectoryProbe {
    fn probe(&self) -> Result<Vec<DeviceIdentity>, DiscoveryError> {
        let probe_error = |source| DiscoveryError::Probe {
            path: self.directory.clone(),
            source,
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&self.directory).map_err(probe_error)? {
            let entry = entry.map_err(probe_error)?;
            let name = entry.file_name();
            if name.to_string_lossy().starts_with(&self.prefix) {
                paths.push(entry.path().to_string_lossy().into_owned());
            }
        }
        paths.sort();
        trace!("Found {} devices in {}", paths.len(), self.directory.display());
        Ok(paths.into_iter().map(DeviceIdentity::host).collect())
    }
}

#[derive(Debug, Default)]
struct SimulatedProbeState {
    instances: Vec<u32>,
    failing: bool,
}

/// Reports a controllable set of simulator instances
#[derive(Debug, Default)]
pub struct SimulatedProbe {
    state: Mutex<SimulatedProbeState>,
}

impl SimulatedProbe {
    /// Probe reporting `instances`
    pub fn with_instances(instances: impl IntoIterator<Item = u32>) -> Self {
        let probe = Self::default();
        for id in instances {
            probe.add(id);
        }
        probe
    }

    fn lock(&self) -> MutexGuard<'_, SimulatedProbeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach simulator `instance_id`
    pub fn add(&self, instance_id: u32) {
        let mut state = self.lock();
        if !state.instances.contains(&instance_id) {
            state.instances.push(instance_id);
        }
    }

    /// Detach simulator `instance_id`
    pub fn remove(&self, instance_id: u32) {
        self.lock().instances.retain(|id| *id != instance_id);
    }

    /// Make every probe fail until cleared
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }
}

impl DeviceProbe for SimulatedProbe {
    fn probe(&self) -> Result<Vec<DeviceIdentity>, DiscoveryError> {
        let state = self.lock();
        if state.failing {
            return Err(DiscoveryError::ProbeFailed("simulated failure".to_string()));
        }
        Ok(state
            .instances
            .iter()
            .copied()
            .map(DeviceIdentity::simulator)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_probe_matches_prefix() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["uwb1", "uwb0", "tty0"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let found = DirectoryProbe::new(dir.path(), "uwb").probe().unwrap();
        let expected: Vec<DeviceIdentity> = ["uwb0", "uwb1"]
            .iter()
            .map(|name| DeviceIdentity::host(dir.path().join(name).to_string_lossy()))
            .collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn test_directory_probe_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let probe = DirectoryProbe::new(dir.path().join("missing"), "uwb");
        assert!(matches!(probe.probe(), Err(DiscoveryError::Probe { .. })));
    }

    #[test]
    fn test_simulated_probe() {
        let probe = SimulatedProbe::with_instances([1, 2, 2]);
        assert_eq!(probe.probe().unwrap().len(), 2);
        probe.remove(1);
        assert_eq!(probe.probe().unwrap(), vec![DeviceIdentity::simulator(2)]);
        probe.set_failing(true);
        assert!(probe.probe().is_err());
    }
}
