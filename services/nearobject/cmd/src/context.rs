//! Service-wide state, built once in `main` and passed by reference.

use crate::config::ServiceConfig;
use crate::simulator::SimulatorFactory;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::sync::Arc;
use tracing::info;
use uwb_discovery::{DeviceManager, DirectoryProbe, DiscoveryAgent, SimulatedProbe};
use uwb_fira::StsConfiguration;
use uwb_storage::{FilePersister, NearObjectProfile, ProfileManager, ProfileScope, ProfileSecurity};

pub struct AppContext {
    pub config: ServiceConfig,
    pub started_at: DateTime<Local>,
    pub profiles: ProfileManager,
    pub simulators: Arc<SimulatorFactory>,
    pub devices: Arc<DeviceManager>,
}

impl AppContext {
    /// Open the profile store and wire discovery agents into a device manager
    pub async fn build(config: ServiceConfig) -> Result<Self> {
        let persister = match &config.profile_path {
            Some(path) => FilePersister::new(path),
            None => FilePersister::with_default_path(),
        };
        info!("Using profile store {}", persister.path().display());
        let profiles = ProfileManager::new(Arc::new(persister));
        profiles.load().await.context("failed to load profiles")?;

        let simulators = Arc::new(SimulatorFactory::new());
        let devices = DeviceManager::new(simulators.clone(), config.discovery.auto_initialize);

        let probe = SimulatedProbe::with_instances(1..=config.discovery.simulators);
        devices.add_agent(DiscoveryAgent::new(
            "simulator",
            Arc::new(probe),
            config.discovery.poll_interval,
        ));
        if let Some(directory) = &config.discovery.device_directory {
            let probe = DirectoryProbe::new(directory, config.discovery.device_prefix.clone());
            devices.add_agent(DiscoveryAgent::new(
                "host",
                Arc::new(probe),
                config.discovery.poll_interval,
            ));
        }

        Ok(Self {
            config,
            started_at: Local::now(),
            profiles,
            simulators,
            devices,
        })
    }

    /// The first stored profile, creating and persisting a unicast static-STS
    /// profile when the store is empty
    pub async fn active_profile(&self) -> Result<NearObjectProfile> {
        if let Some(profile) = self.profiles.profiles().await.into_iter().next() {
            return Ok(profile);
        }
        let profile = NearObjectProfile::new(ProfileScope::Unicast).with_security(ProfileSecurity {
            sts_configuration: StsConfiguration::Static,
            session_key: None,
        });
        self.profiles
            .add(profile.clone())
            .await
            .context("failed to persist default profile")?;
        info!("Created default {} profile", profile.scope);
        Ok(profile)
    }

    pub fn uptime(&self) -> chrono::Duration {
        Local::now() - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &tempfile::TempDir) -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.profile_path = Some(dir.path().join("profiles.nearobject"));
        config.discovery.simulators = 2;
        config
    }

    #[tokio::test]
    async fn test_default_profile_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let context = AppContext::build(config(&dir)).await.unwrap();
        let profile = context.active_profile().await.unwrap();
        assert_eq!(profile.scope, ProfileScope::Unicast);

        let reopened = AppContext::build(config(&dir)).await.unwrap();
        assert_eq!(reopened.active_profile().await.unwrap(), profile);
        assert_eq!(reopened.profiles.profiles().await.len(), 1);
    }

    #[tokio::test]
    async fn test_simulators_are_discovered() {
        let dir = tempfile::tempdir().unwrap();
        let context = AppContext::build(config(&dir)).await.unwrap();
        context.devices.scan_all().await;
        assert_eq!(context.devices.devices().len(), 2);
        assert!(context.simulators.driver(2).is_some());
    }
}
