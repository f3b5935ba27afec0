//! Ranging sessions the service runs on discovered simulator devices.

use crate::context::AppContext;
use crate::{component_debug, component_error, component_info, component_warn};
use anyhow::Result;
use std::sync::Arc;
use uwb_discovery::UwbDeviceManagerCallbacks;
use uwb_fira::{
    MultiNodeMode, RangingMethod, StsConfiguration, UwbConfiguration, UwbDeviceState,
    UwbMacAddress, UwbRangingMeasurement, UwbSessionReasonCode,
};
use uwb_session::{
    DeviceIdentity, SimulatedDriver, UwbDevice, UwbDeviceEventCallbacks, UwbSession,
    UwbSessionEventCallbacks,
};
use uwb_storage::{NearObjectProfile, ProfileScope};

/// Logs session events
pub struct RangingLogger;

impl UwbSessionEventCallbacks for RangingLogger {
    fn on_session_ended(&self, session_id: u32, reason: UwbSessionReasonCode) {
        component_info!("ranging", session_id, "Session ended: {:?}", reason);
    }

    fn on_ranging_started(&self, session_id: u32) {
        component_info!("ranging", session_id, "Ranging started");
    }

    fn on_ranging_stopped(&self, session_id: u32) {
        component_info!("ranging", session_id, "Ranging stopped");
    }

    fn on_peer_properties_changed(&self, session_id: u32, measurements: &[UwbRangingMeasurement]) {
        for m in measurements {
            let azimuth = m
                .aoa_azimuth
                .map(|angle| format!(", azimuth {:.1}°", angle.degrees()))
                .unwrap_or_default();
            component_info!(
                "ranging",
                session_id,
                "Peer {} at {} cm{}",
                m.peer_mac,
                m.distance_cm,
                azimuth
            );
        }
    }

    fn on_session_membership_changed(
        &self,
        session_id: u32,
        added: &[UwbMacAddress],
        removed: &[UwbMacAddress],
    ) {
        component_debug!(
            "ranging",
            session_id,
            "Membership changed: +{} -{}",
            added.len(),
            removed.len()
        );
    }
}

/// Logs device state changes
struct DeviceStateLogger;

impl UwbDeviceEventCallbacks for DeviceStateLogger {
    fn on_device_state_changed(&self, device: &DeviceIdentity, state: UwbDeviceState) {
        component_info!("devices", "Device {} is now {}", device, state);
    }
}

/// Logs device arrivals and departures, and subscribes to the state of
/// every device that arrives
pub struct DeviceLogger {
    states: Arc<dyn UwbDeviceEventCallbacks>,
}

impl Default for DeviceLogger {
    fn default() -> Self {
        Self {
            states: Arc::new(DeviceStateLogger),
        }
    }
}

impl UwbDeviceManagerCallbacks for DeviceLogger {
    fn on_device_added(&self, device: &Arc<UwbDevice>) {
        component_info!("devices", "Device {} added ({})", device.identity(), device.state());
        device.register_callbacks(&self.states);
    }

    fn on_device_removed(&self, identity: &DeviceIdentity) {
        component_info!("devices", "Device {} removed", identity);
    }
}

/// Session configuration for `profile` under the service's ranging settings
pub fn session_configuration(context: &AppContext, profile: &NearObjectProfile) -> Result<UwbConfiguration> {
    let ranging = &context.config.ranging;
    let multi_node_mode = match profile.scope {
        ProfileScope::Multicast => MultiNodeMode::OneToMany,
        ProfileScope::Unicast | ProfileScope::Unknown => MultiNodeMode::Unicast,
    };
    let sts_configuration = profile
        .security
        .as_ref()
        .map_or(StsConfiguration::Static, |security| security.sts_configuration);

    Ok(UwbConfiguration {
        device_role: Some(ranging.device_role()),
        ranging_method: Some(RangingMethod::DsTwrDeferred),
        sts_configuration: Some(sts_configuration),
        multi_node_mode: Some(multi_node_mode),
        channel: Some(ranging.channel()?),
        ranging_interval_ms: Some(u16::try_from(ranging.interval.as_millis()).unwrap_or(u16::MAX)),
        ..Default::default()
    })
}

/// Peers to range with: one for unicast, several for multicast
fn peers_for(profile: &NearObjectProfile, instance_id: u32) -> Vec<UwbMacAddress> {
    let count = match profile.scope {
        ProfileScope::Multicast => 3,
        ProfileScope::Unicast | ProfileScope::Unknown => 1,
    };
    (1..=count)
        .map(|peer| UwbMacAddress::Short([instance_id as u8, peer]))
        .collect()
}

struct ActiveSession {
    session: Arc<UwbSession>,
    driver: Arc<SimulatedDriver>,
}

/// Ranging sessions opened on every simulator device
pub struct RangingService {
    sessions: Vec<ActiveSession>,
    // Held so the sessions' weak registries keep delivering
    _listener: Arc<dyn UwbSessionEventCallbacks>,
}

impl RangingService {
    /// Open, configure and start one session per simulator device.
    ///
    /// Devices that fail are logged and skipped.
    pub fn start(context: &AppContext, profile: &NearObjectProfile) -> Result<Self> {
        let configuration = session_configuration(context, profile)?;
        let listener: Arc<dyn UwbSessionEventCallbacks> = Arc::new(RangingLogger);

        let mut sessions = Vec::new();
        for device in context.devices.devices().iter().filter_map(|d| d.upgrade()) {
            let Some(driver) = context.simulators.driver_for(device.identity()) else {
                component_debug!("ranging", "Skipping non-simulated device {}", device.identity());
                continue;
            };
            let DeviceIdentity::Simulator { instance_id } = *device.identity() else {
                continue;
            };

            let session = match open_session(&device, &listener, &configuration, profile, instance_id) {
                Ok(session) => session,
                Err(status) => {
                    component_error!("ranging", "Device {} could not range: {}", device.identity(), status);
                    continue;
                }
            };
            sessions.push(ActiveSession { session, driver });
        }

        if sessions.is_empty() {
            component_warn!("ranging", "No devices available for ranging");
        }
        Ok(Self {
            sessions,
            _listener: listener,
        })
    }

    /// Number of sessions ranging
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Have every simulator produce one ranging round
    pub fn emit_rounds(&self) {
        for active in &self.sessions {
            if !active.driver.emit_ranging_round(active.session.id()) {
                component_debug!("ranging", session_id = active.session.id(), "Session is not ranging");
            }
        }
    }

    /// Stop ranging and tear down every session
    pub async fn stop(self) {
        let stops = self.sessions.into_iter().map(|active| {
            tokio::task::spawn_blocking(move || {
                let session = active.session;
                if let Err(status) = session.stop_ranging().and_then(|()| session.deinitialize()) {
                    component_warn!("ranging", session_id = session.id(), "Teardown failed: {}", status);
                }
            })
        });
        for result in futures::future::join_all(stops).await {
            if let Err(e) = result {
                component_error!("ranging", "Teardown task failed: {}", e);
            }
        }
    }
}

fn open_session(
    device: &Arc<UwbDevice>,
    listener: &Arc<dyn UwbSessionEventCallbacks>,
    configuration: &UwbConfiguration,
    profile: &NearObjectProfile,
    instance_id: u32,
) -> Result<Arc<UwbSession>, uwb_fira::UwbStatus> {
    let session = device.create_session(Some(listener))?;
    for peer in peers_for(profile, instance_id) {
        session.add_peer(peer)?;
    }
    session.configure(configuration)?;
    session.start_ranging()?;
    Ok(session)
}
