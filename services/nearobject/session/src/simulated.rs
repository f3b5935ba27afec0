//! In-process UWB controller used by tests and simulator devices.

use crate::driver::{MulticastAction, NotificationSink, UwbDeviceInfo, UwbDriver};
use crate::identity::DeviceIdentity;
use rand::Rng;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, trace};
use uwb_fira::{
    Channel, DeviceRole, MultiNodeMode, RangingMethod, RangingTimeStruct, SchedulingMode,
    StsConfiguration, StsPacketConfiguration, UwbAngle,
    UwbCapability, UwbMacAddress, UwbMulticastListStatus, UwbNotificationData, UwbRangingData,
    UwbRangingMeasurement, UwbSessionReasonCode, UwbSessionState, UwbSessionStatus,
    UwbSessionUpdateMulticastListEntry, UwbStatus, UwbStatusGeneric, UwbStatusMulticast,
    UwbStatusSession, UwbVersion,
};
use uwb_tlv::TlvSimple;

/// Sessions the simulator holds at once
pub const MAX_SESSIONS: usize = 8;

/// Controlees per session
pub const MAX_CONTROLEES: usize = 8;

/// Command kinds, for counting and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverCommand {
    /// [`UwbDriver::initialize`]
    Initialize,
    /// [`UwbDriver::reset`]
    Reset,
    /// [`UwbDriver::device_info`]
    DeviceInfo,
    /// [`UwbDriver::capabilities`]
    Capabilities,
    /// [`UwbDriver::session_init`]
    SessionInit,
    /// [`UwbDriver::session_deinit`]
    SessionDeinit,
    /// [`UwbDriver::set_app_config`]
    SetAppConfig,
    /// [`UwbDriver::start_ranging`]
    StartRanging,
    /// [`UwbDriver::stop_ranging`]
    StopRanging,
    /// [`UwbDriver::update_multicast_list`]
    UpdateMulticastList,
}

#[derive(Debug)]
struct SimSession {
    state: UwbSessionState,
    controlees: BTreeSet<UwbMacAddress>,
    app_config: Vec<TlvSimple>,
}

#[derive(Debug, Default)]
struct SimState {
    initialized: bool,
    sessions: HashMap<u32, SimSession>,
    counts: HashMap<DriverCommand, usize>,
    failures: HashMap<DriverCommand, VecDeque<UwbStatus>>,
    sequence_number: u32,
}

/// A UWB controller simulated in memory.
///
/// It enforces the controller's session state rules, counts every command it
/// receives, fails commands on request and echoes state changes as
/// notifications, the way a real controller does.
pub struct SimulatedDriver {
    instance_id: u32,
    capability: UwbCapability,
    state: Mutex<SimState>,
    sink: RwLock<Option<NotificationSink>>,
}

impl SimulatedDriver {
    /// Create simulator instance `instance_id` with default capabilities
    pub fn new(instance_id: u32) -> Self {
        Self::with_capability(instance_id, default_capability())
    }

    /// Create a simulator advertising `capability`
    pub fn with_capability(instance_id: u32, capability: UwbCapability) -> Self {
        Self {
            instance_id,
            capability,
            state: Mutex::new(SimState::default()),
            sink: RwLock::new(None),
        }
    }

    /// Identity of this instance
    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::simulator(self.instance_id)
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the next `command` with `status`. Injections queue up per command.
    pub fn inject_failure(&self, command: DriverCommand, status: UwbStatus) {
        self.lock()
            .failures
            .entry(command)
            .or_default()
            .push_back(status);
    }

    /// How many times `command` was issued, failures included
    pub fn command_count(&self, command: DriverCommand) -> usize {
        self.lock().counts.get(&command).copied().unwrap_or_default()
    }

    /// Total commands issued
    pub fn total_commands(&self) -> usize {
        self.lock().counts.values().sum()
    }

    /// State of a session, if it exists
    pub fn session_state(&self, session_id: u32) -> Option<UwbSessionState> {
        self.lock().sessions.get(&session_id).map(|s| s.state)
    }

    /// Last app configuration applied to a session
    pub fn app_config(&self, session_id: u32) -> Option<Vec<TlvSimple>> {
        self.lock()
            .sessions
            .get(&session_id)
            .map(|s| s.app_config.clone())
    }

    /// Deliver `notification` to the registered sink, if any
    pub fn emit(&self, notification: UwbNotificationData) {
        let sink = self
            .sink
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match sink {
            Some(sink) => sink(notification),
            None => trace!("Simulator {} dropped notification without sink", self.instance_id),
        }
    }

    /// Produce one ranging round for an active session.
    ///
    /// Returns false when the session is not ranging.
    pub fn emit_ranging_round(&self, session_id: u32) -> bool {
        let data = {
            let mut state = self.lock();
            let Some(session) = state.sessions.get(&session_id) else {
                return false;
            };
            if session.state != UwbSessionState::Active {
                return false;
            }
            let peers: Vec<UwbMacAddress> = if session.controlees.is_empty() {
                vec![UwbMacAddress::Short([0x00, 0x01])]
            } else {
                session.controlees.iter().copied().collect()
            };
            let mut rng = rand::thread_rng();
            let measurements = peers
                .into_iter()
                .map(|peer_mac| UwbRangingMeasurement {
                    peer_mac,
                    status: None,
                    distance_cm: rng.gen_range(10..1_000),
                    aoa_azimuth: Some(UwbAngle {
                        value_q9_7: rng.gen_range(-60 * 128..60 * 128),
                        figure_of_merit: rng.gen_range(50..=100),
                    }),
                    aoa_elevation: None,
                    line_of_sight: Some(true),
                })
                .collect();
            state.sequence_number = state.sequence_number.wrapping_add(1);
            UwbRangingData {
                sequence_number: state.sequence_number,
                session_id,
                ranging_interval_ms: 200,
                measurements,
            }
        };
        self.emit(UwbNotificationData::RangingData(data));
        true
    }

    /// Count `command` and consume a pending injected failure for it
    fn begin(&self, state: &mut SimState, command: DriverCommand) -> Result<(), UwbStatus> {
        *state.counts.entry(command).or_default() += 1;
        if let Some(status) = state.failures.get_mut(&command).and_then(VecDeque::pop_front) {
            debug!(
                "Simulator {} failing {:?} with {}",
                self.instance_id, command, status
            );
            return Err(status);
        }
        Ok(())
    }

    fn session_status(session_id: u32, state: UwbSessionState) -> UwbNotificationData {
        UwbNotificationData::SessionStatus(UwbSessionStatus {
            session_id,
            state,
            reason: UwbSessionReasonCode::StateChangeWithSessionManagementCommands,
        })
    }

    /// Run a session command under the state lock, then emit its echo
    fn session_command(
        &self,
        command: DriverCommand,
        session_id: u32,
        apply: impl FnOnce(&mut SimState) -> Result<Option<UwbNotificationData>, UwbStatus>,
    ) -> Result<(), UwbStatus> {
        let notification = {
            let mut state = self.lock();
            self.begin(&mut state, command)?;
            if !state.initialized {
                return Err(UwbStatusGeneric::Rejected.into());
            }
            apply(&mut state)?
        };
        trace!("Simulator {} {:?} session {}", self.instance_id, command, session_id);
        if let Some(notification) = notification {
            self.emit(notification);
        }
        Ok(())
    }
}

fn session_mut(state: &mut SimState, session_id: u32) -> Result<&mut SimSession, UwbStatus> {
    state
        .sessions
        .get_mut(&session_id)
        .ok_or(UwbStatus::Session(UwbStatusSession::NotExist))
}

impl UwbDriver for SimulatedDriver {
    fn initialize(&self) -> Result<(), UwbStatus> {
        let mut state = self.lock();
        self.begin(&mut state, DriverCommand::Initialize)?;
        state.initialized = true;
        Ok(())
    }

    fn reset(&self) -> Result<(), UwbStatus> {
        let mut state = self.lock();
        self.begin(&mut state, DriverCommand::Reset)?;
        state.sessions.clear();
        state.initialized = false;
        Ok(())
    }

    fn device_info(&self) -> Result<UwbDeviceInfo, UwbStatus> {
        let mut state = self.lock();
        self.begin(&mut state, DriverCommand::DeviceInfo)?;
        Ok(UwbDeviceInfo {
            uci_version: UwbVersion::new(1, 1),
            mac_version: UwbVersion::new(1, 3),
            phy_version: UwbVersion::new(1, 3),
            vendor_specific: self.instance_id.to_be_bytes().to_vec(),
        })
    }

    fn capabilities(&self) -> Result<UwbCapability, UwbStatus> {
        let mut state = self.lock();
        self.begin(&mut state, DriverCommand::Capabilities)?;
        Ok(self.capability.clone())
    }

    fn session_init(&self, session_id: u32) -> Result<(), UwbStatus> {
        self.session_command(DriverCommand::SessionInit, session_id, |state| {
            if state.sessions.contains_key(&session_id) {
                return Err(UwbStatusSession::Duplicate.into());
            }
            if state.sessions.len() >= MAX_SESSIONS {
                return Err(UwbStatusSession::MaxSessionsExceeded.into());
            }
            state.sessions.insert(
                session_id,
                SimSession {
                    state: UwbSessionState::Init,
                    controlees: BTreeSet::new(),
                    app_config: Vec::new(),
                },
            );
            Ok(Some(Self::session_status(session_id, UwbSessionState::Init)))
        })
    }

    fn session_deinit(&self, session_id: u32) -> Result<(), UwbStatus> {
        self.session_command(DriverCommand::SessionDeinit, session_id, |state| {
            state
                .sessions
                .remove(&session_id)
                .ok_or(UwbStatus::Session(UwbStatusSession::NotExist))?;
            Ok(Some(Self::session_status(session_id, UwbSessionState::Deinit)))
        })
    }

    fn set_app_config(&self, session_id: u32, params: &[TlvSimple]) -> Result<(), UwbStatus> {
        self.session_command(DriverCommand::SetAppConfig, session_id, |state| {
            let session = session_mut(state, session_id)?;
            if session.state == UwbSessionState::Active {
                return Err(UwbStatusSession::Active.into());
            }
            session.app_config = params.to_vec();
            let changed = session.state != UwbSessionState::Idle;
            session.state = UwbSessionState::Idle;
            Ok(changed.then(|| Self::session_status(session_id, UwbSessionState::Idle)))
        })
    }

    fn start_ranging(&self, session_id: u32) -> Result<(), UwbStatus> {
        self.session_command(DriverCommand::StartRanging, session_id, |state| {
            let session = session_mut(state, session_id)?;
            match session.state {
                UwbSessionState::Idle => {
                    session.state = UwbSessionState::Active;
                    Ok(Some(Self::session_status(session_id, UwbSessionState::Active)))
                }
                UwbSessionState::Active => Err(UwbStatusSession::Active.into()),
                _ => Err(UwbStatusSession::NotConfigured.into()),
            }
        })
    }

    fn stop_ranging(&self, session_id: u32) -> Result<(), UwbStatus> {
        self.session_command(DriverCommand::StopRanging, session_id, |state| {
            let session = session_mut(state, session_id)?;
            if session.state != UwbSessionState::Active {
                return Err(UwbStatusGeneric::Rejected.into());
            }
            session.state = UwbSessionState::Idle;
            Ok(Some(Self::session_status(session_id, UwbSessionState::Idle)))
        })
    }

    fn update_multicast_list(
        &self,
        session_id: u32,
        action: MulticastAction,
        controlees: &[UwbMacAddress],
    ) -> Result<(), UwbStatus> {
        self.session_command(DriverCommand::UpdateMulticastList, session_id, |state| {
            let session = session_mut(state, session_id)?;
            for controlee in controlees {
                let present = session.controlees.contains(controlee);
                match action {
                    MulticastAction::Add if present => {
                        return Err(UwbStatusSession::AddressAlreadyPresent.into())
                    }
                    MulticastAction::Delete if !present => {
                        return Err(UwbStatusSession::AddressNotFound.into())
                    }
                    _ => {}
                }
            }
            if action == MulticastAction::Add
                && session.controlees.len() + controlees.len() > MAX_CONTROLEES
            {
                return Err(UwbStatusSession::MulticastListFull.into());
            }

            for controlee in controlees {
                match action {
                    MulticastAction::Add => session.controlees.insert(*controlee),
                    MulticastAction::Delete => session.controlees.remove(controlee),
                };
            }
            let statuses = controlees
                .iter()
                .map(|mac| UwbSessionUpdateMulticastListEntry {
                    controlee_mac: *mac,
                    sub_session_id: 0,
                    status: UwbStatusMulticast::OkMulticastListUpdate,
                })
                .collect();
            Ok(Some(UwbNotificationData::SessionUpdateMulticastListStatus(
                UwbMulticastListStatus {
                    session_id,
                    remaining_size: (MAX_CONTROLEES - session.controlees.len()) as u8,
                    statuses,
                },
            )))
        })
    }

    fn set_notification_sink(&self, sink: NotificationSink) {
        *self.sink.write().unwrap_or_else(PoisonError::into_inner) = Some(sink);
    }
}

impl std::fmt::Debug for SimulatedDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedDriver")
            .field("instance_id", &self.instance_id)
            .finish()
    }
}

/// Capabilities advertised by default simulator instances
pub fn default_capability() -> UwbCapability {
    UwbCapability {
        device_roles: Some(DeviceRole::ALL.iter().copied().collect()),
        ranging_methods: Some(
            [
                RangingMethod::SsTwrDeferred,
                RangingMethod::DsTwrDeferred,
                RangingMethod::SsTwrNonDeferred,
                RangingMethod::DsTwrNonDeferred,
            ]
            .into(),
        ),
        sts_configurations: Some([StsConfiguration::Static, StsConfiguration::Dynamic].into()),
        multi_node_modes: Some([MultiNodeMode::Unicast, MultiNodeMode::OneToMany].into()),
        ranging_time_structs: Some(RangingTimeStruct::ALL.iter().copied().collect()),
        scheduling_modes: Some(SchedulingMode::ALL.iter().copied().collect()),
        rframe_configs: Some(StsPacketConfiguration::ALL.iter().copied().collect()),
        channels: Some([Channel::C5, Channel::C9].into()),
        hopping_mode: Some(true),
        block_striding: Some(true),
        extended_mac_address: Some(true),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn initialized() -> SimulatedDriver {
        let driver = SimulatedDriver::new(1);
        driver.initialize().unwrap();
        driver
    }

    #[test]
    fn test_session_state_rules() {
        let driver = initialized();
        driver.session_init(5).unwrap();
        assert_eq!(
            driver.session_init(5),
            Err(UwbStatus::Session(UwbStatusSession::Duplicate))
        );
        assert_eq!(
            driver.start_ranging(5),
            Err(UwbStatus::Session(UwbStatusSession::NotConfigured))
        );
        driver.set_app_config(5, &[]).unwrap();
        driver.start_ranging(5).unwrap();
        assert_eq!(driver.session_state(5), Some(UwbSessionState::Active));
        driver.session_deinit(5).unwrap();
        assert_eq!(driver.session_state(5), None);
    }

    #[test]
    fn test_uninitialized_rejects_session_commands() {
        let driver = SimulatedDriver::new(1);
        assert_eq!(
            driver.session_init(1),
            Err(UwbStatus::Generic(UwbStatusGeneric::Rejected))
        );
    }

    #[test]
    fn test_injected_failure_is_consumed_once() {
        let driver = initialized();
        driver.inject_failure(DriverCommand::SessionInit, UwbStatusGeneric::CommandRetry.into());
        assert!(driver.session_init(1).unwrap_err().is_retry());
        driver.session_init(1).unwrap();
        assert_eq!(driver.command_count(DriverCommand::SessionInit), 2);
    }

    #[test]
    fn test_echo_notifications() {
        let driver = initialized();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink_received = received.clone();
        driver.set_notification_sink(Arc::new(move |n: UwbNotificationData| sink_received.lock().unwrap().push(n)));

        driver.session_init(9).unwrap();
        driver.set_app_config(9, &[]).unwrap();
        driver.start_ranging(9).unwrap();
        assert!(driver.emit_ranging_round(9));

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 4);
        assert!(matches!(
            received[3],
            UwbNotificationData::RangingData(ref data) if data.session_id == 9
        ));
    }

    #[test]
    fn test_multicast_list_rules() {
        let driver = initialized();
        driver.session_init(2).unwrap();
        let peer = UwbMacAddress::Short([1, 2]);
        driver
            .update_multicast_list(2, MulticastAction::Add, &[peer])
            .unwrap();
        assert_eq!(
            driver.update_multicast_list(2, MulticastAction::Add, &[peer]),
            Err(UwbStatus::Session(UwbStatusSession::AddressAlreadyPresent))
        );
        driver
            .update_multicast_list(2, MulticastAction::Delete, &[peer])
            .unwrap();
        assert_eq!(
            driver.update_multicast_list(2, MulticastAction::Delete, &[peer]),
            Err(UwbStatus::Session(UwbStatusSession::AddressNotFound))
        );
    }
}
