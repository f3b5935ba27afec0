//! A ranging session on a UWB device.

use crate::callbacks::{CallbackRegistry, UwbSessionEventCallbacks};
use crate::driver::{MulticastAction, UwbDriver};
use crate::identity::DeviceIdentity;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, trace, warn};
use uwb_fira::{
    UwbCapability, UwbConfiguration, UwbMacAddress, UwbMulticastListStatus, UwbRangingData,
    UwbSessionReasonCode, UwbSessionState, UwbSessionStatus, UwbStatus, UwbStatusGeneric,
    UwbStatusMulticast, UwbStatusSession,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A ranging session.
///
/// Sessions are created by [`crate::UwbDevice::create_session`] and owned by
/// the caller. Dropping the last reference tears the session down on the
/// controller.
pub struct UwbSession {
    id: u32,
    device: DeviceIdentity,
    driver: Arc<dyn UwbDriver>,
    capability: UwbCapability,
    state: Mutex<UwbSessionState>,
    ranging: AtomicBool,
    configuration: Mutex<Option<UwbConfiguration>>,
    peers: Mutex<BTreeSet<UwbMacAddress>>,
    callbacks: CallbackRegistry<dyn UwbSessionEventCallbacks>,
}

impl UwbSession {
    /// Wrap a session the controller has already initialized
    pub(crate) fn new(
        id: u32,
        device: DeviceIdentity,
        driver: Arc<dyn UwbDriver>,
        capability: UwbCapability,
    ) -> Self {
        Self {
            id,
            device,
            driver,
            capability,
            state: Mutex::new(UwbSessionState::Init),
            ranging: AtomicBool::new(false),
            configuration: Mutex::new(None),
            peers: Mutex::new(BTreeSet::new()),
            callbacks: CallbackRegistry::new(),
        }
    }

    /// Session identifier
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Identity of the device hosting the session
    pub fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    /// Current lifecycle state
    pub fn state(&self) -> UwbSessionState {
        *lock(&self.state)
    }

    /// Whether ranging is in progress
    pub fn is_ranging(&self) -> bool {
        self.ranging.load(Ordering::Acquire)
    }

    /// Last configuration applied
    pub fn configuration(&self) -> Option<UwbConfiguration> {
        lock(&self.configuration).clone()
    }

    /// Current multicast list
    pub fn peers(&self) -> Vec<UwbMacAddress> {
        lock(&self.peers).iter().copied().collect()
    }

    /// Subscribe to session events. The registry keeps only a weak reference.
    pub fn register_callbacks(&self, callbacks: &Arc<dyn UwbSessionEventCallbacks>) {
        self.callbacks.register(callbacks);
    }

    /// Apply `configuration` to the controller.
    ///
    /// Moves an initialized session to `Idle`. Parameters outside the
    /// device's capabilities are rejected before reaching the controller.
    pub fn configure(&self, configuration: &UwbConfiguration) -> Result<(), UwbStatus> {
        if !self.capability.supports(configuration) {
            warn!(
                session_id = self.id,
                "Configuration exceeds device {} capabilities", self.device
            );
            return Err(UwbStatusGeneric::InvalidParameter.into());
        }

        match self.state() {
            UwbSessionState::Deinit => return Err(UwbStatusSession::NotExist.into()),
            UwbSessionState::Active => return Err(UwbStatusSession::Active.into()),
            UwbSessionState::Init | UwbSessionState::Idle => {}
        }

        let params = configuration.to_app_config_params();
        self.driver.set_app_config(self.id, &params)?;
        {
            // The session may have ended or started ranging during the call
            let mut state = lock(&self.state);
            match *state {
                UwbSessionState::Deinit => return Err(UwbStatusSession::NotExist.into()),
                UwbSessionState::Active => return Err(UwbStatusSession::Active.into()),
                UwbSessionState::Init | UwbSessionState::Idle => *state = UwbSessionState::Idle,
            }
            *lock(&self.configuration) = Some(configuration.clone());
        }
        debug!(
            session_id = self.id,
            "Applied {} app config parameters",
            params.len()
        );
        Ok(())
    }

    /// Start ranging. Returns immediately if ranging is already active.
    pub fn start_ranging(&self) -> Result<(), UwbStatus> {
        if self
            .ranging
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            trace!(session_id = self.id, "Ranging already active");
            return Ok(());
        }

        let result = match self.state() {
            UwbSessionState::Init => Err(UwbStatusSession::NotConfigured.into()),
            UwbSessionState::Deinit => Err(UwbStatusSession::NotExist.into()),
            UwbSessionState::Idle | UwbSessionState::Active => {
                self.driver.start_ranging(self.id)
            }
        };
        if let Err(status) = result {
            self.ranging.store(false, Ordering::Release);
            warn!(session_id = self.id, "Failed to start ranging: {}", status);
            return Err(status);
        }

        {
            let mut state = lock(&self.state);
            if *state == UwbSessionState::Deinit {
                drop(state);
                if let Err(status) = self.driver.stop_ranging(self.id) {
                    trace!(session_id = self.id, "Stop after end failed: {}", status);
                }
                self.ranging.store(false, Ordering::Release);
                warn!(session_id = self.id, "Session ended while ranging started");
                return Err(UwbStatusSession::NotExist.into());
            }
            *state = UwbSessionState::Active;
        }
        info!(session_id = self.id, "Ranging started on {}", self.device);
        self.callbacks.notify(|l| l.on_ranging_started(self.id));
        Ok(())
    }

    /// Stop ranging. Returns immediately if ranging is not active.
    pub fn stop_ranging(&self) -> Result<(), UwbStatus> {
        if self
            .ranging
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            trace!(session_id = self.id, "Ranging already stopped");
            return Ok(());
        }

        if let Err(status) = self.driver.stop_ranging(self.id) {
            self.ranging.store(true, Ordering::Release);
            warn!(session_id = self.id, "Failed to stop ranging: {}", status);
            return Err(status);
        }

        {
            let mut state = lock(&self.state);
            if *state == UwbSessionState::Active {
                *state = UwbSessionState::Idle;
            }
        }
        info!(session_id = self.id, "Ranging stopped on {}", self.device);
        self.callbacks.notify(|l| l.on_ranging_stopped(self.id));
        Ok(())
    }

    /// Add a controlee to the multicast list
    pub fn add_peer(&self, peer: UwbMacAddress) -> Result<(), UwbStatus> {
        self.update_peers(MulticastAction::Add, peer)
    }

    /// Remove a controlee from the multicast list
    pub fn remove_peer(&self, peer: UwbMacAddress) -> Result<(), UwbStatus> {
        self.update_peers(MulticastAction::Delete, peer)
    }

    fn update_peers(&self, action: MulticastAction, peer: UwbMacAddress) -> Result<(), UwbStatus> {
        {
            let mut peers = lock(&self.peers);
            match action {
                MulticastAction::Add if peers.contains(&peer) => {
                    return Err(UwbStatusSession::AddressAlreadyPresent.into())
                }
                MulticastAction::Delete if !peers.contains(&peer) => {
                    return Err(UwbStatusSession::AddressNotFound.into())
                }
                _ => {}
            }
            self.driver.update_multicast_list(self.id, action, &[peer])?;
            match action {
                MulticastAction::Add => peers.insert(peer),
                MulticastAction::Delete => peers.remove(&peer),
            };
        }

        debug!(session_id = self.id, "Multicast {:?} {}", action, peer);
        let changed = [peer];
        let (added, removed): (&[UwbMacAddress], &[UwbMacAddress]) = match action {
            MulticastAction::Add => (&changed, &[]),
            MulticastAction::Delete => (&[], &changed),
        };
        self.callbacks
            .notify(|l| l.on_session_membership_changed(self.id, added, removed));
        Ok(())
    }

    /// Tear the session down on the controller
    pub fn deinitialize(&self) -> Result<(), UwbStatus> {
        if self.state() == UwbSessionState::Deinit {
            return Ok(());
        }
        self.driver.session_deinit(self.id)?;
        self.end(UwbSessionReasonCode::StateChangeWithSessionManagementCommands);
        Ok(())
    }

    /// Mark the session ended and tell listeners
    pub(crate) fn end(&self, reason: UwbSessionReasonCode) {
        let previous = std::mem::replace(&mut *lock(&self.state), UwbSessionState::Deinit);
        if previous == UwbSessionState::Deinit {
            return;
        }
        if self.ranging.swap(false, Ordering::AcqRel) {
            self.callbacks.notify(|l| l.on_ranging_stopped(self.id));
        }
        info!(session_id = self.id, "Session ended: {:?}", reason);
        self.callbacks.notify(|l| l.on_session_ended(self.id, reason));
    }

    /// Apply a controller session status notification.
    ///
    /// Notifications that echo a host command carry no new information and
    /// are ignored; the command path has already updated the state.
    pub(crate) fn handle_status(&self, status: &UwbSessionStatus) {
        if status.reason == UwbSessionReasonCode::StateChangeWithSessionManagementCommands {
            trace!(session_id = self.id, "Echo of host command: {}", status.state);
            return;
        }

        warn!(
            session_id = self.id,
            "Controller moved session to {}: {:?}", status.state, status.reason
        );
        match status.state {
            UwbSessionState::Deinit => self.end(status.reason),
            state => {
                *lock(&self.state) = state;
                let active = state == UwbSessionState::Active;
                if self.ranging.swap(active, Ordering::AcqRel) != active {
                    if active {
                        self.callbacks.notify(|l| l.on_ranging_started(self.id));
                    } else {
                        self.callbacks.notify(|l| l.on_ranging_stopped(self.id));
                    }
                }
            }
        }
    }

    pub(crate) fn handle_ranging_data(&self, data: &UwbRangingData) {
        trace!(
            session_id = self.id,
            "Ranging round {} with {} measurements",
            data.sequence_number,
            data.measurements.len()
        );
        self.callbacks
            .notify(|l| l.on_peer_properties_changed(self.id, &data.measurements));
    }

    pub(crate) fn handle_multicast_status(&self, status: &UwbMulticastListStatus) {
        for entry in &status.statuses {
            if entry.status != UwbStatusMulticast::OkMulticastListUpdate {
                warn!(
                    session_id = self.id,
                    "Multicast update for {} failed: {:?}", entry.controlee_mac, entry.status
                );
            }
        }
    }
}

impl Drop for UwbSession {
    fn drop(&mut self) {
        if self.state() != UwbSessionState::Deinit {
            if let Err(status) = self.driver.session_deinit(self.id) {
                debug!(session_id = self.id, "Deinit on drop failed: {}", status);
            }
        }
    }
}

impl std::fmt::Debug for UwbSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UwbSession")
            .field("id", &self.id)
            .field("device", &self.device)
            .field("state", &self.state())
            .field("ranging", &self.is_ranging())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{NotificationSink, UwbDeviceInfo};
    use crate::simulated::{DriverCommand, SimulatedDriver};
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Barrier, OnceLock, Weak};
    use uwb_fira::{Channel, DeviceRole};
    use uwb_tlv::TlvSimple;

    /// Ends the session right after one command succeeds, as a device reset
    /// racing the caller would
    #[derive(Debug)]
    struct EndingDriver {
        inner: Arc<SimulatedDriver>,
        end_after: DriverCommand,
        session: OnceLock<Weak<UwbSession>>,
    }

    impl EndingDriver {
        fn after(&self, command: DriverCommand) {
            if command != self.end_after {
                return;
            }
            if let Some(session) = self.session.get().and_then(Weak::upgrade) {
                session.end(UwbSessionReasonCode::StateChangeWithSessionManagementCommands);
            }
        }
    }

    impl UwbDriver for EndingDriver {
        fn initialize(&self) -> Result<(), UwbStatus> {
            self.inner.initialize()
        }
        fn reset(&self) -> Result<(), UwbStatus> {
            self.inner.reset()
        }
        fn device_info(&self) -> Result<UwbDeviceInfo, UwbStatus> {
            self.inner.device_info()
        }
        fn capabilities(&self) -> Result<UwbCapability, UwbStatus> {
            self.inner.capabilities()
        }
        fn session_init(&self, session_id: u32) -> Result<(), UwbStatus> {
            self.inner.session_init(session_id)
        }
        fn session_deinit(&self, session_id: u32) -> Result<(), UwbStatus> {
            self.inner.session_deinit(session_id)
        }
        fn set_app_config(&self, session_id: u32, params: &[TlvSimple]) -> Result<(), UwbStatus> {
            self.inner.set_app_config(session_id, params)?;
            self.after(DriverCommand::SetAppConfig);
            Ok(())
        }
        fn start_ranging(&self, session_id: u32) -> Result<(), UwbStatus> {
            self.inner.start_ranging(session_id)?;
            self.after(DriverCommand::StartRanging);
            Ok(())
        }
        fn stop_ranging(&self, session_id: u32) -> Result<(), UwbStatus> {
            self.inner.stop_ranging(session_id)
        }
        fn update_multicast_list(
            &self,
            session_id: u32,
            action: MulticastAction,
            controlees: &[UwbMacAddress],
        ) -> Result<(), UwbStatus> {
            self.inner.update_multicast_list(session_id, action, controlees)
        }
        fn set_notification_sink(&self, sink: NotificationSink) {
            self.inner.set_notification_sink(sink)
        }
    }

    fn ending_session(id: u32, end_after: DriverCommand) -> (Arc<SimulatedDriver>, Arc<UwbSession>) {
        let inner = Arc::new(SimulatedDriver::new(1));
        inner.initialize().unwrap();
        inner.session_init(id).unwrap();
        let capability = inner.capabilities().unwrap();
        let driver = Arc::new(EndingDriver {
            inner: inner.clone(),
            end_after,
            session: OnceLock::new(),
        });
        let session = Arc::new(UwbSession::new(id, inner.identity(), driver.clone(), capability));
        driver.session.get_or_init(|| Arc::downgrade(&session));
        (inner, session)
    }

    #[derive(Default)]
    struct Recorder {
        started: AtomicUsize,
        stopped: AtomicUsize,
        ended: AtomicUsize,
        membership: AtomicUsize,
    }

    impl UwbSessionEventCallbacks for Recorder {
        fn on_session_ended(&self, _session_id: u32, _reason: UwbSessionReasonCode) {
            self.ended.fetch_add(1, Ordering::SeqCst);
        }
        fn on_ranging_started(&self, _session_id: u32) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }
        fn on_ranging_stopped(&self, _session_id: u32) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }
        fn on_session_membership_changed(
            &self,
            _session_id: u32,
            _added: &[UwbMacAddress],
            _removed: &[UwbMacAddress],
        ) {
            self.membership.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn session(id: u32) -> (Arc<SimulatedDriver>, UwbSession) {
        let driver = Arc::new(SimulatedDriver::new(1));
        driver.initialize().unwrap();
        driver.session_init(id).unwrap();
        let capability = driver.capabilities().unwrap();
        let session = UwbSession::new(id, driver.identity(), driver.clone(), capability);
        (driver, session)
    }

    fn configuration() -> UwbConfiguration {
        UwbConfiguration {
            device_role: Some(DeviceRole::Initiator),
            channel: Some(Channel::C9),
            ..Default::default()
        }
    }

    #[test]
    fn test_start_is_idempotent() {
        let (driver, session) = session(1);
        session.configure(&configuration()).unwrap();

        session.start_ranging().unwrap();
        session.start_ranging().unwrap();
        assert!(session.is_ranging());
        assert_eq!(session.state(), UwbSessionState::Active);
        assert_eq!(driver.command_count(DriverCommand::StartRanging), 1);

        session.stop_ranging().unwrap();
        session.stop_ranging().unwrap();
        assert_eq!(driver.command_count(DriverCommand::StopRanging), 1);
    }

    #[test]
    fn test_start_failure_rolls_back() {
        let (driver, session) = session(2);
        session.configure(&configuration()).unwrap();
        driver.inject_failure(DriverCommand::StartRanging, UwbStatusGeneric::Failed.into());

        assert_eq!(
            session.start_ranging(),
            Err(UwbStatus::Generic(UwbStatusGeneric::Failed))
        );
        assert!(!session.is_ranging());
        assert_eq!(session.state(), UwbSessionState::Idle);

        session.start_ranging().unwrap();
        assert!(session.is_ranging());
    }

    #[test]
    fn test_stop_failure_rolls_back() {
        let (driver, session) = session(3);
        session.configure(&configuration()).unwrap();
        session.start_ranging().unwrap();
        driver.inject_failure(DriverCommand::StopRanging, UwbStatusGeneric::Rejected.into());

        assert!(session.stop_ranging().is_err());
        assert!(session.is_ranging());
    }

    #[test]
    fn test_start_unconfigured() {
        let (driver, session) = session(4);
        assert_eq!(
            session.start_ranging(),
            Err(UwbStatus::Session(UwbStatusSession::NotConfigured))
        );
        assert!(!session.is_ranging());
        assert_eq!(driver.command_count(DriverCommand::StartRanging), 0);
    }

    #[test]
    fn test_configure_outside_capabilities() {
        let (driver, session) = session(5);
        let configuration = UwbConfiguration {
            channel: Some(Channel::C14),
            ..Default::default()
        };
        assert_eq!(
            session.configure(&configuration),
            Err(UwbStatus::Generic(UwbStatusGeneric::InvalidParameter))
        );
        assert_eq!(driver.command_count(DriverCommand::SetAppConfig), 0);
        assert_eq!(session.state(), UwbSessionState::Init);
    }

    #[test]
    fn test_configure_while_active() {
        let (_driver, session) = session(6);
        session.configure(&configuration()).unwrap();
        session.start_ranging().unwrap();
        assert_eq!(
            session.configure(&configuration()),
            Err(UwbStatus::Session(UwbStatusSession::Active))
        );
    }

    #[test]
    fn test_callbacks_and_peers() {
        let (_driver, session) = session(7);
        let recorder = Arc::new(Recorder::default());
        let listener: Arc<dyn UwbSessionEventCallbacks> = recorder.clone();
        session.register_callbacks(&listener);

        let peer = UwbMacAddress::Short([0x12, 0x34]);
        session.add_peer(peer).unwrap();
        assert_eq!(
            session.add_peer(peer),
            Err(UwbStatus::Session(UwbStatusSession::AddressAlreadyPresent))
        );
        assert_eq!(session.peers(), vec![peer]);

        session.configure(&configuration()).unwrap();
        session.start_ranging().unwrap();
        session.deinitialize().unwrap();

        assert_eq!(recorder.membership.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.started.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.stopped.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.ended.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), UwbSessionState::Deinit);
    }

    #[test]
    fn test_controller_initiated_stop() {
        let (_driver, session) = session(8);
        session.configure(&configuration()).unwrap();
        session.start_ranging().unwrap();

        session.handle_status(&UwbSessionStatus {
            session_id: 8,
            state: UwbSessionState::Active,
            reason: UwbSessionReasonCode::StateChangeWithSessionManagementCommands,
        });
        assert!(session.is_ranging());

        session.handle_status(&UwbSessionStatus {
            session_id: 8,
            state: UwbSessionState::Idle,
            reason: UwbSessionReasonCode::MaxRangingRoundRetryCountReached,
        });
        assert!(!session.is_ranging());
        assert_eq!(session.state(), UwbSessionState::Idle);
    }

    #[test]
    fn test_end_during_configure_is_not_overwritten() {
        let (_inner, session) = ending_session(10, DriverCommand::SetAppConfig);
        assert_eq!(
            session.configure(&configuration()),
            Err(UwbStatus::Session(UwbStatusSession::NotExist))
        );
        assert_eq!(session.state(), UwbSessionState::Deinit);
        assert!(session.configuration().is_none());
    }

    #[test]
    fn test_end_during_start_rolls_back_ranging() {
        let (inner, session) = ending_session(11, DriverCommand::StartRanging);
        session.configure(&configuration()).unwrap();

        assert_eq!(
            session.start_ranging(),
            Err(UwbStatus::Session(UwbStatusSession::NotExist))
        );
        assert_eq!(session.state(), UwbSessionState::Deinit);
        assert!(!session.is_ranging());
        assert_eq!(inner.command_count(DriverCommand::StopRanging), 1);
    }

    #[test]
    fn test_stop_after_end_keeps_deinit() {
        let (_driver, session) = session(12);
        session.configure(&configuration()).unwrap();
        session.start_ranging().unwrap();
        // Ended while the flag still reads ranging
        *lock(&session.state) = UwbSessionState::Deinit;

        session.stop_ranging().unwrap();
        assert_eq!(session.state(), UwbSessionState::Deinit);
    }

    #[test]
    fn test_concurrent_start_stop_transitions_once() {
        const THREADS: usize = 8;
        let (driver, session) = session(13);
        session.configure(&configuration()).unwrap();
        let recorder = Arc::new(Recorder::default());
        let listener: Arc<dyn UwbSessionEventCallbacks> = recorder.clone();
        session.register_callbacks(&listener);

        for _ in 0..20 {
            let started = Barrier::new(THREADS);
            let stopped = Barrier::new(THREADS);
            std::thread::scope(|scope| {
                for _ in 0..THREADS {
                    scope.spawn(|| {
                        session.start_ranging().unwrap();
                        started.wait();
                        assert!(session.is_ranging());
                        stopped.wait();
                        session.stop_ranging().unwrap();
                    });
                }
            });
            assert!(!session.is_ranging());
            assert_eq!(session.state(), UwbSessionState::Idle);
        }

        assert_eq!(driver.command_count(DriverCommand::StartRanging), 20);
        assert_eq!(driver.command_count(DriverCommand::StopRanging), 20);
        assert_eq!(recorder.started.load(Ordering::SeqCst), 20);
        assert_eq!(recorder.stopped.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn test_drop_deinitializes() {
        let (driver, session) = session(9);
        drop(session);
        assert_eq!(driver.session_state(9), None);
        assert_eq!(driver.command_count(DriverCommand::SessionDeinit), 1);
    }
}
