//! UWB device lifecycle and notification dispatch.

use crate::callbacks::{CallbackRegistry, UwbDeviceEventCallbacks, UwbSessionEventCallbacks};
use crate::driver::{UwbDeviceInfo, UwbDriver};
use crate::error::TaskQueueError;
use crate::identity::DeviceIdentity;
use crate::session::UwbSession;
use crate::session_id::SessionIdGenerator;
use crate::task_queue::TaskQueue;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::oneshot;
use tracing::{debug, error, info, trace, warn};
use uwb_fira::{
    UwbCapability, UwbDeviceState, UwbNotificationData, UwbSessionReasonCode, UwbSessionState,
    UwbStatus, UwbStatusGeneric, UwbStatusSession,
};

/// Ids tried before `create_session` gives up on collisions
const MAX_SESSION_ID_ATTEMPTS: usize = 16;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A UWB device.
///
/// The device owns its driver and an event thread. Controller notifications
/// are queued onto that thread, so listener code never runs on the driver's
/// I/O thread. Sessions are owned by callers; the device only tracks them.
pub struct UwbDevice {
    identity: DeviceIdentity,
    driver: Arc<dyn UwbDriver>,
    state: Mutex<UwbDeviceState>,
    capability: Mutex<Option<UwbCapability>>,
    sessions: Mutex<HashMap<u32, Weak<UwbSession>>>,
    callbacks: CallbackRegistry<dyn UwbDeviceEventCallbacks>,
    id_generator: Box<dyn SessionIdGenerator>,
    events: TaskQueue,
    this: Weak<UwbDevice>,
}

impl UwbDevice {
    /// Create a device in the `Ready` state and subscribe to its driver's
    /// notifications.
    pub fn new(
        identity: DeviceIdentity,
        driver: Arc<dyn UwbDriver>,
        id_generator: Box<dyn SessionIdGenerator>,
    ) -> Result<Arc<Self>, TaskQueueError> {
        let events = TaskQueue::new(format!("uwb-{}", identity))?;
        let device = Arc::new_cyclic(|this| Self {
            identity,
            driver,
            state: Mutex::new(UwbDeviceState::Ready),
            capability: Mutex::new(None),
            sessions: Mutex::new(HashMap::new()),
            callbacks: CallbackRegistry::new(),
            id_generator,
            events,
            this: this.clone(),
        });

        let this = Arc::downgrade(&device);
        device.driver.set_notification_sink(Arc::new(move |notification: UwbNotificationData| {
            if let Some(device) = this.upgrade() {
                // Completion is observed through listeners
                drop(device.handle_notification(notification));
            }
        }));
        debug!("Created device {}", device.identity);
        Ok(device)
    }

    /// Device identity
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Current lifecycle state
    pub fn state(&self) -> UwbDeviceState {
        *lock(&self.state)
    }

    /// Subscribe to device events. The registry keeps only a weak reference.
    pub fn register_callbacks(&self, callbacks: &Arc<dyn UwbDeviceEventCallbacks>) {
        self.callbacks.register(callbacks);
    }

    /// Bring the controller up, moving `Ready` to `Active`.
    ///
    /// A faulted device must be reset first.
    pub fn initialize(&self) -> Result<(), UwbStatus> {
        {
            let mut state = lock(&self.state);
            match *state {
                UwbDeviceState::Active => return Ok(()),
                UwbDeviceState::Error => {
                    warn!("Device {} must be reset before initializing", self.identity);
                    return Err(UwbStatusGeneric::Rejected.into());
                }
                UwbDeviceState::Ready => {}
            }
            self.driver.initialize()?;
            *lock(&self.capability) = Some(self.driver.capabilities()?);
            *state = UwbDeviceState::Active;
        }
        info!("Device {} initialized", self.identity);
        self.post_state_changed(UwbDeviceState::Active);
        Ok(())
    }

    /// Reset the controller. Every session ends and the device returns to
    /// `Ready`.
    pub fn reset(&self) -> Result<(), UwbStatus> {
        self.driver.reset()?;

        let sessions: Vec<Arc<UwbSession>> = lock(&self.sessions)
            .drain()
            .filter_map(|(_, session)| session.upgrade())
            .collect();
        for session in &sessions {
            session.end(UwbSessionReasonCode::StateChangeWithSessionManagementCommands);
        }

        *lock(&self.state) = UwbDeviceState::Ready;
        info!(
            "Device {} reset, {} sessions ended",
            self.identity,
            sessions.len()
        );
        self.post_state_changed(UwbDeviceState::Ready);
        Ok(())
    }

    /// Put the device into the `Error` state
    pub fn report_fault(&self) {
        let previous = std::mem::replace(&mut *lock(&self.state), UwbDeviceState::Error);
        if previous != UwbDeviceState::Error {
            error!("Device {} faulted", self.identity);
            self.post_state_changed(UwbDeviceState::Error);
        }
    }

    /// Controller identification
    pub fn device_info(&self) -> Result<UwbDeviceInfo, UwbStatus> {
        self.driver.device_info()
    }

    /// Controller capabilities, cached after the first successful query
    pub fn capabilities(&self) -> Result<UwbCapability, UwbStatus> {
        let mut cached = lock(&self.capability);
        if let Some(capability) = cached.as_ref() {
            return Ok(capability.clone());
        }
        let capability = self.driver.capabilities()?;
        *cached = Some(capability.clone());
        Ok(capability)
    }

    /// Create a session, optionally subscribing `callbacks` to it.
    ///
    /// Generated ids that collide with a live session, or that the controller
    /// reports as duplicates, are retried with a fresh id.
    pub fn create_session(
        &self,
        callbacks: Option<&Arc<dyn UwbSessionEventCallbacks>>,
    ) -> Result<Arc<UwbSession>, UwbStatus> {
        if self.state() != UwbDeviceState::Active {
            warn!(
                "Device {} cannot create sessions in state {}",
                self.identity,
                self.state()
            );
            return Err(UwbStatusGeneric::Rejected.into());
        }
        let capability = self.capabilities()?;

        let mut sessions = lock(&self.sessions);
        sessions.retain(|_, session| session.strong_count() > 0);

        for _ in 0..MAX_SESSION_ID_ATTEMPTS {
            let id = self.id_generator.next_id();
            if sessions.contains_key(&id) {
                trace!(session_id = id, "Session id in use, retrying");
                continue;
            }
            match self.driver.session_init(id) {
                Ok(()) => {}
                Err(UwbStatus::Session(UwbStatusSession::Duplicate)) => {
                    trace!(session_id = id, "Controller reports duplicate id, retrying");
                    continue;
                }
                Err(status) => return Err(status),
            }

            let session = Arc::new(UwbSession::new(
                id,
                self.identity.clone(),
                self.driver.clone(),
                capability,
            ));
            if let Some(callbacks) = callbacks {
                session.register_callbacks(callbacks);
            }
            sessions.insert(id, Arc::downgrade(&session));
            info!(session_id = id, "Created session on {}", self.identity);
            return Ok(session);
        }

        warn!("Device {} exhausted session id attempts", self.identity);
        Err(UwbStatusSession::Duplicate.into())
    }

    /// A live session by id
    pub fn session(&self, session_id: u32) -> Option<Arc<UwbSession>> {
        lock(&self.sessions)
            .get(&session_id)
            .and_then(Weak::upgrade)
    }

    /// Every live session
    pub fn sessions(&self) -> Vec<Arc<UwbSession>> {
        lock(&self.sessions)
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Queue `notification` for dispatch on the device's event thread.
    ///
    /// The receiver resolves once listeners have run.
    pub fn handle_notification(&self, notification: UwbNotificationData) -> oneshot::Receiver<()> {
        let this = self.this.clone();
        self.events.post_back(move || {
            if let Some(device) = this.upgrade() {
                device.dispatch(notification);
            }
        })
    }

    fn dispatch(&self, notification: UwbNotificationData) {
        match notification {
            UwbNotificationData::Status(status) => {
                debug!("Device {} status {}", self.identity, status);
                self.callbacks
                    .notify(|l| l.on_status_changed(&self.identity, status));
            }
            UwbNotificationData::DeviceStatus(UwbDeviceState::Error) => self.report_fault(),
            // Leaving Error takes reset() and reaching Active takes
            // initialize(); the controller can only report a fault
            UwbNotificationData::DeviceStatus(reported) => {
                let current = self.state();
                if current == reported {
                    trace!("Device {} confirmed {}", self.identity, reported);
                } else {
                    warn!(
                        "Device {} reported {} while {}, ignored",
                        self.identity, reported, current
                    );
                }
            }
            UwbNotificationData::SessionStatus(status) => {
                self.callbacks
                    .notify(|l| l.on_session_status_changed(&self.identity, &status));
                if let Some(session) = self.session(status.session_id) {
                    session.handle_status(&status);
                }
                if status.state == UwbSessionState::Deinit {
                    self.forget_ended_session(status.session_id);
                }
            }
            UwbNotificationData::SessionUpdateMulticastListStatus(status) => {
                match self.session(status.session_id) {
                    Some(session) => session.handle_multicast_status(&status),
                    None => trace!(session_id = status.session_id, "Multicast status for unknown session"),
                }
            }
            UwbNotificationData::RangingData(data) => match self.session(data.session_id) {
                Some(session) => session.handle_ranging_data(&data),
                None => trace!(session_id = data.session_id, "Ranging data for unknown session"),
            },
        }
    }

    /// Drop the tracking entry for `session_id` unless the id was reused by
    /// a session that is still alive
    fn forget_ended_session(&self, session_id: u32) {
        let mut sessions = lock(&self.sessions);
        let ended = sessions
            .get(&session_id)
            .and_then(Weak::upgrade)
            .map_or(true, |session| session.state() == UwbSessionState::Deinit);
        if ended {
            sessions.remove(&session_id);
        }
    }

    fn post_state_changed(&self, state: UwbDeviceState) {
        let this = self.this.clone();
        drop(self.events.post_back(move || {
            if let Some(device) = this.upgrade() {
                device.notify_state_changed(state);
            }
        }));
    }

    fn notify_state_changed(&self, state: UwbDeviceState) {
        self.callbacks
            .notify(|l| l.on_device_state_changed(&self.identity, state));
    }
}

impl PartialEq for UwbDevice {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl Eq for UwbDevice {}

impl std::fmt::Debug for UwbDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UwbDevice")
            .field("identity", &self.identity)
            .field("state", &self.state())
            .field("driver", &self.driver)
            .finish()
    }
}
