//! Discovery agent: polls a probe and reports device arrivals and departures.

use crate::error::DiscoveryError;
use crate::probe::DeviceProbe;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uwb_session::DeviceIdentity;

/// Default time between probes
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Device presence change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    /// A device appeared
    Arrived(DeviceIdentity),
    /// A device went away
    Departed(DeviceIdentity),
}

impl PresenceEvent {
    /// Device the event refers to
    pub fn identity(&self) -> &DeviceIdentity {
        match self {
            PresenceEvent::Arrived(identity) | PresenceEvent::Departed(identity) => identity,
        }
    }
}

/// Receiver of presence events
pub type PresenceCallback = Arc<dyn Fn(PresenceEvent) + Send + Sync>;

/// Watches a [`DeviceProbe`] and reports presence changes.
///
/// An agent has at most one presence callback; registering another replaces
/// it. While started, a tokio task rescans every `poll_interval`.
pub struct DiscoveryAgent {
    name: String,
    probe: Arc<dyn DeviceProbe>,
    poll_interval: Duration,
    started: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
    known: Mutex<HashSet<DeviceIdentity>>,
    callback: RwLock<Option<PresenceCallback>>,
}

impl DiscoveryAgent {
    /// Create a stopped agent over `probe`
    pub fn new(name: impl Into<String>, probe: Arc<dyn DeviceProbe>, poll_interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            probe,
            poll_interval,
            started: AtomicBool::new(false),
            task: Mutex::new(None),
            known: Mutex::new(HashSet::new()),
            callback: RwLock::new(None),
        })
    }

    /// Agent name, for logs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Time between scans while started
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Whether the polling task is running
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Set the presence callback, replacing any previous one
    pub fn register_presence_callback(&self, callback: PresenceCallback) {
        *self.callback.write().unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    /// Remove the presence callback
    pub fn clear_presence_callback(&self) {
        *self.callback.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Devices seen by the last successful scan
    pub fn known_devices(&self) -> Vec<DeviceIdentity> {
        self.known_lock().iter().cloned().collect()
    }

    fn known_lock(&self) -> MutexGuard<'_, HashSet<DeviceIdentity>> {
        self.known.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn task_lock(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start polling. Returns `Ok(false)` if the agent was already started.
    pub fn start(self: &Arc<Self>) -> Result<bool, DiscoveryError> {
        // The flag and the handle change together under the task lock
        let mut task = self.task_lock();
        if self.started.load(Ordering::Acquire) {
            return Ok(false);
        }

        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| DiscoveryError::NoRuntime)?;
        let agent = Arc::downgrade(self);
        if let Some(previous) = task.replace(runtime.spawn(Self::poll(agent, self.poll_interval))) {
            previous.abort();
        }
        self.started.store(true, Ordering::Release);
        info!(
            "Discovery agent '{}' started, polling every {}",
            self.name,
            humantime::format_duration(self.poll_interval)
        );
        Ok(true)
    }

    /// Stop polling. Returns `false` if the agent was not started.
    pub fn stop(&self) -> bool {
        let mut task = self.task_lock();
        if !self.started.swap(false, Ordering::AcqRel) {
            return false;
        }
        if let Some(handle) = task.take() {
            handle.abort();
        }
        info!("Discovery agent '{}' stopped", self.name);
        true
    }

    async fn poll(agent: Weak<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(agent) = agent.upgrade() else {
                return;
            };
            agent.scan().await;
        }
    }

    async fn try_probe(&self) -> Result<Vec<DeviceIdentity>, DiscoveryError> {
        let probe = self.probe.clone();
        match tokio::task::spawn_blocking(move || probe.probe()).await {
            Ok(result) => result,
            Err(e) => Err(DiscoveryError::ProbeFailed(e.to_string())),
        }
    }

    /// Run the probe once on the blocking pool.
    ///
    /// A failed probe yields an empty snapshot.
    pub async fn probe_async(&self) -> Vec<DeviceIdentity> {
        match self.try_probe().await {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Discovery agent '{}' probe failed: {}", self.name, e);
                Vec::new()
            }
        }
    }

    /// Probe once, update the known set and report the differences.
    ///
    /// A failed probe leaves the known set untouched and reports nothing, so
    /// a transient error does not look like every device leaving.
    pub async fn scan(&self) -> Vec<PresenceEvent> {
        let current: HashSet<DeviceIdentity> = match self.try_probe().await {
            Ok(devices) => devices.into_iter().collect(),
            Err(e) => {
                warn!("Discovery agent '{}' probe failed: {}", self.name, e);
                return Vec::new();
            }
        };

        let mut events: Vec<PresenceEvent> = {
            let mut known = self.known_lock();
            let departed = known
                .difference(&current)
                .cloned()
                .map(PresenceEvent::Departed);
            let arrived = current
                .difference(&known)
                .cloned()
                .map(PresenceEvent::Arrived);
            let events: Vec<PresenceEvent> = departed.chain(arrived).collect();
            *known = current;
            events
        };
        events.sort_by_key(|event| {
            (
                matches!(event, PresenceEvent::Arrived(_)),
                event.identity().to_string(),
            )
        });

        if events.is_empty() {
            return events;
        }
        debug!(
            "Discovery agent '{}' observed {} presence changes",
            self.name,
            events.len()
        );

        let callback = self
            .callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(callback) = callback {
            for event in &events {
                callback(event.clone());
            }
        }
        events
    }
}

impl Drop for DiscoveryAgent {
    fn drop(&mut self) {
        if let Some(handle) = self.task_lock().take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for DiscoveryAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryAgent")
            .field("name", &self.name)
            .field("probe", &self.probe)
            .field("poll_interval", &self.poll_interval)
            .field("started", &self.is_started())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::SimulatedProbe;

    fn agent(probe: &Arc<SimulatedProbe>) -> Arc<DiscoveryAgent> {
        DiscoveryAgent::new("test", probe.clone(), Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_start_stop_idempotent() {
        let probe = Arc::new(SimulatedProbe::default());
        let agent = agent(&probe);

        assert!(agent.start().unwrap());
        assert!(!agent.start().unwrap());
        assert!(agent.is_started());
        assert!(agent.stop());
        assert!(!agent.stop());
        assert!(!agent.is_started());
    }

    #[tokio::test]
    async fn test_restart_replaces_polling_task() {
        let probe = Arc::new(SimulatedProbe::default());
        let agent = agent(&probe);

        agent.start().unwrap();
        agent.stop();
        assert!(agent.task_lock().is_none());

        assert!(agent.start().unwrap());
        assert!(agent.task_lock().as_ref().is_some_and(|h| !h.is_finished()));
        agent.stop();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_start_stop_leaves_flag_and_task_in_step() {
        let probe = Arc::new(SimulatedProbe::default());
        let agent = agent(&probe);

        let toggles: Vec<_> = (0..8)
            .map(|i| {
                let agent = agent.clone();
                tokio::spawn(async move {
                    for _ in 0..50 {
                        if i % 2 == 0 {
                            agent.start().unwrap();
                        } else {
                            agent.stop();
                        }
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for toggle in toggles {
            toggle.await.unwrap();
        }

        assert_eq!(agent.is_started(), agent.task_lock().is_some());
        agent.stop();
        assert!(!agent.is_started());
        assert!(agent.task_lock().is_none());
    }

    #[test]
    fn test_start_without_runtime() {
        let probe = Arc::new(SimulatedProbe::default());
        let agent = agent(&probe);
        assert!(matches!(agent.start(), Err(DiscoveryError::NoRuntime)));
        assert!(!agent.is_started());
    }

    #[tokio::test]
    async fn test_scan_reports_arrivals_and_departures() {
        let probe = Arc::new(SimulatedProbe::with_instances([1, 2]));
        let agent = agent(&probe);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        agent.register_presence_callback(Arc::new(move |event: PresenceEvent| {
            sink.lock().unwrap().push(event)
        }));

        let events = agent.scan().await;
        assert_eq!(
            events,
            vec![
                PresenceEvent::Arrived(DeviceIdentity::simulator(1)),
                PresenceEvent::Arrived(DeviceIdentity::simulator(2)),
            ]
        );

        probe.remove(1);
        probe.add(3);
        let events = agent.scan().await;
        assert_eq!(
            events,
            vec![
                PresenceEvent::Departed(DeviceIdentity::simulator(1)),
                PresenceEvent::Arrived(DeviceIdentity::simulator(3)),
            ]
        );

        assert!(agent.scan().await.is_empty());
        assert_eq!(seen.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_failed_probe_degrades() {
        let probe = Arc::new(SimulatedProbe::with_instances([1]));
        let agent = agent(&probe);
        agent.scan().await;

        probe.set_failing(true);
        assert!(agent.probe_async().await.is_empty());
        assert!(agent.scan().await.is_empty());
        assert_eq!(agent.known_devices(), vec![DeviceIdentity::simulator(1)]);
    }

    #[tokio::test]
    async fn test_callback_replacement() {
        let probe = Arc::new(SimulatedProbe::with_instances([1]));
        let agent = agent(&probe);
        let first = Arc::new(Mutex::new(0));
        let second = Arc::new(Mutex::new(0));

        let counter = first.clone();
        agent.register_presence_callback(Arc::new(move |_: PresenceEvent| {
            *counter.lock().unwrap() += 1
        }));
        let counter = second.clone();
        agent.register_presence_callback(Arc::new(move |_: PresenceEvent| {
            *counter.lock().unwrap() += 1
        }));

        agent.scan().await;
        assert_eq!(*first.lock().unwrap(), 0);
        assert_eq!(*second.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_polling_discovers_devices() {
        let probe = Arc::new(SimulatedProbe::with_instances([7]));
        let agent = agent(&probe);
        agent.start().unwrap();

        for _ in 0..100 {
            if !agent.known_devices().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(agent.known_devices(), vec![DeviceIdentity::simulator(7)]);
        agent.stop();
    }
}
