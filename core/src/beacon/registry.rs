/// Beacon lifecycle manager
///
/// Tracks at most one outbound advertisement per beacon id. Starting an id that is already
/// registered stops the old advertisement first; the old start request never completes.
///
/// Per id: `absent -> Pending -> Active | absent`, and `Pending | Active -> absent` on
/// stop or on a superseding start.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::frame;
use super::identity::BeaconSetting;
use crate::gateway::{AdapterGateway, AdvertiseData, AdvertisementHandle};
use crate::settings::AdvertiseSettings;
use crate::BeaconsError;

/// Lifecycle state of a registered beacon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeaconState {
    /// Start requested, radio has not answered yet
    Pending,
    /// Radio confirmed the advertisement
    Active,
}

struct Registration {
    setting: BeaconSetting,
    handle: AdvertisementHandle,
    state: BeaconState,
}

/// Resolves once the radio answers a start request.
///
/// Yields `Some(true)`/`Some(false)` exactly once, or `None` if the request was superseded
/// or stopped before the radio answered.
#[derive(Debug)]
pub struct StartCompletion {
    rx: oneshot::Receiver<bool>,
}

impl StartCompletion {
    fn pending() -> (oneshot::Sender<bool>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    fn resolved(started: bool) -> Self {
        let (tx, completion) = Self::pending();
        let _ = tx.send(started);
        completion
    }

    pub async fn wait(self) -> Option<bool> {
        self.rx.await.ok()
    }

    /// Non-blocking check; `None` while pending or after supersession
    pub fn try_result(&mut self) -> Option<bool> {
        self.rx.try_recv().ok()
    }
}

/// Owns every outbound advertisement of this process
pub struct BeaconLifecycleManager {
    gateway: Arc<dyn AdapterGateway>,
    settings: AdvertiseSettings,
    registry: Arc<Mutex<HashMap<String, Registration>>>,
    /// Serialises start/stop so requests for one id apply in call order
    op_lock: Mutex<()>,
    next_handle: AtomicU64,
}

impl BeaconLifecycleManager {
    pub fn new(gateway: Arc<dyn AdapterGateway>, settings: AdvertiseSettings) -> Self {
        Self {
            gateway,
            settings,
            registry: Arc::new(Mutex::new(HashMap::new())),
            op_lock: Mutex::new(()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Start advertising `setting`, replacing any advertisement under the same id.
    ///
    /// Returns immediately. An invalid identifier is an error and leaves the registry
    /// untouched; an unavailable radio yields a completion already resolved to `false`.
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, setting: BeaconSetting) -> Result<StartCompletion, BeaconsError> {
        let frame = frame::encode(&setting.identity)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| BeaconsError::RuntimeUnavailable)?;

        let _guard = self.op_lock.lock();
        let beacon_id = setting.beacon_id.clone();

        if let Some(old) = self.take(&beacon_id) {
            debug!("Beacon {} superseded ({})", beacon_id, old);
        }

        let Some(advertiser) = self.gateway.advertiser() else {
            warn!("No advertiser available for beacon {}", beacon_id);
            return Ok(StartCompletion::resolved(false));
        };

        let handle = AdvertisementHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let data = AdvertiseData::for_frame(&frame);
        let settings = self.settings.clone();

        self.registry.lock().insert(
            beacon_id.clone(),
            Registration {
                setting,
                handle,
                state: BeaconState::Pending,
            },
        );
        debug!("Beacon {} pending ({}, frame {})", beacon_id, handle, frame);

        let (tx, completion) = StartCompletion::pending();
        let registry = Arc::clone(&self.registry);
        let task_id = beacon_id.clone();

        // Not abortable: a start the radio accepts after a stop must be withdrawn below
        runtime.spawn(async move {
            let result = advertiser.start_advertising(handle, &settings, &data).await;

            {
                let mut registry = registry.lock();
                let current = registry.get(&task_id).map(|entry| entry.handle) == Some(handle);
                if !current {
                    if result.is_ok() {
                        advertiser.stop_advertising(handle);
                    }
                    debug!("Dropping completion for superseded {}", handle);
                    return;
                }

                match &result {
                    Ok(()) => {
                        if let Some(entry) = registry.get_mut(&task_id) {
                            entry.state = BeaconState::Active;
                        }
                        info!("Beacon {} advertising ({})", task_id, handle);
                    }
                    Err(e) => {
                        registry.remove(&task_id);
                        warn!("Beacon {} failed to start: {}", task_id, e);
                    }
                }
            }

            let _ = tx.send(result.is_ok());
        });

        Ok(completion)
    }

    /// Stop advertising `beacon_id`. Returns false if it was not registered.
    pub fn stop(&self, beacon_id: &str) -> bool {
        let _guard = self.op_lock.lock();
        match self.take(beacon_id) {
            Some(handle) => {
                info!("Beacon {} stopped ({})", beacon_id, handle);
                true
            }
            None => {
                debug!("Stop ignored, beacon {} not registered", beacon_id);
                false
            }
        }
    }

    /// Stop every beacon; returns how many were registered
    pub fn stop_all(&self) -> usize {
        let ids = self.active_ids();
        ids.iter().filter(|id| self.stop(id)).count()
    }

    /// Remove the entry and release its radio handle. Caller holds `op_lock`.
    fn take(&self, beacon_id: &str) -> Option<AdvertisementHandle> {
        let entry = self.registry.lock().remove(beacon_id)?;

        match self.gateway.advertiser() {
            Some(advertiser) => advertiser.stop_advertising(entry.handle),
            None => warn!(
                "No advertiser to stop {}; dropping beacon {} anyway",
                entry.handle, beacon_id
            ),
        }
        Some(entry.handle)
    }

    pub fn state(&self, beacon_id: &str) -> Option<BeaconState> {
        self.registry.lock().get(beacon_id).map(|entry| entry.state)
    }

    pub fn is_active(&self, beacon_id: &str) -> bool {
        self.state(beacon_id) == Some(BeaconState::Active)
    }

    pub fn setting(&self, beacon_id: &str) -> Option<BeaconSetting> {
        self.registry
            .lock()
            .get(beacon_id)
            .map(|entry| entry.setting.clone())
    }

    /// Registered ids (pending or active), sorted
    pub fn active_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.registry.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.lock().is_empty()
    }
}
