// Beacon plugin facade
//
// The surface a host application talks to: start/stop beacons, query the adapter,
// start/stop listening, and one event stream of decoded sightings. Method calls arriving
// over a bridge as (name, JSON arguments) are dispatched by `handle_method_call`.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::beacon::{
    BeaconLifecycleManager, BeaconSetting, BeaconSighting, ScanSession, ScanStats,
};
use crate::gateway::AdapterGateway;
use crate::settings::BeaconsConfig;
use crate::BeaconsError;

/// Stream of sightings handed to the single subscriber
pub type BeaconEvents = mpsc::UnboundedReceiver<BeaconSighting>;

/// Arguments of `startBeacon`: `{uuid, major, minor, powerLevel, beaconId}`
pub type StartBeaconArgs = BeaconSetting;

type SubscriberSlot = Arc<Mutex<Option<mpsc::UnboundedSender<BeaconSighting>>>>;

/// A method invocation as it arrives from the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

pub struct BeaconPlugin {
    gateway: Arc<dyn AdapterGateway>,
    beacons: BeaconLifecycleManager,
    scan: ScanSession,
    subscriber: SubscriberSlot,
}

impl BeaconPlugin {
    /// Create a plugin with default settings
    pub fn new(gateway: Arc<dyn AdapterGateway>) -> Self {
        let config = BeaconsConfig::default();
        init_logging(&config.log_filter);
        Self::build(gateway, config)
    }

    pub fn with_config(
        gateway: Arc<dyn AdapterGateway>,
        config: BeaconsConfig,
    ) -> Result<Self, BeaconsError> {
        config.validate()?;
        init_logging(&config.log_filter);
        Ok(Self::build(gateway, config))
    }

    fn build(gateway: Arc<dyn AdapterGateway>, config: BeaconsConfig) -> Self {
        Self {
            beacons: BeaconLifecycleManager::new(Arc::clone(&gateway), config.advertise),
            scan: ScanSession::new(Arc::clone(&gateway), config.scan),
            gateway,
            subscriber: Arc::new(Mutex::new(None)),
        }
    }

    // ------------------------------------------------------------------------
    // BEACONS
    // ------------------------------------------------------------------------

    /// Advertise `setting` and wait for the radio's answer.
    ///
    /// `Ok(false)` means the radio is unavailable or refused. A later start or stop for
    /// the same id while this one is pending resolves it to `Err(Superseded)`.
    pub async fn start_beacon(&self, setting: StartBeaconArgs) -> Result<bool, BeaconsError> {
        let beacon_id = setting.beacon_id.clone();
        let completion = self.beacons.start(setting)?;
        completion
            .wait()
            .await
            .ok_or(BeaconsError::Superseded(beacon_id))
    }

    pub fn stop_beacon(&self, beacon_id: &str) -> bool {
        self.beacons.stop(beacon_id)
    }

    pub fn beacons(&self) -> &BeaconLifecycleManager {
        &self.beacons
    }

    // ------------------------------------------------------------------------
    // ADAPTER
    // ------------------------------------------------------------------------

    pub fn adapter_enabled(&self) -> bool {
        self.gateway.radio_available() && self.gateway.radio_enabled()
    }

    pub fn platform_version(&self) -> String {
        self.gateway.platform_version()
    }

    // ------------------------------------------------------------------------
    // LISTENING
    // ------------------------------------------------------------------------

    /// Claim the event stream. `None` while another subscriber holds it.
    pub fn subscribe(&self) -> Option<BeaconEvents> {
        let mut slot = self.subscriber.lock();
        if slot.as_ref().is_some_and(|tx| !tx.is_closed()) {
            debug!("Event stream already has a subscriber");
            return None;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *slot = Some(tx);
        Some(rx)
    }

    pub fn cancel_subscription(&self) {
        self.subscriber.lock().take();
    }

    pub fn start_listen(&self) -> bool {
        let slot = Arc::clone(&self.subscriber);
        self.scan.start_listen(Box::new(move |sighting| {
            if let Some(tx) = slot.lock().as_ref() {
                if tx.send(sighting).is_err() {
                    debug!("Subscriber gone, sighting dropped");
                }
            }
        }))
    }

    pub fn stop_listen(&self) -> bool {
        self.scan.stop_listen()
    }

    pub fn is_listening(&self) -> bool {
        self.scan.is_listening()
    }

    pub fn scan_stats(&self) -> ScanStats {
        self.scan.stats()
    }

    /// Stop every beacon and the scan, and release the subscriber
    pub fn shutdown(&self) {
        let stopped = self.beacons.stop_all();
        self.scan.stop_listen();
        self.cancel_subscription();
        info!("Beacon plugin shut down ({} beacons stopped)", stopped);
    }

    // ------------------------------------------------------------------------
    // METHOD DISPATCH
    // ------------------------------------------------------------------------

    pub async fn handle_method_call(&self, call: &MethodCall) -> Result<Value, BeaconsError> {
        debug!("Method call: {}", call.method);
        match call.method.as_str() {
            "getPlatformVersion" => Ok(Value::String(self.platform_version())),
            "startBeacon" => {
                let setting: StartBeaconArgs = serde_json::from_value(call.arguments.clone())
                    .map_err(|e| BeaconsError::InvalidArguments(e.to_string()))?;
                Ok(Value::Bool(self.start_beacon(setting).await?))
            }
            "stopBeacon" => {
                let beacon_id = call
                    .arguments
                    .get("beaconId")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        BeaconsError::InvalidArguments("beaconId may not be null".to_string())
                    })?;
                Ok(Value::Bool(self.stop_beacon(beacon_id)))
            }
            "adapterEnabled" => Ok(Value::Bool(self.adapter_enabled())),
            "startListen" => Ok(Value::Bool(self.start_listen())),
            "stopListen" => Ok(Value::Bool(self.stop_listen())),
            other => Err(BeaconsError::NotImplemented(other.to_string())),
        }
    }
}

/// Install the global subscriber once; later calls are no-ops
fn init_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .try_init();
}
