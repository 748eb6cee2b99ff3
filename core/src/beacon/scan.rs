/// Scan session
///
/// Owns the single scan registration of the process. Every raw record the scanner
/// delivers is run through the frame decoder; beacons go to the sink, everything else
/// is dropped silently because most advertisements on the channel are not beacons.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use super::frame;
use super::identity::BeaconSighting;
use crate::gateway::{AdapterGateway, ScanCallback, ScanHandle, ScanRecord};
use crate::settings::ScanSettings;

/// Receives every decoded beacon, on the scanner's thread
pub type BeaconSink = Box<dyn Fn(BeaconSighting) + Send + Sync>;

/// Counters for the current scan
#[derive(Debug, Default)]
struct ScanCounters {
    records_seen: AtomicU64,
    beacons_decoded: AtomicU64,
    records_rejected: AtomicU64,
}

/// Snapshot of [`ScanSession`] counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub records_seen: u64,
    pub beacons_decoded: u64,
    pub records_rejected: u64,
}

pub struct ScanSession {
    gateway: Arc<dyn AdapterGateway>,
    settings: ScanSettings,
    active: Mutex<Option<ScanHandle>>,
    /// Counters of the latest scan; replaced, never reset, on every start
    counters: Mutex<Arc<ScanCounters>>,
    next_handle: AtomicU64,
}

impl ScanSession {
    pub fn new(gateway: Arc<dyn AdapterGateway>, settings: ScanSettings) -> Self {
        Self {
            gateway,
            settings,
            active: Mutex::new(None),
            counters: Mutex::new(Arc::new(ScanCounters::default())),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Start scanning and forward decoded beacons to `sink`.
    ///
    /// Returns false if no scanner is available or a scan is already running; the
    /// running scan is left untouched.
    pub fn start_listen(&self, sink: BeaconSink) -> bool {
        let mut active = self.active.lock();

        let Some(scanner) = self.gateway.scanner() else {
            warn!("No scanner available");
            return false;
        };

        if let Some(handle) = *active {
            debug!("Scan already running ({})", handle);
            return false;
        }

        let handle = ScanHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let counters = Arc::new(ScanCounters::default());
        let callback = decode_into(sink, Arc::clone(&counters));

        match scanner.start_scan(handle, &self.settings, callback) {
            Ok(()) => {
                *active = Some(handle);
                *self.counters.lock() = counters;
                info!("Listening for beacons ({})", handle);
                true
            }
            Err(e) => {
                warn!("Scanner refused to start: {}", e);
                false
            }
        }
    }

    /// Stop the running scan. Returns false if none was running.
    pub fn stop_listen(&self) -> bool {
        let mut active = self.active.lock();

        let Some(handle) = active.take() else {
            return false;
        };

        match self.gateway.scanner() {
            Some(scanner) => scanner.stop_scan(handle),
            None => warn!("No scanner to stop {}; clearing session anyway", handle),
        }
        info!("Stopped listening ({})", handle);
        true
    }

    pub fn is_listening(&self) -> bool {
        self.active.lock().is_some()
    }

    pub fn stats(&self) -> ScanStats {
        let counters = self.counters.lock();
        ScanStats {
            records_seen: counters.records_seen.load(Ordering::Relaxed),
            beacons_decoded: counters.beacons_decoded.load(Ordering::Relaxed),
            records_rejected: counters.records_rejected.load(Ordering::Relaxed),
        }
    }
}

fn decode_into(sink: BeaconSink, counters: Arc<ScanCounters>) -> ScanCallback {
    Box::new(move |record: ScanRecord| {
        counters.records_seen.fetch_add(1, Ordering::Relaxed);
        match frame::decode(&record.bytes, record.rssi) {
            Ok(sighting) => {
                counters.beacons_decoded.fetch_add(1, Ordering::Relaxed);
                sink(sighting);
            }
            Err(e) => {
                counters.records_rejected.fetch_add(1, Ordering::Relaxed);
                trace!("Not a beacon: {}", e);
            }
        }
    })
}
