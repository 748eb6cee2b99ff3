// Desktop radio backed by btleplug
//
// btleplug only exposes the central role, so this gateway scans but never advertises.
// Scan events arrive with the manufacturer data already parsed; each entry is wrapped
// back into its AD structure before it reaches the frame decoder.

use anyhow::{Context, Result};
use beacons_core::beacon::wrap_manufacturer_data;
use beacons_core::{
    AdapterGateway, Advertiser, GatewayError, ScanCallback, ScanHandle, ScanRecord, ScanSettings,
    Scanner,
};
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, PeripheralId};
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct BtleplugGateway {
    scanner: Option<Arc<BtleplugScanner>>,
    adapter_info: String,
}

impl BtleplugGateway {
    /// Open the first adapter the platform reports. A machine without one still yields a
    /// gateway; it just reports no radio.
    pub async fn connect() -> Result<Self> {
        let manager = Manager::new()
            .await
            .context("Failed to create BLE manager")?;
        let adapters = manager
            .adapters()
            .await
            .context("Failed to list BLE adapters")?;

        let Some(adapter) = adapters.into_iter().next() else {
            warn!("No BLE adapter found");
            return Ok(Self {
                scanner: None,
                adapter_info: "no adapter".to_string(),
            });
        };

        let adapter_info = adapter
            .adapter_info()
            .await
            .unwrap_or_else(|_| "unknown adapter".to_string());
        info!("BLE adapter: {}", adapter_info);

        Ok(Self {
            scanner: Some(Arc::new(BtleplugScanner::new(adapter, Handle::current()))),
            adapter_info,
        })
    }
}

impl AdapterGateway for BtleplugGateway {
    fn radio_available(&self) -> bool {
        self.scanner.is_some()
    }

    // btleplug has no portable power-state query; an opened adapter counts as on
    fn radio_enabled(&self) -> bool {
        self.scanner.is_some()
    }

    fn advertiser(&self) -> Option<Arc<dyn Advertiser>> {
        None
    }

    fn scanner(&self) -> Option<Arc<dyn Scanner>> {
        self.scanner
            .as_ref()
            .map(|scanner| Arc::clone(scanner) as Arc<dyn Scanner>)
    }

    fn platform_version(&self) -> String {
        format!(
            "{} {} ({})",
            std::env::consts::OS,
            std::env::consts::ARCH,
            self.adapter_info
        )
    }
}

/// Runs one event-pump task per scan handle on the captured runtime
struct BtleplugScanner {
    adapter: Adapter,
    runtime: Handle,
    tasks: Mutex<HashMap<ScanHandle, JoinHandle<()>>>,
}

impl BtleplugScanner {
    fn new(adapter: Adapter, runtime: Handle) -> Self {
        Self {
            adapter,
            runtime,
            tasks: Mutex::new(HashMap::new()),
        }
    }
}

impl Scanner for BtleplugScanner {
    fn start_scan(
        &self,
        handle: ScanHandle,
        settings: &ScanSettings,
        callback: ScanCallback,
    ) -> Result<(), GatewayError> {
        let mut tasks = self.tasks.lock();
        if tasks.contains_key(&handle) {
            return Err(GatewayError::AlreadyStarted);
        }

        debug!("Starting {} ({:?})", handle, settings.mode);
        let adapter = self.adapter.clone();
        let task = self.runtime.spawn(async move {
            if let Err(e) = pump_events(adapter, callback).await {
                warn!("Scan {} ended: {}", handle, e);
            }
        });
        tasks.insert(handle, task);
        Ok(())
    }

    fn stop_scan(&self, handle: ScanHandle) {
        let Some(task) = self.tasks.lock().remove(&handle) else {
            return;
        };
        task.abort();

        let adapter = self.adapter.clone();
        self.runtime.spawn(async move {
            if let Err(e) = adapter.stop_scan().await {
                debug!("stop_scan failed: {}", e);
            }
        });
    }
}

async fn pump_events(adapter: Adapter, callback: ScanCallback) -> btleplug::Result<()> {
    let mut events = adapter.events().await?;
    adapter.start_scan(ScanFilter::default()).await?;

    while let Some(event) = events.next().await {
        let CentralEvent::ManufacturerDataAdvertisement {
            id,
            manufacturer_data,
        } = event
        else {
            continue;
        };

        let rssi = last_rssi(&adapter, &id).await;
        for (company_id, data) in manufacturer_data {
            if let Some(record) = wrap_manufacturer_data(company_id, &data) {
                callback(ScanRecord::new(record, rssi));
            }
        }
    }
    Ok(())
}

/// RSSI of the peripheral's latest advertisement; 0 when the stack has none
async fn last_rssi(adapter: &Adapter, id: &PeripheralId) -> i16 {
    let Ok(peripheral) = adapter.peripheral(id).await else {
        return 0;
    };
    match peripheral.properties().await {
        Ok(Some(properties)) => properties.rssi.unwrap_or(0),
        _ => 0,
    }
}
