//! BLE Scanner Module
//!
//! Handles Bluetooth LE device discovery and forwards adapter events
//! (discoveries, disconnects) into the controller's event channel.

use crate::domain::connection::BleEvent;
use crate::domain::models::ServiceIdentifier;
use crate::infrastructure::bluetooth::adapter::BtleplugEvent;
use crate::infrastructure::bluetooth::error::BleError;
use btleplug::api::{Central, CentralEvent, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, PeripheralId};
use futures::StreamExt;
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// BLE Scanner for discovering lights
pub struct BleScanner {
    adapter: Adapter,
    event_sender: mpsc::UnboundedSender<BtleplugEvent>,
    watcher: Option<JoinHandle<()>>,
}

impl BleScanner {
    /// Create a new scanner
    pub fn new(adapter: Adapter, event_sender: mpsc::UnboundedSender<BtleplugEvent>) -> Self {
        Self {
            adapter,
            event_sender,
            watcher: None,
        }
    }

    /// Subscribe to adapter events and forward them until the receiver is dropped
    pub async fn watch(&mut self) -> Result<(), BleError> {
        if self.watcher.is_some() {
            return Ok(());
        }

        let mut events = self.adapter.events().await?;
        let adapter = self.adapter.clone();
        let sender = self.event_sender.clone();

        self.watcher = Some(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let forwarded = match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                        match discovered_event(&adapter, id).await {
                            Ok(event) => event,
                            Err(e) => {
                                debug!("Skipping advertisement: {}", e);
                                continue;
                            }
                        }
                    }
                    CentralEvent::DeviceDisconnected(id) => {
                        info!("Device disconnected: {:?}", id);
                        BleEvent::Disconnected { peripheral: id }
                    }
                    _ => continue,
                };

                if sender.send(forwarded).is_err() {
                    break;
                }
            }
            debug!("Adapter event stream finished");
        }));

        Ok(())
    }

    /// Start scanning for peripherals advertising the given service,
    /// replacing any scan still running from an earlier connect
    pub fn start(&self, service: ServiceIdentifier) {
        info!("Starting BLE scan for service UUID: {}", service);

        let adapter = self.adapter.clone();
        let sender = self.event_sender.clone();
        tokio::spawn(async move {
            let filter = ScanFilter {
                services: vec![service.uuid()],
            };
            let result = restart_scan(adapter.stop_scan(), adapter.start_scan(filter)).await;
            if let Err(e) = result {
                error!("Failed to start scan: {}", e);
                let _ = sender.send(BleEvent::Failed {
                    peripheral: None,
                    reason: e.to_string(),
                });
            }
        });
    }

    /// Stop scanning
    pub async fn stop(&self) -> Result<(), BleError> {
        info!("Stopping BLE scan...");
        self.adapter.stop_scan().await?;
        Ok(())
    }
}

impl Drop for BleScanner {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}

/// Run `stop` then `start`, ignoring a failed stop. BlueZ rejects a second
/// discovery from a client that is still discovering.
async fn restart_scan<E: std::fmt::Display>(
    stop: impl Future<Output = Result<(), E>>,
    start: impl Future<Output = Result<(), E>>,
) -> Result<(), E> {
    if let Err(e) = stop.await {
        debug!("No scan to stop: {}", e);
    }
    start.await
}

async fn discovered_event(adapter: &Adapter, id: PeripheralId) -> Result<BtleplugEvent, BleError> {
    let peripheral = adapter.peripheral(&id).await?;
    let properties = peripheral.properties().await?;

    let (local_name, rssi) = match properties {
        Some(props) => (props.local_name, props.rssi),
        None => {
            warn!("No properties for {:?}", id);
            (None, None)
        }
    };
    debug!("Discovered {:?} name={:?} rssi={:?}", id, local_name, rssi);

    Ok(BleEvent::PeripheralDiscovered {
        peripheral: id,
        local_name,
        rssi,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_restart_stops_previous_scan_first() {
        let calls = Mutex::new(Vec::new());
        let result: Result<(), String> = restart_scan(
            async {
                calls.lock().unwrap().push("stop");
                Ok(())
            },
            async {
                calls.lock().unwrap().push("start");
                Ok(())
            },
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(*calls.lock().unwrap(), vec!["stop", "start"]);
    }

    #[tokio::test]
    async fn test_restart_when_nothing_to_stop() {
        let result: Result<(), String> = restart_scan(
            async { Err("not scanning".to_string()) },
            async { Ok(()) },
        )
        .await;
        assert!(result.is_ok());

        let result: Result<(), String> = restart_scan(
            async { Ok(()) },
            async { Err("in progress".to_string()) },
        )
        .await;
        assert_eq!(result, Err("in progress".to_string()));
    }
}
