//! BLE Connection Module
//!
//! Handles device connection, GATT discovery and command writes. Every
//! request runs on its own task and reports back through the event channel.

use crate::domain::connection::{BleEvent, GattAttribute};
use crate::domain::models::ServiceIdentifier;
use crate::infrastructure::bluetooth::adapter::BtleplugEvent;
use crate::infrastructure::bluetooth::error::BleError;
use btleplug::api::{Central, Characteristic, Peripheral as _, Service, WriteType};
use btleplug::platform::{Adapter, Peripheral, PeripheralId};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// BLE Connection handler
pub struct BleConnection {
    adapter: Adapter,
    event_sender: mpsc::UnboundedSender<BtleplugEvent>,
}

impl BleConnection {
    /// Create a new connection handler
    pub fn new(adapter: Adapter, event_sender: mpsc::UnboundedSender<BtleplugEvent>) -> Self {
        Self {
            adapter,
            event_sender,
        }
    }

    /// Connect to a discovered peripheral
    pub fn connect(&self, id: &PeripheralId) {
        info!("Connecting to Bluetooth device: {:?}", id);
        self.spawn_request(id.clone(), |peripheral| async move {
            peripheral.connect().await?;
            info!("Device connected: {:?}", peripheral.id());
            Ok(BleEvent::Connected {
                peripheral: peripheral.id(),
            })
        });
    }

    /// Discover GATT services, keeping only those matching `filter`
    pub fn discover_services(&self, id: &PeripheralId, filter: ServiceIdentifier) {
        info!("Discovering services...");
        self.spawn_request(id.clone(), move |peripheral| async move {
            peripheral.discover_services().await?;
            let services = matching(peripheral.services(), filter);
            info!("Found {} services matching {}", services.len(), filter);
            Ok(BleEvent::ServicesDiscovered {
                peripheral: peripheral.id(),
                services,
            })
        });
    }

    /// Report the characteristics of `service` matching `filter`
    ///
    /// btleplug resolves characteristics together with their services, so
    /// this only filters what service discovery already returned.
    pub fn discover_characteristics(
        &self,
        id: &PeripheralId,
        service: &Service,
        filter: ServiceIdentifier,
    ) {
        let characteristics = matching(service.characteristics.iter().cloned(), filter);
        info!("Found {} characteristics matching {}", characteristics.len(), filter);

        let _ = self.event_sender.send(BleEvent::CharacteristicsDiscovered {
            peripheral: id.clone(),
            service: service.clone(),
            characteristics,
        });
    }

    /// Write with response; the result is reported as `WriteCompleted`
    pub fn write(&self, id: &PeripheralId, characteristic: &Characteristic, bytes: &[u8]) {
        let adapter = self.adapter.clone();
        let sender = self.event_sender.clone();
        let characteristic = characteristic.clone();
        let bytes = bytes.to_vec();
        let id = id.clone();

        tokio::spawn(async move {
            let result = match adapter.peripheral(&id).await {
                Ok(peripheral) => peripheral
                    .write(&characteristic, &bytes, WriteType::WithResponse)
                    .await
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            if let Err(e) = &result {
                warn!("Write to {:?} failed: {}", id, e);
            } else {
                debug!("Write to {:?} acknowledged", id);
            }
            let _ = sender.send(BleEvent::WriteCompleted {
                peripheral: id,
                result,
            });
        });
    }

    /// Resolve the peripheral, run `request` on its own task and forward the
    /// resulting event, or a `Failed` event on error.
    fn spawn_request<F, Fut>(&self, id: PeripheralId, request: F)
    where
        F: FnOnce(Peripheral) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<BtleplugEvent, BleError>> + Send + 'static,
    {
        let adapter = self.adapter.clone();
        let sender = self.event_sender.clone();

        tokio::spawn(async move {
            let event = match adapter.peripheral(&id).await {
                Ok(peripheral) => request(peripheral).await,
                Err(e) => Err(e.into()),
            };
            let event = event.unwrap_or_else(|e| {
                error!("Request for {:?} failed: {}", id, e);
                BleEvent::Failed {
                    peripheral: Some(id),
                    reason: e.to_string(),
                }
            });
            let _ = sender.send(event);
        });
    }
}

/// Keep only the GATT attributes identified by `filter`
fn matching<T: GattAttribute>(
    attributes: impl IntoIterator<Item = T>,
    filter: ServiceIdentifier,
) -> Vec<T> {
    attributes
        .into_iter()
        .filter(|attribute| attribute.uuid() == filter.uuid())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bluetooth::protocol::SERVICE_ID;
    use btleplug::api::CharPropFlags;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    const BATTERY: Uuid = Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb);

    fn characteristic(uuid: Uuid, service_uuid: Uuid) -> Characteristic {
        Characteristic {
            uuid,
            service_uuid,
            properties: CharPropFlags::WRITE,
            descriptors: BTreeSet::new(),
        }
    }

    fn service(uuid: Uuid, characteristics: &[Uuid]) -> Service {
        Service {
            uuid,
            primary: true,
            characteristics: characteristics
                .iter()
                .map(|c| characteristic(*c, uuid))
                .collect(),
        }
    }

    #[test]
    fn test_services_filtered_by_uuid() {
        let services = vec![
            service(BATTERY, &[BATTERY]),
            service(SERVICE_ID.uuid(), &[SERVICE_ID.uuid()]),
        ];
        let kept = matching(services, SERVICE_ID);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].uuid, SERVICE_ID.uuid());

        assert!(matching(vec![service(BATTERY, &[])], SERVICE_ID).is_empty());
    }

    #[test]
    fn test_characteristics_filtered_by_uuid() {
        let light = service(SERVICE_ID.uuid(), &[BATTERY, SERVICE_ID.uuid()]);
        let kept = matching(light.characteristics.iter().cloned(), SERVICE_ID);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].uuid, SERVICE_ID.uuid());

        let other = service(SERVICE_ID.uuid(), &[BATTERY]);
        assert!(matching(other.characteristics.iter().cloned(), SERVICE_ID).is_empty());
    }
}
