//! btleplug Platform
//!
//! [`BlePlatform`] implementation backed by the host's Bluetooth adapter.

use crate::domain::connection::BleEvent;
use crate::domain::models::ServiceIdentifier;
use crate::infrastructure::bluetooth::connection::BleConnection;
use crate::infrastructure::bluetooth::error::BleError;
use crate::infrastructure::bluetooth::platform::BlePlatform;
use crate::infrastructure::bluetooth::scanner::BleScanner;
use btleplug::api::{Central, Characteristic, Manager as _, Service};
use btleplug::platform::{Adapter, Manager, PeripheralId};
use tokio::sync::mpsc;
use tracing::info;

pub type BtleplugEvent = BleEvent<PeripheralId, Service, Characteristic>;

/// Get the default Bluetooth adapter
pub async fn get_adapter() -> Result<Adapter, BleError> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    adapters.into_iter().next().ok_or(BleError::NoAdapter)
}

pub struct BtleplugPlatform {
    scanner: BleScanner,
    connection: BleConnection,
}

impl BtleplugPlatform {
    /// Open the first adapter and start forwarding its events to `event_sender`
    pub async fn new(event_sender: mpsc::UnboundedSender<BtleplugEvent>) -> Result<Self, BleError> {
        let adapter = get_adapter().await?;
        info!("Using Bluetooth adapter: {}", adapter.adapter_info().await?);

        let mut scanner = BleScanner::new(adapter.clone(), event_sender.clone());
        scanner.watch().await?;

        Ok(Self {
            scanner,
            connection: BleConnection::new(adapter, event_sender),
        })
    }

    /// Stop any running scan
    pub async fn shutdown(&self) -> Result<(), BleError> {
        self.scanner.stop().await
    }
}

impl BlePlatform for BtleplugPlatform {
    type Peripheral = PeripheralId;
    type Service = Service;
    type Characteristic = Characteristic;

    fn scan(&self, filter: ServiceIdentifier) {
        self.scanner.start(filter);
    }

    fn connect(&self, peripheral: &PeripheralId) {
        self.connection.connect(peripheral);
    }

    fn discover_services(&self, peripheral: &PeripheralId, filter: ServiceIdentifier) {
        self.connection.discover_services(peripheral, filter);
    }

    fn discover_characteristics(
        &self,
        peripheral: &PeripheralId,
        service: &Service,
        filter: ServiceIdentifier,
    ) {
        self.connection
            .discover_characteristics(peripheral, service, filter);
    }

    fn write_value(&self, peripheral: &PeripheralId, characteristic: &Characteristic, bytes: &[u8]) {
        self.connection.write(peripheral, characteristic, bytes);
    }
}
