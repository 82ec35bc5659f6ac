//! BLE Platform Interface
//!
//! The requests the connection core makes of a Bluetooth stack. Every call
//! returns immediately; the outcome arrives later as a [`BleEvent`] on the
//! event channel the platform was created with.

use crate::domain::connection::{BleEvent, GattAttribute};
use crate::domain::models::ServiceIdentifier;
use btleplug::api::{Characteristic, Service};
use std::fmt;
use uuid::Uuid;

pub trait BlePlatform: Send + Sync + 'static {
    type Peripheral: Clone + PartialEq + fmt::Debug + Send + Sync + 'static;
    type Service: GattAttribute + Clone + fmt::Debug + Send + Sync + 'static;
    type Characteristic: GattAttribute + Clone + fmt::Debug + Send + Sync + 'static;

    /// Scan for peripherals advertising `filter`.
    fn scan(&self, filter: ServiceIdentifier);

    fn connect(&self, peripheral: &Self::Peripheral);

    fn discover_services(&self, peripheral: &Self::Peripheral, filter: ServiceIdentifier);

    fn discover_characteristics(
        &self,
        peripheral: &Self::Peripheral,
        service: &Self::Service,
        filter: ServiceIdentifier,
    );

    /// Write with response. Completion is reported as [`BleEvent::WriteCompleted`].
    fn write_value(
        &self,
        peripheral: &Self::Peripheral,
        characteristic: &Self::Characteristic,
        bytes: &[u8],
    );
}

/// Event type produced by platform `B`.
pub type PlatformEvent<B> = BleEvent<
    <B as BlePlatform>::Peripheral,
    <B as BlePlatform>::Service,
    <B as BlePlatform>::Characteristic,
>;

impl GattAttribute for Service {
    fn uuid(&self) -> Uuid {
        self.uuid
    }
}

impl GattAttribute for Characteristic {
    fn uuid(&self) -> Uuid {
        self.uuid
    }
}
