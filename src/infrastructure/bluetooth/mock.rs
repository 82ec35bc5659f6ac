//! Recording platform for tests.

use crate::domain::connection::GattAttribute;
use crate::domain::models::ServiceIdentifier;
use crate::infrastructure::bluetooth::platform::BlePlatform;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct MockAttribute(pub Uuid);

impl GattAttribute for MockAttribute {
    fn uuid(&self) -> Uuid {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    Scan(ServiceIdentifier),
    Connect(u32),
    DiscoverServices(u32, ServiceIdentifier),
    DiscoverCharacteristics(u32, Uuid, ServiceIdentifier),
    Write(u32, Vec<u8>),
}

/// Sends every request to the paired receiver instead of a radio.
pub struct MockPlatform {
    calls: mpsc::UnboundedSender<PlatformCall>,
}

impl MockPlatform {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PlatformCall>) {
        let (calls, rx) = mpsc::unbounded_channel();
        (Self { calls }, rx)
    }

    fn record(&self, call: PlatformCall) {
        let _ = self.calls.send(call);
    }
}

impl BlePlatform for MockPlatform {
    type Peripheral = u32;
    type Service = MockAttribute;
    type Characteristic = MockAttribute;

    fn scan(&self, filter: ServiceIdentifier) {
        self.record(PlatformCall::Scan(filter));
    }

    fn connect(&self, peripheral: &u32) {
        self.record(PlatformCall::Connect(*peripheral));
    }

    fn discover_services(&self, peripheral: &u32, filter: ServiceIdentifier) {
        self.record(PlatformCall::DiscoverServices(*peripheral, filter));
    }

    fn discover_characteristics(
        &self,
        peripheral: &u32,
        service: &MockAttribute,
        filter: ServiceIdentifier,
    ) {
        self.record(PlatformCall::DiscoverCharacteristics(
            *peripheral,
            service.0,
            filter,
        ));
    }

    fn write_value(&self, peripheral: &u32, _characteristic: &MockAttribute, bytes: &[u8]) {
        self.record(PlatformCall::Write(*peripheral, bytes.to_vec()));
    }
}
