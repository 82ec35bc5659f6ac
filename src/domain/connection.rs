//! Connection State Machine
//!
//! Drives a light from "connect requested" to a writable session:
//!
//! ```text
//! Idle ──connect──▶ Scanning ──name match──▶ Connecting ──connected──▶ ServiceDiscovery
//!   ▲                                                                        │
//!   │                                                              service found
//!   │                                                                        ▼
//!   └──── disconnect / failure ◀──── Ready ◀──characteristic found── CharacteristicDiscovery
//! ```
//!
//! The machine performs no I/O. Every input returns the effects the caller
//! must carry out (start a scan, connect, open a session, ...). Inputs that
//! do not apply to the current state are dropped and reported as
//! [`Effect::Dropped`].

use crate::domain::models::{ConnectionStatus, DeviceIdentity, ServiceIdentifier};
use std::fmt;
use uuid::Uuid;

/// A discovered GATT service or characteristic.
pub trait GattAttribute {
    fn uuid(&self) -> Uuid;
}

/// Outcome of a platform request, delivered serially to the owner of the
/// state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum BleEvent<P, S, C> {
    PeripheralDiscovered {
        peripheral: P,
        local_name: Option<String>,
        rssi: Option<i16>,
    },
    Connected {
        peripheral: P,
    },
    Disconnected {
        peripheral: P,
    },
    ServicesDiscovered {
        peripheral: P,
        services: Vec<S>,
    },
    CharacteristicsDiscovered {
        peripheral: P,
        service: S,
        characteristics: Vec<C>,
    },
    WriteCompleted {
        peripheral: P,
        result: Result<(), String>,
    },
    /// A request failed. `peripheral` is `None` for adapter-level failures
    /// such as a scan that could not be started.
    Failed {
        peripheral: Option<P>,
        reason: String,
    },
}

/// Why an input or command was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The expected service or characteristic was absent from a result set.
    NoMatch,
    /// The input refers to a peripheral or stage that is no longer current.
    StaleReference,
    /// A command was issued before a session was ready.
    PreconditionUnmet,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NoMatch => "no match",
            Self::StaleReference => "stale reference",
            Self::PreconditionUnmet => "precondition unmet",
        };
        f.write_str(label)
    }
}

/// A connected peripheral together with its resolved control characteristic.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionHandle<P, C> {
    pub peripheral: P,
    pub characteristic: C,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect<P, S, C> {
    StartScan {
        filter: ServiceIdentifier,
    },
    Connect {
        peripheral: P,
    },
    DiscoverServices {
        peripheral: P,
        filter: ServiceIdentifier,
    },
    DiscoverCharacteristics {
        peripheral: P,
        service: S,
        filter: ServiceIdentifier,
    },
    OpenSession(SessionHandle<P, C>),
    CloseSession,
    Dropped(DropReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState<P, C> {
    Idle,
    Scanning,
    Connecting { target: P },
    ServiceDiscovery { target: P },
    CharacteristicDiscovery { target: P },
    Ready { session: SessionHandle<P, C> },
}

impl<P, C> ConnectionState<P, C> {
    pub fn status(&self) -> ConnectionStatus {
        match self {
            Self::Idle => ConnectionStatus::Idle,
            Self::Scanning => ConnectionStatus::Scanning,
            Self::Connecting { .. } => ConnectionStatus::Connecting,
            Self::ServiceDiscovery { .. } => ConnectionStatus::DiscoveringServices,
            Self::CharacteristicDiscovery { .. } => ConnectionStatus::DiscoveringCharacteristics,
            Self::Ready { .. } => ConnectionStatus::Ready,
        }
    }

    /// The pinned peripheral, once one has been matched.
    pub fn target(&self) -> Option<&P> {
        match self {
            Self::Idle | Self::Scanning => None,
            Self::Connecting { target }
            | Self::ServiceDiscovery { target }
            | Self::CharacteristicDiscovery { target } => Some(target),
            Self::Ready { session } => Some(&session.peripheral),
        }
    }
}

enum Input<P, S, C> {
    ConnectRequested,
    Ble(BleEvent<P, S, C>),
}

pub struct ConnectionStateMachine<P, S, C> {
    device: DeviceIdentity,
    service: ServiceIdentifier,
    state: ConnectionState<P, C>,
    _attributes: std::marker::PhantomData<fn() -> S>,
}

impl<P, S, C> ConnectionStateMachine<P, S, C>
where
    P: Clone + PartialEq + fmt::Debug,
    S: GattAttribute + Clone,
    C: GattAttribute + Clone,
{
    pub fn new(device: DeviceIdentity, service: ServiceIdentifier) -> Self {
        Self {
            device,
            service,
            state: ConnectionState::Idle,
            _attributes: std::marker::PhantomData,
        }
    }

    pub fn state(&self) -> &ConnectionState<P, C> {
        &self.state
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state.status()
    }

    pub fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    pub fn service(&self) -> ServiceIdentifier {
        self.service
    }

    /// Start scanning. Ignored unless the machine is idle.
    pub fn request_connect(&mut self) -> Vec<Effect<P, S, C>> {
        self.apply(Input::ConnectRequested)
    }

    pub fn handle(&mut self, event: BleEvent<P, S, C>) -> Vec<Effect<P, S, C>> {
        self.apply(Input::Ble(event))
    }

    fn apply(&mut self, input: Input<P, S, C>) -> Vec<Effect<P, S, C>> {
        let state = std::mem::replace(&mut self.state, ConnectionState::Idle);
        let (next, effects) = self.transition(state, input);
        self.state = next;
        effects
    }

    fn transition(
        &self,
        state: ConnectionState<P, C>,
        input: Input<P, S, C>,
    ) -> (ConnectionState<P, C>, Vec<Effect<P, S, C>>) {
        use ConnectionState as St;

        let event = match input {
            Input::ConnectRequested => {
                return match state {
                    St::Idle => (
                        St::Scanning,
                        vec![Effect::StartScan {
                            filter: self.service,
                        }],
                    ),
                    other => (other, Vec::new()),
                };
            }
            Input::Ble(event) => event,
        };

        match (state, event) {
            (St::Scanning, BleEvent::PeripheralDiscovered { peripheral, local_name, .. }) => {
                if self.device.matches(local_name.as_deref()) {
                    (
                        St::Connecting {
                            target: peripheral.clone(),
                        },
                        vec![Effect::Connect { peripheral }],
                    )
                } else {
                    (St::Scanning, Vec::new())
                }
            }
            // Only the first match is acted upon; later advertisements are noise.
            (state, BleEvent::PeripheralDiscovered { .. }) => (state, Vec::new()),

            (St::Connecting { target }, BleEvent::Connected { peripheral }) => {
                if peripheral == target {
                    (
                        St::ServiceDiscovery { target },
                        vec![Effect::DiscoverServices {
                            peripheral,
                            filter: self.service,
                        }],
                    )
                } else {
                    (St::Connecting { target }, stale())
                }
            }

            (St::ServiceDiscovery { target }, BleEvent::ServicesDiscovered { peripheral, services }) => {
                if peripheral != target {
                    return (St::ServiceDiscovery { target }, stale());
                }
                let wanted = self.service.uuid();
                match services.into_iter().find(|s| s.uuid() == wanted) {
                    Some(service) => (
                        St::CharacteristicDiscovery {
                            target: target.clone(),
                        },
                        vec![Effect::DiscoverCharacteristics {
                            peripheral: target,
                            service,
                            filter: self.service,
                        }],
                    ),
                    None => (St::ServiceDiscovery { target }, no_match()),
                }
            }

            (
                St::CharacteristicDiscovery { target },
                BleEvent::CharacteristicsDiscovered {
                    peripheral,
                    characteristics,
                    ..
                },
            ) => {
                if peripheral != target {
                    return (St::CharacteristicDiscovery { target }, stale());
                }
                let wanted = self.service.uuid();
                match characteristics.into_iter().find(|c| c.uuid() == wanted) {
                    Some(characteristic) => {
                        let session = SessionHandle {
                            peripheral: target,
                            characteristic,
                        };
                        (
                            St::Ready {
                                session: session.clone(),
                            },
                            vec![Effect::OpenSession(session)],
                        )
                    }
                    None => (St::CharacteristicDiscovery { target }, no_match()),
                }
            }

            (state, BleEvent::Disconnected { peripheral }) => {
                self.release_target(state, Some(&peripheral))
            }
            (state, BleEvent::Failed { peripheral, .. }) => match peripheral {
                Some(peripheral) => self.release_target(state, Some(&peripheral)),
                // Adapter-level failures only matter while the scan is the current request.
                None => match state {
                    St::Scanning => (St::Idle, Vec::new()),
                    other => (other, stale()),
                },
            },

            // Write completions are not connection events.
            (state, BleEvent::WriteCompleted { .. }) => (state, Vec::new()),

            (state, _) => (state, stale()),
        }
    }

    /// Return to idle if `peripheral` is the pinned target.
    fn release_target(
        &self,
        state: ConnectionState<P, C>,
        peripheral: Option<&P>,
    ) -> (ConnectionState<P, C>, Vec<Effect<P, S, C>>) {
        if state.target().is_none() || state.target() != peripheral {
            return (state, stale());
        }
        let effects = match state {
            ConnectionState::Ready { .. } => vec![Effect::CloseSession],
            _ => Vec::new(),
        };
        (ConnectionState::Idle, effects)
    }
}

fn stale<P, S, C>() -> Vec<Effect<P, S, C>> {
    vec![Effect::Dropped(DropReason::StaleReference)]
}

fn no_match<P, S, C>() -> Vec<Effect<P, S, C>> {
    vec![Effect::Dropped(DropReason::NoMatch)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Attr(Uuid);

    impl GattAttribute for Attr {
        fn uuid(&self) -> Uuid {
            self.0
        }
    }

    type Machine = ConnectionStateMachine<u32, Attr, Attr>;
    type Event = BleEvent<u32, Attr, Attr>;

    const SERVICE: ServiceIdentifier =
        ServiceIdentifier::new(Uuid::from_u128(0x00000000_0000_1000_8000_00805f9b34fb));
    const OTHER: Uuid = Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb);

    fn machine() -> Machine {
        Machine::new(DeviceIdentity::new("KBX5"), SERVICE)
    }

    fn discovered(peripheral: u32, name: &str) -> Event {
        BleEvent::PeripheralDiscovered {
            peripheral,
            local_name: Some(name.to_string()),
            rssi: Some(-50),
        }
    }

    fn services(peripheral: u32, uuids: &[Uuid]) -> Event {
        BleEvent::ServicesDiscovered {
            peripheral,
            services: uuids.iter().copied().map(Attr).collect(),
        }
    }

    fn characteristics(peripheral: u32, uuids: &[Uuid]) -> Event {
        BleEvent::CharacteristicsDiscovered {
            peripheral,
            service: Attr(SERVICE.uuid()),
            characteristics: uuids.iter().copied().map(Attr).collect(),
        }
    }

    /// Drive a fresh machine to the service discovery stage for peripheral 7.
    fn machine_at_service_discovery() -> Machine {
        let mut m = machine();
        m.request_connect();
        m.handle(discovered(7, "KBX5"));
        m.handle(BleEvent::Connected { peripheral: 7 });
        assert_eq!(m.status(), ConnectionStatus::DiscoveringServices);
        m
    }

    fn ready_machine() -> Machine {
        let mut m = machine_at_service_discovery();
        m.handle(services(7, &[SERVICE.uuid()]));
        m.handle(characteristics(7, &[SERVICE.uuid()]));
        assert_eq!(m.status(), ConnectionStatus::Ready);
        m
    }

    #[test]
    fn test_connect_request_starts_scan() {
        let mut m = machine();
        assert_eq!(
            m.request_connect(),
            vec![Effect::StartScan { filter: SERVICE }]
        );
        assert_eq!(m.status(), ConnectionStatus::Scanning);
    }

    #[test]
    fn test_connect_request_ignored_while_busy() {
        let mut m = machine();
        m.request_connect();
        assert!(m.request_connect().is_empty());
        m.handle(discovered(1, "KBX5"));
        assert!(m.request_connect().is_empty());
        assert_eq!(m.status(), ConnectionStatus::Connecting);
    }

    #[test]
    fn test_only_exact_name_is_connected() {
        let mut m = machine();
        m.request_connect();
        assert!(m.handle(discovered(1, "KBX")).is_empty());
        assert!(m.handle(discovered(2, "KBX5-2")).is_empty());
        assert!(m
            .handle(BleEvent::PeripheralDiscovered {
                peripheral: 3,
                local_name: None,
                rssi: None,
            })
            .is_empty());
        assert_eq!(m.status(), ConnectionStatus::Scanning);

        assert_eq!(
            m.handle(discovered(4, "KBX5")),
            vec![Effect::Connect { peripheral: 4 }]
        );
        assert_eq!(m.state().target(), Some(&4));
    }

    #[test]
    fn test_first_match_is_pinned() {
        let mut m = machine();
        m.request_connect();
        m.handle(discovered(1, "KBX5"));
        assert!(m.handle(discovered(2, "KBX5")).is_empty());
        assert_eq!(m.state().target(), Some(&1));
    }

    #[test]
    fn test_discovery_ignored_while_idle() {
        let mut m = machine();
        assert!(m.handle(discovered(1, "KBX5")).is_empty());
        assert_eq!(m.status(), ConnectionStatus::Idle);
    }

    #[test]
    fn test_stale_connection_rejected() {
        let mut m = machine();
        m.request_connect();
        m.handle(discovered(1, "KBX5"));

        let effects = m.handle(BleEvent::Connected { peripheral: 2 });
        assert_eq!(effects, vec![Effect::Dropped(DropReason::StaleReference)]);
        assert_eq!(m.status(), ConnectionStatus::Connecting);

        let effects = m.handle(BleEvent::Connected { peripheral: 1 });
        assert_eq!(
            effects,
            vec![Effect::DiscoverServices {
                peripheral: 1,
                filter: SERVICE
            }]
        );
    }

    #[test]
    fn test_missing_service_stalls() {
        let mut m = machine_at_service_discovery();
        let effects = m.handle(services(7, &[OTHER]));
        assert_eq!(effects, vec![Effect::Dropped(DropReason::NoMatch)]);
        assert_eq!(m.status(), ConnectionStatus::DiscoveringServices);

        let effects = m.handle(services(7, &[]));
        assert_eq!(effects, vec![Effect::Dropped(DropReason::NoMatch)]);
        assert_eq!(m.status(), ConnectionStatus::DiscoveringServices);
    }

    #[test]
    fn test_service_found_requests_characteristics() {
        let mut m = machine_at_service_discovery();
        let effects = m.handle(services(7, &[OTHER, SERVICE.uuid()]));
        assert_eq!(
            effects,
            vec![Effect::DiscoverCharacteristics {
                peripheral: 7,
                service: Attr(SERVICE.uuid()),
                filter: SERVICE,
            }]
        );
        assert_eq!(m.status(), ConnectionStatus::DiscoveringCharacteristics);
    }

    #[test]
    fn test_missing_characteristic_stalls() {
        let mut m = machine_at_service_discovery();
        m.handle(services(7, &[SERVICE.uuid()]));
        let effects = m.handle(characteristics(7, &[OTHER]));
        assert_eq!(effects, vec![Effect::Dropped(DropReason::NoMatch)]);
        assert_eq!(m.status(), ConnectionStatus::DiscoveringCharacteristics);
    }

    #[test]
    fn test_characteristic_found_opens_session() {
        let mut m = machine_at_service_discovery();
        m.handle(services(7, &[SERVICE.uuid()]));
        let effects = m.handle(characteristics(7, &[OTHER, SERVICE.uuid()]));
        assert_eq!(
            effects,
            vec![Effect::OpenSession(SessionHandle {
                peripheral: 7,
                characteristic: Attr(SERVICE.uuid()),
            })]
        );
        assert_eq!(m.status(), ConnectionStatus::Ready);
    }

    #[test]
    fn test_out_of_order_results_are_stale() {
        let mut m = ready_machine();
        let effects = m.handle(services(7, &[SERVICE.uuid()]));
        assert_eq!(effects, vec![Effect::Dropped(DropReason::StaleReference)]);
        let effects = m.handle(BleEvent::Connected { peripheral: 7 });
        assert_eq!(effects, vec![Effect::Dropped(DropReason::StaleReference)]);
        assert_eq!(m.status(), ConnectionStatus::Ready);
    }

    #[test]
    fn test_disconnect_closes_session() {
        let mut m = ready_machine();
        assert_eq!(
            m.handle(BleEvent::Disconnected { peripheral: 3 }),
            vec![Effect::Dropped(DropReason::StaleReference)]
        );
        assert_eq!(m.status(), ConnectionStatus::Ready);

        assert_eq!(
            m.handle(BleEvent::Disconnected { peripheral: 7 }),
            vec![Effect::CloseSession]
        );
        assert_eq!(m.status(), ConnectionStatus::Idle);

        // A fresh connect intent starts over.
        assert_eq!(
            m.request_connect(),
            vec![Effect::StartScan { filter: SERVICE }]
        );
    }

    #[test]
    fn test_failure_before_ready_returns_to_idle() {
        let mut m = machine_at_service_discovery();
        let effects = m.handle(BleEvent::Failed {
            peripheral: Some(7),
            reason: "gatt error".to_string(),
        });
        assert!(effects.is_empty());
        assert_eq!(m.status(), ConnectionStatus::Idle);
    }

    #[test]
    fn test_scan_failure_returns_to_idle() {
        let mut m = machine();
        m.request_connect();
        m.handle(BleEvent::Failed {
            peripheral: None,
            reason: "adapter off".to_string(),
        });
        assert_eq!(m.status(), ConnectionStatus::Idle);
    }

    #[test]
    fn test_write_completion_does_not_change_state() {
        let mut m = ready_machine();
        assert!(m
            .handle(BleEvent::WriteCompleted {
                peripheral: 7,
                result: Err("timeout".to_string()),
            })
            .is_empty());
        assert_eq!(m.status(), ConnectionStatus::Ready);
    }
}
