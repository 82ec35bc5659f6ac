//! Light Controller
//!
//! Main service that coordinates the connection state machine, the device
//! session and the pattern animation. Platform events, user intents and
//! pattern ticks are all handled on a single task, one at a time.

use crate::domain::connection::{BleEvent, ConnectionStateMachine, DropReason, Effect};
use crate::domain::models::{
    AppEvent, ColorCommand, ConnectionStatus, MessageSeverity, StatusMessage,
};
use crate::domain::pattern::PatternSequencer;
use crate::domain::settings::ControllerConfig;
use crate::infrastructure::bluetooth::platform::{BlePlatform, PlatformEvent};
use crate::infrastructure::bluetooth::protocol::encode;
use crate::infrastructure::bluetooth::session::DeviceSession;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Requests from the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Connect,
    SetColor(ColorCommand),
    StartPattern,
    StopPattern,
    Shutdown,
}

/// Cloneable, thread-safe entry point into a running [`LightController`]
///
/// Every method is fire-and-forget; once the controller has stopped, calls
/// are silently ignored.
#[derive(Debug, Clone)]
pub struct LightHandle {
    intents: mpsc::UnboundedSender<Intent>,
}

impl LightHandle {
    pub fn request_connect(&self) {
        self.send(Intent::Connect);
    }

    pub fn set_color(&self, red: u8, green: u8, blue: u8, white: u8) {
        self.send(Intent::SetColor(ColorCommand::new(red, green, blue, white)));
    }

    pub fn start_pattern(&self) {
        self.send(Intent::StartPattern);
    }

    pub fn stop_pattern(&self) {
        self.send(Intent::StopPattern);
    }

    pub fn shutdown(&self) {
        self.send(Intent::Shutdown);
    }

    pub fn send(&self, intent: Intent) {
        if self.intents.send(intent).is_err() {
            debug!("Controller stopped, ignoring {:?}", intent);
        }
    }
}

type Machine<B> = ConnectionStateMachine<
    <B as BlePlatform>::Peripheral,
    <B as BlePlatform>::Service,
    <B as BlePlatform>::Characteristic,
>;

pub struct LightController<B: BlePlatform> {
    platform: Arc<B>,
    machine: Machine<B>,
    session: DeviceSession<B>,
    sequencer: PatternSequencer,
    pattern_interval: Duration,
    pattern_timer: Option<Interval>,
    ble_events: mpsc::UnboundedReceiver<PlatformEvent<B>>,
    intents: mpsc::UnboundedReceiver<Intent>,
    event_sender: Option<mpsc::UnboundedSender<AppEvent>>,
    last_status: ConnectionStatus,
}

impl<B: BlePlatform> LightController<B> {
    /// Create a controller consuming `ble_events`, the channel `platform`
    /// reports into.
    pub fn new(
        platform: Arc<B>,
        ble_events: mpsc::UnboundedReceiver<PlatformEvent<B>>,
        config: ControllerConfig,
    ) -> (Self, LightHandle) {
        let (intent_tx, intent_rx) = mpsc::unbounded_channel();
        let controller = Self {
            machine: ConnectionStateMachine::new(config.device, config.service),
            session: DeviceSession::new(platform.clone()),
            sequencer: PatternSequencer::new(config.palette),
            pattern_interval: config.pattern_interval,
            pattern_timer: None,
            platform,
            ble_events,
            intents: intent_rx,
            event_sender: None,
            last_status: ConnectionStatus::Idle,
        };
        (
            controller,
            LightHandle {
                intents: intent_tx,
            },
        )
    }

    /// Publish status changes and notable messages to `sender`
    pub fn with_event_sender(mut self, sender: mpsc::UnboundedSender<AppEvent>) -> Self {
        self.event_sender = Some(sender);
        self
    }

    /// Run until [`Intent::Shutdown`] or until every [`LightHandle`] is dropped
    pub async fn run(mut self) {
        info!(
            "Light controller started (device {}, service {})",
            self.machine.device(),
            self.machine.service()
        );

        loop {
            tokio::select! {
                Some(event) = self.ble_events.recv() => self.handle_ble_event(event),
                intent = self.intents.recv() => match intent {
                    Some(Intent::Shutdown) | None => break,
                    Some(intent) => self.handle_intent(intent),
                },
                _ = next_tick(&mut self.pattern_timer) => self.on_pattern_tick(),
            }
        }

        self.stop_pattern();
        self.session.close();
        info!("Light controller stopped");
    }

    fn handle_intent(&mut self, intent: Intent) {
        debug!("Intent: {:?}", intent);
        match intent {
            Intent::Connect => {
                let effects = self.machine.request_connect();
                if effects.is_empty() {
                    info!("Connect requested while {}, ignoring", self.machine.status());
                }
                self.apply_effects(effects);
            }
            Intent::SetColor(color) => {
                self.session.send_command(&encode(color));
            }
            Intent::StartPattern => self.start_pattern(),
            Intent::StopPattern => self.stop_pattern(),
            Intent::Shutdown => {}
        }
    }

    fn handle_ble_event(&mut self, event: PlatformEvent<B>) {
        let failure = match &event {
            BleEvent::WriteCompleted {
                result: Err(reason),
                ..
            } => {
                warn!("Command write failed: {}", reason);
                return;
            }
            BleEvent::WriteCompleted { .. } => return,
            BleEvent::Failed { reason, .. } => Some(reason.clone()),
            _ => None,
        };

        let effects = self.machine.handle(event);
        if let Some(reason) = failure {
            let stale = effects
                .iter()
                .any(|e| matches!(e, Effect::Dropped(DropReason::StaleReference)));
            if stale {
                debug!("Ignoring failure of a superseded request: {}", reason);
            } else {
                self.send_log(
                    &format!("Bluetooth request failed: {}", reason),
                    MessageSeverity::Error,
                );
            }
        }
        self.apply_effects(effects);
    }

    fn apply_effects(&mut self, effects: Vec<Effect<B::Peripheral, B::Service, B::Characteristic>>) {
        let before = self.session.is_ready();
        let status_before = self.last_status;

        for effect in effects {
            match effect {
                Effect::StartScan { filter } => self.platform.scan(filter),
                Effect::Connect { peripheral } => self.platform.connect(&peripheral),
                Effect::DiscoverServices { peripheral, filter } => {
                    self.platform.discover_services(&peripheral, filter)
                }
                Effect::DiscoverCharacteristics {
                    peripheral,
                    service,
                    filter,
                } => self
                    .platform
                    .discover_characteristics(&peripheral, &service, filter),
                Effect::OpenSession(handle) => self.session.open(handle),
                Effect::CloseSession => self.session.close(),
                Effect::Dropped(reason) => debug!("Dropped event ({})", reason),
            }
        }

        let status = self.machine.status();
        if status != status_before {
            info!("Connection status: {} -> {}", status_before, status);
            self.last_status = status;
            self.send_event(AppEvent::ConnectionStatus(status));
        }
        if !before && self.session.is_ready() {
            self.send_log("Light ready", MessageSeverity::Success);
        }
    }

    fn start_pattern(&mut self) {
        if !self.sequencer.start() {
            debug!("Pattern already running");
            return;
        }
        info!(
            "Pattern started at cursor {} ({} ms interval)",
            self.sequencer.cursor(),
            self.pattern_interval.as_millis()
        );
        // First color goes out one full interval after start.
        let mut timer = tokio::time::interval_at(
            Instant::now() + self.pattern_interval,
            self.pattern_interval,
        );
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.pattern_timer = Some(timer);
    }

    fn stop_pattern(&mut self) {
        self.pattern_timer = None;
        if self.sequencer.stop() {
            info!("Pattern stopped at cursor {}", self.sequencer.cursor());
        }
    }

    fn on_pattern_tick(&mut self) {
        if let Some(color) = self.sequencer.tick() {
            self.session.send_command(&encode(color));
        }
    }

    fn send_event(&self, event: AppEvent) {
        if let Some(sender) = &self.event_sender {
            let _ = sender.send(event);
        }
    }

    fn send_log(&self, message: &str, severity: MessageSeverity) {
        self.send_event(AppEvent::LogMessage(StatusMessage {
            message: message.to_string(),
            severity,
        }));
    }
}

/// Wait for the next pattern tick, or forever if the pattern is stopped
async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
