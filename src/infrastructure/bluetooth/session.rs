//! Device Session
//!
//! Holds the ready-to-write connection and forwards command frames to it.

use crate::domain::connection::{DropReason, SessionHandle};
use crate::infrastructure::bluetooth::platform::BlePlatform;
use crate::infrastructure::bluetooth::protocol::CommandFrame;
use std::sync::Arc;
use tracing::{debug, info};

pub type PlatformSession<B> =
    SessionHandle<<B as BlePlatform>::Peripheral, <B as BlePlatform>::Characteristic>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The write was handed to the platform.
    Written,
    Dropped(DropReason),
}

/// Best-effort command sink for one light.
///
/// Without an open session every frame is dropped. With one, each call
/// issues exactly one write; frames are neither queued nor coalesced.
pub struct DeviceSession<B: BlePlatform> {
    platform: Arc<B>,
    handle: Option<PlatformSession<B>>,
}

impl<B: BlePlatform> DeviceSession<B> {
    pub fn new(platform: Arc<B>) -> Self {
        Self {
            platform,
            handle: None,
        }
    }

    pub fn open(&mut self, handle: PlatformSession<B>) {
        info!("Session ready on {:?}", handle.peripheral);
        self.handle = Some(handle);
    }

    pub fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            info!("Session closed on {:?}", handle.peripheral);
        }
    }

    pub fn is_ready(&self) -> bool {
        self.handle.is_some()
    }

    pub fn send_command(&self, frame: &CommandFrame) -> SendOutcome {
        let Some(handle) = self.handle.as_ref() else {
            debug!("Dropping command {:02X?}: no session", frame.as_bytes());
            return SendOutcome::Dropped(DropReason::PreconditionUnmet);
        };

        debug!("Writing command {:02X?}", frame.as_bytes());
        self.platform
            .write_value(&handle.peripheral, &handle.characteristic, frame.as_bytes());
        SendOutcome::Written
    }
}
