//! Bluetooth Module
//!
//! Provides BLE communication with the RGBW light.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    LightController                       │
//! │  (single task: BLE events, intents, pattern ticks)       │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼──────────────┐
//!         │             │              │
//!         ▼             ▼              ▼
//! ┌──────────────┐ ┌──────────────┐ ┌──────────────┐
//! │ State machine│ │DeviceSession │ │ BlePlatform  │
//! │ (domain)     │ │ - writes     │ │ - Scanner    │
//! │              │ │              │ │ - Connection │
//! └──────────────┘ └──────────────┘ └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - identifiers, default palette, command frame encoding
//! - [`platform`] - the [`BlePlatform`] trait the controller talks to
//! - [`adapter`] - btleplug-backed [`BlePlatform`]
//! - [`scanner`] - BLE device discovery
//! - [`connection`] - connection, GATT discovery and writes
//! - [`session`] - the ready-to-write device session
//! - [`service`] - main controller and its handle

pub mod adapter;
pub mod connection;
pub mod error;
pub mod platform;
pub mod protocol;
pub mod scanner;
pub mod service;
pub mod session;

#[cfg(test)]
pub(crate) mod mock;

pub use adapter::BtleplugPlatform;
pub use platform::BlePlatform;
pub use service::{Intent, LightController, LightHandle};
