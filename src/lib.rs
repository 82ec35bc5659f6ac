//! Bluetooth LE controller for a single RGBW light.
//!
//! - [`domain`] - colors, settings, the pattern sequencer and the connection state machine
//! - [`infrastructure`] - the btleplug platform, device session, controller task and logging
//! - [`presentation`] - the line-oriented console that turns user input into intents

pub mod domain;
pub mod infrastructure;
pub mod presentation;
