//! Trait definitions for hardware abstraction and networking.
//!
//! This module defines the core abstractions that allow relay-bridge to:
//! - Run on different hardware (ESP32, desktop mock)
//! - Use different broker client implementations
//!
//! # Submodules
//!
//! - `hardware`: GPIO, serial lines, clock and delay
//! - `network`: MQTT client trait
//!
//! # Hardware Abstraction
//!
//! The key hardware traits are:
//!
//! - [`Gpio`]: Physical input, output and indicator pins
//! - [`SerialPort`]: Transport for the relay-board, meter and heating codecs
//! - [`Clock`]: Time source for `no_std` environments
//! - [`Delay`]: Blocking wait for half-duplex queries

pub mod hardware;
pub mod network;

pub use hardware::*;
pub use network::*;
