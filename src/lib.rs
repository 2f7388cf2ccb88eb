//! Halo firmware library.
//!
//! Improv WiFi provisioning over BLE plus a BLE advertisement relay for
//! upstream API subscribers.  Exposes the pure-logic modules for
//! integration testing.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod fsm;
pub mod improv;
pub mod relay;
pub mod upstream;
