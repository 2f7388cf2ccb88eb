//! Application core — pure domain logic, zero I/O.
//!
//! The Improv provisioning service and the event dispatcher that feeds it
//! and the advertisement relay.  All interaction with the radio and the
//! network happens through **port traits** defined in [`ports`], keeping
//! this layer fully testable without real peripherals.

pub mod dispatch;
pub mod ports;
pub mod service;
