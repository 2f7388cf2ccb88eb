//! Status indicator for the Improv IDENTIFY command.
//!
//! [`GpioIndicator`] drives any `embedded-hal` output pin (an LED on the
//! board); [`NullIndicator`] is used where no indicator is fitted and in
//! simulation.  Pin errors are logged and swallowed: identify is
//! best-effort and never reported through the protocol.

use embedded_hal::digital::OutputPin;
use log::{info, warn};

use crate::app::ports::IndicatorPort;

pub struct GpioIndicator<P: OutputPin> {
    pin: P,
    active_low: bool,
    on: bool,
}

impl<P: OutputPin> GpioIndicator<P> {
    pub fn new(pin: P, active_low: bool) -> Self {
        let mut indicator = Self {
            pin,
            active_low,
            on: true,
        };
        indicator.set_indicator(false);
        indicator
    }

    pub fn is_on(&self) -> bool {
        self.on
    }
}

impl<P: OutputPin> IndicatorPort for GpioIndicator<P> {
    fn set_indicator(&mut self, on: bool) {
        if self.on == on {
            return;
        }
        let high = on != self.active_low;
        let result = if high { self.pin.set_high() } else { self.pin.set_low() };
        match result {
            Ok(()) => self.on = on,
            Err(e) => warn!("Indicator: pin write failed: {:?}", e),
        }
    }
}

/// Indicator that only logs.
#[derive(Debug, Default)]
pub struct NullIndicator {
    on: bool,
}

impl NullIndicator {
    pub fn is_on(&self) -> bool {
        self.on
    }
}

impl IndicatorPort for NullIndicator {
    fn set_indicator(&mut self, on: bool) {
        if self.on != on {
            info!("Indicator(sim): {}", if on { "on" } else { "off" });
            self.on = on;
        }
    }
}
