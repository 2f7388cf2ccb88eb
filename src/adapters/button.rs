//! Debounced push button used as the external Improv authorizer.
//!
//! Active-low momentary switch with pull-up (the boot button on most
//! ESP32 boards).  Polled from the main loop; a press is reported once
//! when the pin has read low for [`DEBOUNCE_MS`].

use embedded_hal::digital::InputPin;
use log::warn;

pub const DEBOUNCE_MS: u64 = 50;

pub struct AuthorizeButton<P: InputPin> {
    pin: P,
    low_since: Option<u64>,
    reported: bool,
}

impl<P: InputPin> AuthorizeButton<P> {
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            low_since: None,
            reported: false,
        }
    }

    /// Returns `true` once per debounced press.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        let pressed = match self.pin.is_low() {
            Ok(low) => low,
            Err(e) => {
                warn!("Button: pin read failed: {:?}", e);
                false
            }
        };

        if !pressed {
            self.low_since = None;
            self.reported = false;
            return false;
        }

        let since = *self.low_since.get_or_insert(now_ms);
        if !self.reported && now_ms.saturating_sub(since) >= DEBOUNCE_MS {
            self.reported = true;
            return true;
        }
        false
    }
}
