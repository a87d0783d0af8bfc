#![deny(unsafe_code)]
#![deny(warnings)]
//! Status LEDs

use embedded_hal::digital::OutputPin;
use hal_abstractions::{IndicatorChannel, IndicatorOutput};

/// Red and green indicator LEDs, active high
pub struct StatusLeds<R, G> {
    red: R,
    green: G,
}

impl<R: OutputPin, G: OutputPin> StatusLeds<R, G> {
    pub fn new(red: R, green: G) -> Self {
        Self { red, green }
    }
}

impl<R: OutputPin, G: OutputPin> IndicatorOutput for &mut StatusLeds<R, G> {
    fn set(&mut self, channel: IndicatorChannel, on: bool) {
        // GPIO writes on this chip cannot fail
        let _ = match channel {
            IndicatorChannel::Red => self.red.set_state(on.into()),
            IndicatorChannel::Green => self.green.set_state(on.into()),
        };
    }
}
