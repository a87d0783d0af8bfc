//! Two-channel status indicator

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IndicatorChannel {
    Red,
    Green,
}

/// Binary indicator outputs (typically two LEDs)
pub trait IndicatorOutput {
    fn set(&mut self, channel: IndicatorChannel, on: bool);
}
