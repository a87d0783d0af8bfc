//! Network-synchronized wall clock

/// Clock source errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockError {
    /// No sync has completed since power-up
    NotYetSynced,
    /// The clock hardware failed to answer
    Hardware,
}

impl core::fmt::Display for ClockError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotYetSynced => write!(f, "Clock not yet synced"),
            Self::Hardware => write!(f, "Clock hardware error"),
        }
    }
}

impl core::error::Error for ClockError {}

/// Wall clock fed by an SNTP-style sync
pub trait WallClock {
    /// Ask the clock to sync against `server`
    ///
    /// The sync may complete after this returns; poll [`WallClock::read`]
    /// to observe it.
    fn request_sync(
        &mut self,
        server: &str,
    ) -> impl core::future::Future<Output = Result<(), ClockError>>;

    /// Current reading in seconds since 1970-01-01T00:00:00
    fn read(&self) -> Result<u64, ClockError>;
}
