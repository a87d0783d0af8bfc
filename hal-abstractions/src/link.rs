//! Network link (station association) interface

/// Hardware address of the local interface
pub type MacAddress = [u8; 6];

/// Status events raised by the link driver
///
/// Drivers deliver these through an inbox owned by the network duty
/// instead of invoking application code from their own context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkEvent {
    /// Association with the access point completed
    LinkUp,
    /// Association lost
    LinkDown,
    /// A probe request was received while associated
    ProbeReceived,
    /// The authentication mode of the access point changed
    AuthChanged,
    /// The interface holds a local address; carries the interface MAC
    GotLocalAddress(MacAddress),
}

/// Link driver errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// The driver refused the association request
    Rejected,
    /// Credentials were too long for the driver
    InvalidCredentials,
}

impl core::fmt::Display for LinkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Rejected => write!(f, "Association rejected"),
            Self::InvalidCredentials => write!(f, "Invalid credentials"),
        }
    }
}

impl core::error::Error for LinkError {}

/// Station-mode link driver
pub trait LinkDriver {
    /// Start associating with `ssid`
    ///
    /// Returns once the request is issued. Completion is reported through
    /// [`LinkEvent`]s.
    fn connect(
        &mut self,
        ssid: &str,
        password: &str,
    ) -> impl core::future::Future<Output = Result<(), LinkError>>;

    /// Whether the interface currently holds a local address
    fn has_address(&self) -> bool;
}
