//! DNS and TCP reachability probing

/// Reachability probe errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReachabilityError {
    /// Name did not resolve
    DnsFailed,
    /// No socket could be allocated
    SocketFailed,
    /// The TCP handshake did not complete
    ConnectFailed,
}

impl core::fmt::Display for ReachabilityError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::DnsFailed => write!(f, "DNS resolution failed"),
            Self::SocketFailed => write!(f, "Socket allocation failed"),
            Self::ConnectFailed => write!(f, "TCP connect failed"),
        }
    }
}

impl core::error::Error for ReachabilityError {}

/// Name resolution plus a TCP connect probe
pub trait Reachability {
    /// Resolved address type
    type Address: Copy;

    fn resolve_host(
        &mut self,
        host: &str,
    ) -> impl core::future::Future<Output = Result<Self::Address, ReachabilityError>>;

    /// Open and immediately close a TCP connection to `address:port`
    fn tcp_probe(
        &mut self,
        address: Self::Address,
        port: u16,
    ) -> impl core::future::Future<Output = Result<(), ReachabilityError>>;
}
