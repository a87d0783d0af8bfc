//! Publish/subscribe messaging transport
//!
//! The transport owns wire framing and acknowledgement. The relay drives
//! one session per messaging cycle: `open`, any number of `publish`,
//! `subscribe` and `poll_inbound` calls, then `close`.

/// Delivery guarantee requested from the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QoS {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

/// Transport errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// Socket-level failure (DNS, TCP, connection dropped)
    Network,
    /// The broker refused or mangled the session handshake
    Protocol,
    /// Topic or payload exceeds what the transport can frame
    Rejected,
    /// The broker did not acknowledge a publish
    Publish,
    /// The broker did not acknowledge a subscribe
    Subscribe,
    /// No session is open
    NotConnected,
}

impl core::fmt::Display for TransportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Network => write!(f, "Transport network error"),
            Self::Protocol => write!(f, "Transport protocol error"),
            Self::Rejected => write!(f, "Topic or payload rejected"),
            Self::Publish => write!(f, "Publish not acknowledged"),
            Self::Subscribe => write!(f, "Subscribe not acknowledged"),
            Self::NotConnected => write!(f, "Transport not connected"),
        }
    }
}

impl core::error::Error for TransportError {}

/// Session parameters for [`MessagingTransport::open`]
#[derive(Debug, Clone, Copy)]
pub struct SessionParams<'a> {
    pub host: &'a str,
    pub port: u16,
    pub client_id: &'a str,
    pub timeout_ms: u32,
    pub keep_alive_secs: u16,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
}

/// Receiver for messages arriving on a subscription
pub trait InboundSink {
    fn on_message(&self, topic: &str, payload: &[u8], message_id: u16);
}

pub trait MessagingTransport {
    fn open(
        &mut self,
        params: &SessionParams<'_>,
    ) -> impl core::future::Future<Output = Result<(), TransportError>>;

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> impl core::future::Future<Output = Result<(), TransportError>>;

    /// Subscribe to `topic`; resolves to the QoS granted by the broker
    fn subscribe(
        &mut self,
        topic: &str,
        qos: QoS,
    ) -> impl core::future::Future<Output = Result<QoS, TransportError>>;

    /// Hand every message received since the last call to `sink`
    ///
    /// Resolves to the number of messages delivered.
    fn poll_inbound<S: InboundSink>(
        &mut self,
        sink: &S,
    ) -> impl core::future::Future<Output = Result<usize, TransportError>>;

    fn is_connected(&self) -> bool;

    fn close(&mut self) -> impl core::future::Future<Output = ()>;
}
