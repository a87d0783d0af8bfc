//! Relay error taxonomy
//!
//! Lower layers surface failures as status flags; these values travel only
//! as far as the duty that reacts to them, and into the log.

use hal_abstractions::{ClockError, LinkError, ReachabilityError};

/// Why a message was refused by the framing limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolViolation {
    /// Topic longer than the topic bound
    TopicTooLong,
    /// Payload longer than the payload bound
    PayloadTooLong,
    /// Payload bytes are not UTF-8
    InvalidEncoding,
    /// The transport refused to frame the message
    RejectedByTransport,
}

impl core::fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::TopicTooLong => write!(f, "topic too long"),
            Self::PayloadTooLong => write!(f, "payload too long"),
            Self::InvalidEncoding => write!(f, "payload is not UTF-8"),
            Self::RejectedByTransport => write!(f, "rejected by transport"),
        }
    }
}

/// Relay operation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Station association failed or was lost
    LinkFailure,
    /// DNS or TCP probe to the reachability host failed
    ReachabilityFailure,
    /// The clock did not report a plausible time within the sync window
    SyncTimeout,
    /// The messaging session could not be opened or dropped mid-cycle
    TransportConnectFailure,
    /// Topic or payload outside the framing limits
    ProtocolFailure(ProtocolViolation),
    /// The queue head failed every publish attempt
    PublishRetryExhausted,
    /// A queued message was evicted to make room
    QueueCapacityEviction,
    /// The device identity is not known yet
    IdentityUnresolved,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::LinkFailure => write!(f, "Link failure"),
            Self::ReachabilityFailure => write!(f, "Internet unreachable"),
            Self::SyncTimeout => write!(f, "Time sync timed out"),
            Self::TransportConnectFailure => write!(f, "Transport connect failure"),
            Self::ProtocolFailure(v) => write!(f, "Protocol failure: {}", v),
            Self::PublishRetryExhausted => write!(f, "Publish retries exhausted"),
            Self::QueueCapacityEviction => write!(f, "Queued message evicted"),
            Self::IdentityUnresolved => write!(f, "Device identity unresolved"),
        }
    }
}

impl core::error::Error for Error {}

impl From<ProtocolViolation> for Error {
    fn from(v: ProtocolViolation) -> Self {
        Error::ProtocolFailure(v)
    }
}

impl From<LinkError> for Error {
    fn from(_: LinkError) -> Self {
        Error::LinkFailure
    }
}

impl From<ReachabilityError> for Error {
    fn from(_: ReachabilityError) -> Self {
        Error::ReachabilityFailure
    }
}

impl From<ClockError> for Error {
    fn from(_: ClockError) -> Self {
        Error::SyncTimeout
    }
}
