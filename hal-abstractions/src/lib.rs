//! Hardware abstraction traits for the telemetry relay
//!
//! This crate defines the seams between the platform-agnostic relay logic
//! and a board support package. BSPs implement these traits; `relay-core`
//! consumes them and never touches a peripheral directly.
//!
//! Every async operation returns `impl Future` so the traits stay usable
//! on executors without an allocator.

#![no_std]
#![deny(unsafe_code)]
#![deny(warnings)]

pub mod clock;
pub mod indicator;
pub mod link;
pub mod memory;
pub mod reachability;
pub mod transport;

pub use clock::{ClockError, WallClock};
pub use indicator::{IndicatorChannel, IndicatorOutput};
pub use link::{LinkDriver, LinkError, LinkEvent, MacAddress};
pub use memory::MemoryProbe;
pub use reachability::{Reachability, ReachabilityError};
pub use transport::{InboundSink, MessagingTransport, QoS, SessionParams, TransportError};
