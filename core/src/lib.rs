//! Platform-agnostic core of the telemetry relay firmware
//!
//! Calendar and time zone arithmetic, the delivery queues, duty
//! supervision and the connectivity state machine. Nothing in here touches
//! a peripheral; boards plug in through `hal-abstractions`.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]
#![deny(warnings)]

// Must come first so the logging macros are visible to every module.
mod fmt;

pub mod config;
pub mod duty;
pub mod error;
pub mod identity;
pub mod indicator;
pub mod messaging;
pub mod status;
pub mod supervisor;
pub mod time;

pub use error::{Error, ProtocolViolation};
