//! Shared status board
//!
//! Each field has exactly one writer: the network duty owns the
//! connectivity phase and the time shift, the messaging duty owns the
//! messaging phase and raises error blinks, the indication duty only reads
//! (and consumes blink requests). Single-word atomics carry the state.

use core::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, Ordering};

use crate::time::TimeShift;

/// Layered connectivity, ordered from least to most ready
///
/// A phase implies every phase below it except the failure markers:
/// `InternetUnreachable` ranks below `InternetReachable`, `TimeUnsynced`
/// above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ConnectivityPhase {
    LinkDown = 0,
    LinkUp = 1,
    InternetUnreachable = 2,
    InternetReachable = 3,
    TimeUnsynced = 4,
    TimeSynced = 5,
}

impl ConnectivityPhase {
    const fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::LinkUp,
            2 => Self::InternetUnreachable,
            3 => Self::InternetReachable,
            4 => Self::TimeUnsynced,
            5 => Self::TimeSynced,
            _ => Self::LinkDown,
        }
    }

    pub const fn link_ready(self) -> bool {
        self as u8 >= Self::LinkUp as u8
    }

    pub const fn internet_ready(self) -> bool {
        self as u8 >= Self::InternetReachable as u8
    }

    pub const fn time_ready(self) -> bool {
        matches!(self, Self::TimeSynced)
    }
}

/// Messaging session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MessagingPhase {
    Disconnected = 0,
    ConnectSucceeded = 1,
    NetworkError = 2,
    ConnectError = 3,
    Active = 4,
    Publishing = 5,
    PublishFailed = 6,
}

impl MessagingPhase {
    const fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::ConnectSucceeded,
            2 => Self::NetworkError,
            3 => Self::ConnectError,
            4 => Self::Active,
            5 => Self::Publishing,
            6 => Self::PublishFailed,
            _ => Self::Disconnected,
        }
    }

    /// Producers hold new telemetry while a drain may be running
    pub const fn is_busy(self) -> bool {
        matches!(self, Self::Active | Self::Publishing)
    }
}

pub struct StatusBoard {
    connectivity: AtomicU8,
    messaging: AtomicU8,
    time_shift: AtomicI32,
    error_blink: AtomicBool,
}

impl StatusBoard {
    pub const fn new() -> Self {
        Self {
            connectivity: AtomicU8::new(ConnectivityPhase::LinkDown as u8),
            messaging: AtomicU8::new(MessagingPhase::Disconnected as u8),
            time_shift: AtomicI32::new(0),
            error_blink: AtomicBool::new(false),
        }
    }

    pub fn connectivity(&self) -> ConnectivityPhase {
        ConnectivityPhase::from_u8(self.connectivity.load(Ordering::Acquire))
    }

    /// Network duty only
    pub fn set_connectivity(&self, phase: ConnectivityPhase) {
        let old = self.connectivity.swap(phase as u8, Ordering::AcqRel);
        if old != phase as u8 {
            info!("Connectivity: {:?} -> {:?}", ConnectivityPhase::from_u8(old), phase);
        }
    }

    pub fn messaging(&self) -> MessagingPhase {
        MessagingPhase::from_u8(self.messaging.load(Ordering::Acquire))
    }

    /// Messaging duty only
    pub fn set_messaging(&self, phase: MessagingPhase) {
        let old = self.messaging.swap(phase as u8, Ordering::AcqRel);
        if old != phase as u8 {
            debug!("Messaging: {:?} -> {:?}", MessagingPhase::from_u8(old), phase);
        }
    }

    /// Store the shift, then publish `TimeSynced` (network duty only)
    pub fn publish_sync(&self, shift: TimeShift) {
        self.time_shift.store(shift.0, Ordering::Release);
        self.set_connectivity(ConnectivityPhase::TimeSynced);
    }

    /// The shift from the last sync, if time is currently synced
    pub fn time_shift(&self) -> Option<TimeShift> {
        if self.connectivity().time_ready() {
            Some(TimeShift(self.time_shift.load(Ordering::Acquire)))
        } else {
            None
        }
    }

    pub fn request_error_blink(&self) {
        self.error_blink.store(true, Ordering::Release);
    }

    /// Consume a pending blink request
    pub fn take_error_blink(&self) -> bool {
        self.error_blink.swap(false, Ordering::AcqRel)
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_ordering_gates_layers() {
        assert!(!ConnectivityPhase::LinkDown.link_ready());
        assert!(ConnectivityPhase::InternetUnreachable.link_ready());
        assert!(!ConnectivityPhase::InternetUnreachable.internet_ready());
        assert!(ConnectivityPhase::TimeUnsynced.internet_ready());
        assert!(!ConnectivityPhase::TimeUnsynced.time_ready());
        assert!(ConnectivityPhase::TimeSynced.time_ready());
    }

    #[test]
    fn test_shift_visible_only_while_synced() {
        let board = StatusBoard::new();
        assert_eq!(board.time_shift(), None);
        board.publish_sync(TimeShift(-9000));
        assert_eq!(board.time_shift(), Some(TimeShift(-9000)));
        board.set_connectivity(ConnectivityPhase::LinkDown);
        assert_eq!(board.time_shift(), None);
    }

    #[test]
    fn test_error_blink_is_consumed_once() {
        let board = StatusBoard::new();
        board.request_error_blink();
        assert!(board.take_error_blink());
        assert!(!board.take_error_blink());
    }

    #[test]
    fn test_messaging_phase_round_trip() {
        let board = StatusBoard::new();
        board.set_messaging(MessagingPhase::Publishing);
        assert_eq!(board.messaging(), MessagingPhase::Publishing);
        assert!(board.messaging().is_busy());
    }
}
