//! Deadman-switch duty supervision
//!
//! Once per interval the supervisor tears down every duty whose heartbeat
//! flag is still armed, spawns every duty without a handle, then re-arms all
//! flags. A duty disarms its own flag through its [`Heartbeat`]; a duty that
//! fails to do so for a whole interval is considered hung.
//!
//! Teardown is abrupt. On this runtime it drops the duty future at its
//! current await point, see [`DutySlot`].

use core::future::Future;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embedded_hal_async::delay::DelayNs;

/// The supervised duties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Duty {
    Network,
    Messaging,
    Indication,
}

impl Duty {
    pub const ALL: [Duty; 3] = [Duty::Network, Duty::Messaging, Duty::Indication];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Supervisor's view of a duty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DutyStatus {
    NotStarted,
    Running,
    HeartbeatMissed,
}

/// Missed-heartbeat flags, one per duty
pub struct HeartbeatBoard {
    armed: [AtomicBool; 3],
}

impl HeartbeatBoard {
    pub const fn new() -> Self {
        Self {
            armed: [AtomicBool::new(false), AtomicBool::new(false), AtomicBool::new(false)],
        }
    }

    pub fn heartbeat(&self, duty: Duty) -> Heartbeat<'_> {
        Heartbeat { board: self, duty }
    }

    pub fn is_armed(&self, duty: Duty) -> bool {
        self.armed[duty.index()].load(Ordering::Acquire)
    }

    fn arm_all(&self) {
        for flag in &self.armed {
            flag.store(true, Ordering::Release);
        }
    }
}

impl Default for HeartbeatBoard {
    fn default() -> Self {
        Self::new()
    }
}

/// A duty's handle for clearing its own flag
#[derive(Clone, Copy)]
pub struct Heartbeat<'a> {
    board: &'a HeartbeatBoard,
    duty: Duty,
}

impl Heartbeat<'_> {
    pub fn beat(&self) {
        self.board.armed[self.duty.index()].store(false, Ordering::Release);
    }

    pub fn duty(&self) -> Duty {
        self.duty
    }
}

/// Spawn failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpawnError {
    /// The executor has no slot for the duty
    Busy,
}

/// Executor-side hooks for starting and killing duties
pub trait DutyRunner {
    type Handle;

    fn spawn(&mut self, duty: Duty) -> Result<Self::Handle, SpawnError>;

    /// Stop the duty unconditionally
    fn terminate(&mut self, duty: Duty, handle: Self::Handle);
}

/// What one supervision pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub terminated: [bool; 3],
    pub spawned: [bool; 3],
}

pub struct Supervisor<'a, R: DutyRunner> {
    runner: R,
    board: &'a HeartbeatBoard,
    handles: [Option<R::Handle>; 3],
    missed: [bool; 3],
    restarts: [u32; 3],
}

impl<'a, R: DutyRunner> Supervisor<'a, R> {
    pub fn new(runner: R, board: &'a HeartbeatBoard) -> Self {
        Self {
            runner,
            board,
            handles: [None, None, None],
            missed: [false; 3],
            restarts: [0; 3],
        }
    }

    /// One supervision pass: kill, spawn, re-arm
    pub fn supervise_once(&mut self) -> PassReport {
        let mut report = PassReport::default();

        for duty in Duty::ALL {
            let i = duty.index();
            self.missed[i] = false;
            if self.board.is_armed(duty) {
                if let Some(handle) = self.handles[i].take() {
                    warn!("Duty {:?} missed its heartbeat, terminating", duty);
                    self.runner.terminate(duty, handle);
                    self.missed[i] = true;
                    self.restarts[i] = self.restarts[i].wrapping_add(1);
                    report.terminated[i] = true;
                }
            }
        }

        for duty in Duty::ALL {
            let i = duty.index();
            if self.handles[i].is_none() {
                match self.runner.spawn(duty) {
                    Ok(handle) => {
                        info!("Duty {:?} spawned", duty);
                        self.handles[i] = Some(handle);
                        report.spawned[i] = true;
                    }
                    Err(e) => warn!("Duty {:?} spawn failed: {:?}", duty, e),
                }
            }
        }

        self.board.arm_all();
        report
    }

    /// Supervise forever, one pass per `interval_ms`
    pub async fn run<D: DelayNs>(&mut self, delay: &mut D, interval_ms: u32) -> ! {
        loop {
            self.supervise_once();
            delay.delay_ms(interval_ms).await;
        }
    }

    pub fn status(&self, duty: Duty) -> DutyStatus {
        let i = duty.index();
        if self.missed[i] {
            DutyStatus::HeartbeatMissed
        } else if self.handles[i].is_some() {
            DutyStatus::Running
        } else {
            DutyStatus::NotStarted
        }
    }

    /// Teardowns caused by missed heartbeats since startup
    pub fn restarts(&self, duty: Duty) -> u32 {
        self.restarts[duty.index()]
    }
}

/// Start/stop signals for one duty hosted by a long-lived executor task
///
/// The hosting task loops in [`DutySlot::host`]: it waits for a start,
/// runs the duty until it returns or a stop arrives, and waits again. A
/// stop drops the duty future wherever it is suspended.
pub struct DutySlot {
    start: Signal<CriticalSectionRawMutex, ()>,
    stop: Signal<CriticalSectionRawMutex, ()>,
}

impl DutySlot {
    pub const fn new() -> Self {
        Self {
            start: Signal::new(),
            stop: Signal::new(),
        }
    }

    pub fn start(&self) {
        self.start.signal(());
    }

    pub fn stop(&self) {
        self.stop.signal(());
    }

    /// Host the duty produced by `make` forever
    pub async fn host<F, Fut>(&self, mut make: F) -> !
    where
        F: FnMut() -> Fut,
        Fut: Future,
    {
        loop {
            self.run_next(make()).await;
        }
    }

    /// Wait for a start, then run `duty` until it returns or is stopped
    ///
    /// For duties that borrow state owned by the hosting task, which a
    /// `make` closure cannot lend out.
    pub async fn run_next<F: Future>(&self, duty: F) -> Option<F::Output> {
        self.start.wait().await;
        // A stop aimed at the previous instance must not kill this one.
        self.stop.reset();
        run_until_stopped(&self.stop, duty).await
    }
}

impl Default for DutySlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `duty` until it finishes or `stop` fires
///
/// Returns `None` when stopped.
pub async fn run_until_stopped<F: Future>(
    stop: &Signal<CriticalSectionRawMutex, ()>,
    duty: F,
) -> Option<F::Output> {
    match select(duty, stop.wait()).await {
        Either::First(output) => Some(output),
        Either::Second(()) => None,
    }
}

/// [`DutyRunner`] driving three [`DutySlot`]s
pub struct SlotRunner<'a> {
    slots: &'a [DutySlot; 3],
}

impl<'a> SlotRunner<'a> {
    pub const fn new(slots: &'a [DutySlot; 3]) -> Self {
        Self { slots }
    }
}

impl DutyRunner for SlotRunner<'_> {
    type Handle = Duty;

    fn spawn(&mut self, duty: Duty) -> Result<Duty, SpawnError> {
        self.slots[duty.index()].start();
        Ok(duty)
    }

    fn terminate(&mut self, duty: Duty, _handle: Duty) {
        self.slots[duty.index()].stop();
    }
}
