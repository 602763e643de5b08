//! The notification hub shared by the interrupt path and blocking pollers.
//!
//! # Interrupt mitigation
//!
//! A session starts with the data-path interrupt masked. The interrupt is
//! unmasked only when a poller is about to sleep with nothing ready, and the
//! producer asks for it to be masked again as soon as it wakes someone, so a
//! busy consumer runs without interrupts:
//!
//! ```text
//!  poll: nothing ready ──> unmask irq ──> sleep
//!                                           │
//!  irq ──> notify(dir) ──> pending |= dir   │
//!                      ──> irq_disabled = true (unless the other queue has waiters)
//!                      ──> wake queue[dir] ─┘
//! ```
//!
//! The mask request is skipped while anyone sleeps on the opposite queue;
//! masking then would leave that sleeper with no interrupt to wake it.

use alloc::sync::Arc;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use arrayvec::ArrayVec;
use spin::{Mutex, MutexGuard};

use crate::config::MsgLevel;
use crate::error::{NicError, NicResult};
use crate::ops::{IrqControl, WaitContext};
use crate::session::{Direction, Directions, SessionState};

use super::events::PollEvents;
use super::wait_queue::{WaitOutcome, WaitQueue, sleep_on};

/// Keeps local bottom halves off while the consumer holds the flag lock.
struct BhGuard<'a> {
    irq: &'a dyn IrqControl,
}

impl<'a> BhGuard<'a> {
    fn new(irq: &'a dyn IrqControl) -> Self {
        irq.disable_bh();
        Self { irq }
    }
}

impl Drop for BhGuard<'_> {
    fn drop(&mut self) {
        self.irq.enable_bh();
    }
}

/// The flag lock taken from process context. Fields drop in order: the lock
/// is released before bottom halves come back on.
struct FlagGuard<'a> {
    state: MutexGuard<'a, SessionState>,
    _bh: BhGuard<'a>,
}

impl Deref for FlagGuard<'_> {
    type Target = SessionState;

    fn deref(&self) -> &SessionState {
        &self.state
    }
}

impl DerefMut for FlagGuard<'_> {
    fn deref_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }
}

/// Session flags plus the receive and transmit wait queues.
///
/// The flag lock only ever covers O(1) bit manipulation and the interrupt
/// mask writes decided under it. It is never held across a sleep or a
/// register-bus transaction.
pub struct NotificationHub {
    state: Mutex<SessionState>,
    queues: [WaitQueue; 2],
    irq: Arc<dyn IrqControl>,
    msg_level: AtomicU32,
    /// Last session id handed out.
    sessions: AtomicU64,
}

impl NotificationHub {
    /// Creates a hub with no session.
    pub fn new(irq: Arc<dyn IrqControl>) -> Self {
        Self {
            state: Mutex::new(SessionState::new()),
            queues: [WaitQueue::new(), WaitQueue::new()],
            irq,
            msg_level: AtomicU32::new(0),
            sessions: AtomicU64::new(0),
        }
    }

    /// The current message level.
    #[inline]
    pub fn msg_level(&self) -> MsgLevel {
        MsgLevel::from_bits_retain(self.msg_level.load(Ordering::Relaxed))
    }

    /// Replaces the message level.
    #[inline]
    pub fn set_msg_level(&self, level: MsgLevel) {
        self.msg_level.store(level.bits(), Ordering::Relaxed);
    }

    #[inline]
    fn traced(&self, level: MsgLevel) -> bool {
        self.msg_level().contains(level)
    }

    /// Locks the flags from process context.
    fn lock(&self) -> FlagGuard<'_> {
        let bh = BhGuard::new(&*self.irq);
        FlagGuard {
            state: self.state.lock(),
            _bh: bh,
        }
    }

    /// A snapshot of the session state.
    pub fn state(&self) -> SessionState {
        let state = self.lock();
        *state
    }

    /// Number of pollers sleeping on `dir`.
    pub fn waiters(&self, dir: Direction) -> usize {
        self.queues[dir.index()].waiters()
    }

    /// Starts a session notified for `mask` and masks the data-path interrupt.
    ///
    /// The interrupt stays masked until a poller finds nothing to do.
    /// Returns the id of the new session.
    pub fn start_session(&self, mask: Directions) -> NicResult<u64> {
        let mut state = self.lock();
        let id = self.sessions.load(Ordering::Relaxed) + 1;
        state.start(mask, id)?;
        self.sessions.store(id, Ordering::Relaxed);
        self.irq.mask_irq();
        Ok(id)
    }

    /// Ends the session and unmasks the interrupt. The next interrupt service
    /// is asked to resync the gc address.
    pub fn end_session(&self) {
        {
            let mut state = self.lock();
            state.end();
        }
        self.irq.unmask_irq();
    }

    /// Ends the session only if it is still session `id`.
    ///
    /// The check and the transition happen under one lock hold, so a session
    /// started after `id` ended is never torn down.
    pub fn end_session_if(&self, id: u64) -> bool {
        {
            let mut state = self.lock();
            if state.session_id() != Some(id) {
                return false;
            }
            state.end();
        }
        self.irq.unmask_irq();
        true
    }

    /// Producer entry point, called by the data path when new receive or
    /// transmit-completion work exists.
    ///
    /// Returns `false` when no session listens on `dir`; the call is then a
    /// no-op. After a `true` return the caller should consult
    /// [`NotificationHub::irq_disabled`] to decide whether to leave the
    /// interrupt masked.
    ///
    /// Must be called with bottom halves already disabled (interrupt or
    /// softirq context).
    pub fn notify(&self, dir: Direction) -> bool {
        let mut state = self.state.lock();
        if !state.set_pending(dir) {
            return false;
        }
        if !self.queues[dir.other().index()].is_active() {
            state.set_irq_disabled(true);
        }
        let woke = self.queues[dir.index()].wake_all();
        drop(state);

        if self.traced(MsgLevel::DRV) {
            debug!(
                "wake up user process for {:?} (key={:?} waiters={})",
                dir,
                PollEvents::wake_key(dir),
                woke
            );
        }
        true
    }

    /// Whether the data path should leave its interrupt masked.
    pub fn irq_disabled(&self) -> bool {
        self.state.lock().irq_disabled()
    }

    /// Test-and-clear of the gc resync request, for the interrupt service.
    ///
    /// Consuming the request left by a finished session makes the device idle
    /// again.
    pub fn take_gc_resync(&self) -> bool {
        self.state.lock().take_gc_resync()
    }

    /// Non-blocking check: consumes and reports pending work for `requested`.
    ///
    /// An empty result means the caller would sleep, so a masked interrupt is
    /// unmasked before returning.
    pub fn poll(&self, requested: PollEvents) -> PollEvents {
        let mut state = self.lock();
        let ready = Self::collect(&mut state, requested);
        if ready.is_empty() {
            self.rearm(&mut state, requested);
        }
        drop(state);

        if self.traced(MsgLevel::INTR) {
            debug!("poll events={:?} mask={:?}", requested, ready);
        }
        ready
    }

    /// Blocking wait: returns as soon as any requested direction has pending
    /// work, sleeping on the matching queues in between.
    ///
    /// Directions the session never enabled are never reported. Fails with
    /// [`NicError::Interrupted`] if `ctx` is signalled while asleep.
    pub fn wait_for_events<W: WaitContext + ?Sized>(
        &self,
        requested: PollEvents,
        ctx: &W,
    ) -> NicResult<PollEvents> {
        let dirs = requested.directions();
        let mut seen: [Option<u64>; 2] = [None; 2];

        let result = loop {
            {
                let mut state = self.lock();
                let ready = Self::collect(&mut state, requested);
                if !ready.is_empty() {
                    break Ok(ready);
                }
                for dir in Direction::ALL {
                    if dirs.contains(dir.flag()) {
                        let wq = &self.queues[dir.index()];
                        let generation = match seen[dir.index()] {
                            None => wq.enqueue(),
                            Some(_) => wq.generation(),
                        };
                        seen[dir.index()] = Some(generation);
                    }
                }
                self.rearm(&mut state, requested);
            }

            let watched: ArrayVec<(&WaitQueue, u64), 2> = Direction::ALL
                .iter()
                .filter_map(|dir| seen[dir.index()].map(|g| (&self.queues[dir.index()], g)))
                .collect();
            if sleep_on(&watched, ctx) == WaitOutcome::Interrupted {
                break Err(NicError::Interrupted);
            }
        };

        for dir in Direction::ALL {
            if seen[dir.index()].is_some() {
                self.queues[dir.index()].dequeue();
            }
        }
        if self.traced(MsgLevel::INTR) {
            debug!("wait events={:?} result={:?}", requested, result);
        }
        result
    }

    /// Consumes pending bits for the requested directions.
    fn collect(state: &mut SessionState, requested: PollEvents) -> PollEvents {
        let dirs = requested.directions();
        Direction::ALL
            .iter()
            .filter(|dir| dirs.contains(dir.flag()) && state.take_pending(**dir))
            .fold(PollEvents::empty(), |ready, dir| ready | PollEvents::ready(*dir))
    }

    /// Unmasks a suppressed interrupt before the caller goes to sleep.
    fn rearm(&self, state: &mut SessionState, requested: PollEvents) {
        if !state.irq_disabled() {
            return;
        }
        // A transmit poller waits for buffer space, which needs the gc address in sync.
        if requested.directions().contains(Directions::TX) {
            state.request_gc_resync();
        }
        state.set_irq_disabled(false);
        self.irq.unmask_irq();
        if self.traced(MsgLevel::INTR) {
            debug!("enable irq before sleeping (events={:?})", requested);
        }
    }
}
