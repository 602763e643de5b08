//! Per-device user session state.
//!
//! The session is a tagged state rather than a bag of flags, so pending work
//! or a masked interrupt can only exist while a session is active:
//!
//! ```text
//!                  start(mask)
//!  ┌──────────────┐ ──────────────> ┌────────────────────────────┐
//!  │   Inactive   │                 │ Active { enabled, pending, │
//!  │ {gc_resync}  │ <────────────── │   irq_disabled, gc_resync }│
//!  └──────────────┘     end()       └────────────────────────────┘
//! ```
//!
//! A session may only start from the fully idle state: `Inactive` with no
//! gc resync outstanding. `end()` always leaves a resync request behind for
//! the data path to consume.

use bitflags::bitflags;

use crate::error::{NicError, NicResult};

bitflags! {
    /// Data directions a session can be notified about.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Directions: u32 {
        /// Receive.
        const RX = 1 << 0;
        /// Transmit completion.
        const TX = 1 << 1;
    }
}

/// A single data direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Receive.
    Rx,
    /// Transmit completion.
    Tx,
}

impl Direction {
    /// Both directions, receive first.
    pub const ALL: [Direction; 2] = [Direction::Rx, Direction::Tx];

    /// The opposite direction.
    #[inline]
    pub const fn other(self) -> Self {
        match self {
            Direction::Rx => Direction::Tx,
            Direction::Tx => Direction::Rx,
        }
    }

    /// The direction as a single-bit mask.
    #[inline]
    pub const fn flag(self) -> Directions {
        match self {
            Direction::Rx => Directions::RX,
            Direction::Tx => Directions::TX,
        }
    }

    /// Index into per-direction arrays.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Direction::Rx => 0,
            Direction::Tx => 1,
        }
    }
}

/// State of an active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveSession {
    /// Identifies this session among all sessions the device has run.
    pub id: u64,
    /// Directions the session asked to be notified about.
    pub enabled: Directions,
    /// Unconsumed work per direction.
    pub pending: Directions,
    /// The data-path interrupt is currently suppressed.
    pub irq_disabled: bool,
    /// The next interrupt re-enable must also resync the gc address.
    pub gc_resync_needed: bool,
}

/// The session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session. A gc resync may still be outstanding from the last one.
    Inactive {
        /// The data path has not yet resynced after the last session.
        gc_resync_needed: bool,
    },
    /// A user session is running.
    Active(ActiveSession),
}

impl SessionState {
    /// The state a device attaches in.
    pub const fn new() -> Self {
        SessionState::Inactive {
            gc_resync_needed: false,
        }
    }

    /// Whether a new session may start.
    #[inline]
    pub const fn is_idle(&self) -> bool {
        matches!(
            self,
            SessionState::Inactive {
                gc_resync_needed: false
            }
        )
    }

    /// Whether a session is active.
    #[inline]
    pub const fn is_active(&self) -> bool {
        matches!(self, SessionState::Active(_))
    }

    /// Starts a session notified for `mask`. The session starts with the
    /// interrupt suppressed.
    ///
    /// Fails with [`NicError::Busy`] and leaves the state untouched unless idle.
    pub fn start(&mut self, mask: Directions, id: u64) -> NicResult {
        if !self.is_idle() {
            return Err(NicError::Busy);
        }
        *self = SessionState::Active(ActiveSession {
            id,
            enabled: mask & Directions::all(),
            pending: Directions::empty(),
            irq_disabled: true,
            gc_resync_needed: false,
        });
        Ok(())
    }

    /// Drops to the resting state, requesting a gc resync on the next interrupt.
    pub fn end(&mut self) {
        *self = SessionState::Inactive {
            gc_resync_needed: true,
        };
    }

    /// Id of the active session.
    #[inline]
    pub fn session_id(&self) -> Option<u64> {
        match self {
            SessionState::Active(s) => Some(s.id),
            SessionState::Inactive { .. } => None,
        }
    }

    /// Directions the active session is notified about.
    #[inline]
    pub fn enabled(&self) -> Directions {
        match self {
            SessionState::Active(s) => s.enabled,
            SessionState::Inactive { .. } => Directions::empty(),
        }
    }

    /// Unconsumed work.
    #[inline]
    pub fn pending(&self) -> Directions {
        match self {
            SessionState::Active(s) => s.pending,
            SessionState::Inactive { .. } => Directions::empty(),
        }
    }

    /// Whether the data-path interrupt is suppressed.
    #[inline]
    pub fn irq_disabled(&self) -> bool {
        matches!(self, SessionState::Active(s) if s.irq_disabled)
    }

    /// Whether a gc resync is outstanding.
    #[inline]
    pub fn gc_resync_needed(&self) -> bool {
        match self {
            SessionState::Active(s) => s.gc_resync_needed,
            SessionState::Inactive { gc_resync_needed } => *gc_resync_needed,
        }
    }

    /// Marks `dir` as having new work. Returns `false` if no session is
    /// listening on that direction.
    pub fn set_pending(&mut self, dir: Direction) -> bool {
        match self {
            SessionState::Active(s) if s.enabled.contains(dir.flag()) => {
                s.pending |= dir.flag();
                true
            }
            _ => false,
        }
    }

    /// Consumes the pending bit of `dir`.
    pub fn take_pending(&mut self, dir: Direction) -> bool {
        match self {
            SessionState::Active(s) if s.pending.contains(dir.flag()) => {
                s.pending.remove(dir.flag());
                true
            }
            _ => false,
        }
    }

    /// Sets the suppressed-interrupt flag. No effect without a session.
    pub fn set_irq_disabled(&mut self, disabled: bool) {
        if let SessionState::Active(s) = self {
            s.irq_disabled = disabled;
        }
    }

    /// Requests a gc resync on the next interrupt. No effect without a session.
    pub fn request_gc_resync(&mut self) {
        if let SessionState::Active(s) = self {
            s.gc_resync_needed = true;
        }
    }

    /// Test-and-clear of the gc resync request.
    pub fn take_gc_resync(&mut self) -> bool {
        match self {
            SessionState::Active(ActiveSession {
                gc_resync_needed, ..
            })
            | SessionState::Inactive { gc_resync_needed } => {
                core::mem::replace(gc_resync_needed, false)
            }
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
