//! AXI register interface.
//!
//! Registers behind the AXI interconnect are reached through a pair of BAR0
//! command registers. The device answers each command by writing a
//! completion word into a small host buffer, which the driver polls:
//!
//! ```text
//!   driver                          device
//!     │ clear completion slot          │
//!     │── wmb ──────────────────────── │
//!     │ write command register ──────> │
//!     │                                │ performs AXI access
//!     │ <──── completion {status,data} │
//!     │ spin until status != WAIT      │
//! ```
//!
//! Polling is bounded by a fixed iteration count rather than a timer; a
//! device that never answers surfaces as [`NicError::Timeout`](crate::NicError::Timeout).

mod bus;
mod channel;
mod completion;

pub use bus::{AxiBus, AxiBusGuard, encode_write};
pub use channel::{AxiChannel, AxiReg, MmioChannel};
pub use completion::{AXI_COMPLETION_SIZE, Completion, CompletionSlot, CompletionStatus};
