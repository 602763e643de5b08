//! Data-path notification for user sessions.
//!
//! This module lets the interrupt path tell a blocked user session that
//! receive or transmit-completion work is available, and decides when the
//! data-path interrupt should be masked or unmasked.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  notify(dir)   ┌─────────────────────────┐
//! │ NAPI / irq path  │ ─────────────> │ NotificationHub         │
//! │ (softirq)        │ <───────────── │  - SessionState (flags) │
//! └──────────────────┘  irq_disabled  │  - WaitQueue rx / tx    │
//!                                     └───────────┬─────────────┘
//!                                                 │ poll / wait_for_events
//!                                                 ▼
//!                                     ┌─────────────────────────┐
//!                                     │ user session (process)  │
//!                                     └─────────────────────────┘
//! ```
//!
//! # Ordering
//!
//! Every flag update and every waiter registration happens under one lock,
//! so a `notify` that finishes before a poll starts is always seen by that
//! poll, and a `notify` racing with a poll either lands before the poll's
//! check or wakes the poll after it registered.

mod events;
mod hub;
mod wait_queue;

pub use events::PollEvents;
pub use hub::NotificationHub;
pub use wait_queue::{WaitOutcome, WaitQueue, sleep_on};
