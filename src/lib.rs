#![no_std]

//! # NIC User Interface
//!
//! This crate provides the user-facing control and notification layer of a
//! NIC driver. It lets a single user session drive the adapter directly:
//! start and end a session, map hardware buffers, hand receive buffers back,
//! transmit, access AXI registers, and block until the data path has work.
//! It is designed for `no_std` environments and uses the `alloc` crate for
//! shared ownership of the hardware-layer hooks.
//!
//! ## Architecture
//!
//! ### Register Access
//! - [`AxiBus`]: Serialized register transactions with a bounded completion wait
//! - [`AxiChannel`]: The command and completion interface of the adapter
//! - [`MmioChannel`]: [`AxiChannel`] over a mapped BAR and a completion area
//!
//! ### Notification
//! - [`NotificationHub`]: Session flags, wait queues and interrupt mitigation
//! - [`SessionState`]: Tagged session state (inactive / active)
//! - [`PollEvents`]: Readiness bits reported to pollers
//!
//! ### Control Plane
//! - [`NicUserDevice`]: Sequences commands across the pieces above
//! - [`UserFile`]: An open handle; releasing it ends an abandoned session
//! - [`Command`] / [`Response`]: Typed commands and their legacy encoding
//! - [`MappingService`]: Buffer mapping validation
//!
//! ### Hardware Layer Seams
//! - [`UserOps`]: Optional session hooks of the hardware layer
//! - [`IrqControl`]: Data-path interrupt mask control
//! - [`AddressSpace`]: Installs mappings into the caller's address space
//! - [`WaitContext`]: Signal checks and CPU relax for blocked pollers
//!
//! ## Examples
//!
//! ```rust,ignore
//! use axnic_user::{NicUserConfig, NicUserDevice, Direction, PollEvents, nr};
//!
//! let dev = NicUserDevice::new(hw_ops, irq_ctl, channel, NicUserConfig::default());
//! let file = dev.open();
//!
//! // Start a session notified for receive and transmit completion
//! file.ioctl(nr::INIT, 0x3)?;
//!
//! // Interrupt path
//! if dev.notify(Direction::Rx) && dev.notifier().irq_disabled() {
//!     // leave the data-path interrupt masked
//! }
//!
//! // User side
//! let ready = file.wait_for_events(PollEvents::DEFAULT_KEY, &task)?;
//! ```

extern crate alloc;
#[macro_use]
extern crate log;

mod axi;
mod command;
mod config;
mod device;
mod error;
mod mmap;
mod notify;
mod ops;
mod session;

pub use axi::{
    AXI_COMPLETION_SIZE, AxiBus, AxiBusGuard, AxiChannel, AxiReg, Completion, CompletionSlot,
    CompletionStatus, MmioChannel, encode_write,
};
pub use command::{Command, Response, nr};
pub use config::{DEFAULT_AXI_LOOP_THRESHOLD, MsgLevel, NicUserConfig};
pub use device::{NicUserDevice, UserFile};
pub use error::{NicError, NicResult};
pub use mmap::{MappedRegion, MappingService};
pub use notify::{NotificationHub, PollEvents, WaitOutcome, WaitQueue, sleep_on};
pub use ops::{AddressSpace, IrqControl, UserCaps, UserOps, WaitContext};
pub use session::{ActiveSession, Direction, Directions, SessionState};
