//! Services the user interface consumes from the hardware layer.
//!
//! The hardware-specific half of the driver (descriptor rings, the NAPI loop,
//! the buffer layout) plugs in through these traits. Only the pieces the
//! control plane and the notification path actually call are modelled here.

use axerrno::AxResult;
use bitflags::bitflags;
use memory_addr::{PhysAddr, VirtAddr};

bitflags! {
    /// Hooks a [`UserOps`] implementation actually provides.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct UserCaps: u32 {
        /// [`UserOps::init`] is provided.
        const INIT = 1 << 0;
        /// [`UserOps::exit`] is provided.
        const EXIT = 1 << 1;
        /// [`UserOps::resolve_page`] is provided.
        const MMAP = 1 << 2;
        /// [`UserOps::prepare_rx_buffer`] is provided.
        const PREPARE_RX = 1 << 3;
        /// [`UserOps::start_xmit`] is provided.
        const XMIT = 1 << 4;
    }
}

/// Hardware session hooks.
///
/// A hook is only invoked when its bit is present in
/// [`UserOps::capabilities`]; the default bodies are never reached otherwise.
pub trait UserOps: Send + Sync {
    /// Hooks provided by this implementation.
    fn capabilities(&self) -> UserCaps;

    /// Called when a user session starts. The argument is opaque to the
    /// control plane and the returned word is handed back to the user.
    fn init(&self, _arg: u64) -> u64 {
        0
    }

    /// Called when a user session ends.
    fn exit(&self, _arg: u64) -> u64 {
        0
    }

    /// Resolves a mapping request of `size` bytes to the physical address of
    /// the buffer area backing it.
    ///
    /// `slot_hint` is the number of regions already mapped in this session.
    fn resolve_page(&self, _size: usize, _slot_hint: usize) -> Option<PhysAddr> {
        None
    }

    /// Hands the receive buffer at `slot` back to the hardware.
    fn prepare_rx_buffer(&self, _slot: u64) {}

    /// Starts transmission of a user buffer. `encoded` carries the buffer
    /// reference and its size; the returned status is passed back verbatim.
    fn start_xmit(&self, _encoded: u64) -> i32 {
        0
    }
}

/// Data-path interrupt control.
pub trait IrqControl: Send + Sync {
    /// Masks the data-path interrupt on the device.
    fn mask_irq(&self);

    /// Unmasks the data-path interrupt on the device.
    fn unmask_irq(&self);

    /// Suppresses local bottom halves so the producer path cannot run on this
    /// CPU while the consumer holds the flag lock.
    fn disable_bh(&self) {}

    /// Reverses [`IrqControl::disable_bh`].
    fn enable_bh(&self) {}
}

/// The caller's address space, used to install buffer mappings.
pub trait AddressSpace {
    /// Maps `size` bytes of physical memory at `paddr` to `vaddr`.
    fn remap(&mut self, vaddr: VirtAddr, paddr: PhysAddr, size: usize) -> AxResult;
}

/// The blocking context of a caller of `poll`.
pub trait WaitContext {
    /// Whether a signal is pending for the calling task.
    fn signal_pending(&self) -> bool;

    /// Gives up the CPU while waiting for a wakeup.
    fn relax(&self) {
        core::hint::spin_loop();
    }
}
