//! The memory-mapped AXI command channel.

use core::sync::atomic::{Ordering, fence};

use memory_addr::{PhysAddr, VirtAddr};

use super::completion::{Completion, CompletionSlot};

/// BAR0 register offsets of the AXI command interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum AxiReg {
    /// Read command: the register address.
    ReadAddr = 64,
    /// Bus address of the read completion slot.
    ReadCompletionAddr = 112,
    /// Write command: `addr << 32 | value`.
    WriteAddrVal = 128,
    /// Bus address of the write completion slot.
    WriteCompletionAddr = 176,
}

/// Hardware side of the register bus.
///
/// Implementations give volatile access to the completion slots and the
/// command registers. They carry no locking; [`super::AxiBus`] serializes
/// transactions.
pub trait AxiChannel: Send + Sync {
    /// Resets `slot` to [`Completion::CLEARED`].
    fn clear_completion(&self, slot: CompletionSlot);

    /// Writes a command word to a BAR0 register.
    fn issue(&self, reg: AxiReg, word: u64);

    /// Reads the current value of `slot`.
    fn completion(&self, slot: CompletionSlot) -> Completion;
}

/// An [`AxiChannel`] backed by real MMIO.
#[derive(Debug)]
pub struct MmioChannel {
    bar0: VirtAddr,
    completion: VirtAddr,
}

impl MmioChannel {
    /// Attaches to the AXI interface and programs the completion buffer
    /// addresses into the device.
    ///
    /// # Safety
    ///
    /// `bar0` must map the device's BAR0 for the lifetime of the channel, and
    /// `completion_virt` must map at least
    /// [`AXI_COMPLETION_SIZE`](super::AXI_COMPLETION_SIZE) bytes of
    /// DMA-coherent memory whose bus address is `completion_phys`.
    pub unsafe fn new(bar0: VirtAddr, completion_virt: VirtAddr, completion_phys: PhysAddr) -> Self {
        let channel = Self {
            bar0,
            completion: completion_virt,
        };
        let base = completion_phys.as_usize() as u64;
        channel.issue(
            AxiReg::ReadCompletionAddr,
            base + CompletionSlot::Read.offset() as u64,
        );
        channel.issue(
            AxiReg::WriteCompletionAddr,
            base + CompletionSlot::Write.offset() as u64,
        );
        debug!(
            "axi completion buffer at {:#x} (bus {:#x})",
            completion_virt.as_usize(),
            base
        );
        channel
    }

    #[inline]
    fn slot_ptr(&self, slot: CompletionSlot) -> *mut u64 {
        (self.completion.as_usize() + slot.offset()) as *mut u64
    }
}

impl AxiChannel for MmioChannel {
    fn clear_completion(&self, slot: CompletionSlot) {
        // SAFETY: the slot lies inside the completion buffer handed to `new`.
        unsafe { self.slot_ptr(slot).write_volatile(Completion::CLEARED.0) };
    }

    fn issue(&self, reg: AxiReg, word: u64) {
        let addr = self.bar0.as_usize() + reg as usize;
        // The cleared slot must be visible before the device can complete into it.
        fence(Ordering::SeqCst);
        cfg_if::cfg_if! {
            if #[cfg(target_pointer_width = "64")] {
                // SAFETY: `addr` is a register inside BAR0.
                unsafe { (addr as *mut u64).write_volatile(word) };
            } else {
                // SAFETY: `addr` is a register inside BAR0. Low half first,
                // the device latches the command on the high half.
                unsafe {
                    (addr as *mut u32).write_volatile(word as u32);
                    ((addr + 4) as *mut u32).write_volatile((word >> 32) as u32);
                }
            }
        }
    }

    fn completion(&self, slot: CompletionSlot) -> Completion {
        // SAFETY: the slot lies inside the completion buffer handed to `new`.
        Completion(unsafe { self.slot_ptr(slot).read_volatile() })
    }
}
