//! Synchronous register transactions over the AXI command channel.

use core::sync::atomic::{Ordering, compiler_fence};

use spin::{Mutex, MutexGuard};

use crate::config::{DEFAULT_AXI_LOOP_THRESHOLD, MsgLevel};
use crate::error::{NicResult, nic_err};

use super::channel::{AxiChannel, AxiReg};
use super::completion::{Completion, CompletionSlot, CompletionStatus};

/// Packs a register address and value into the write command word.
#[inline]
pub const fn encode_write(addr: u32, value: u32) -> u64 {
    ((addr as u64) << 32) | value as u64
}

/// Outcome of one completion wait.
struct Polled {
    completion: Completion,
    status: CompletionStatus,
    loops: usize,
}

/// The register bus transactor.
///
/// At most one transaction is ever outstanding: every access runs to
/// completion under the bus lock. The lock is independent of the notification
/// flag lock and must never be taken while holding it.
pub struct AxiBus<C: AxiChannel> {
    channel: Mutex<C>,
    loop_threshold: usize,
}

impl<C: AxiChannel> AxiBus<C> {
    /// Creates a bus with the default spin bound.
    pub fn new(channel: C) -> Self {
        Self::with_loop_threshold(channel, DEFAULT_AXI_LOOP_THRESHOLD)
    }

    /// Creates a bus that gives up after `loop_threshold` completion polls.
    pub fn with_loop_threshold(channel: C, loop_threshold: usize) -> Self {
        Self {
            channel: Mutex::new(channel),
            loop_threshold: loop_threshold.max(1),
        }
    }

    /// The configured spin bound.
    #[inline]
    pub fn loop_threshold(&self) -> usize {
        self.loop_threshold
    }

    /// Holds the bus for a sequence of accesses (e.g. a read together with
    /// the copies around it).
    pub fn lock(&self) -> AxiBusGuard<'_, C> {
        AxiBusGuard {
            channel: self.channel.lock(),
            loop_threshold: self.loop_threshold,
            msg_level: MsgLevel::empty(),
        }
    }

    /// Writes `value` to the register at `addr`.
    pub fn write_register(&self, addr: u32, value: u32) -> NicResult {
        self.lock().write_raw(encode_write(addr, value))
    }

    /// Writes a pre-packed `addr << 32 | value` command word.
    pub fn write_raw(&self, addr_val: u64) -> NicResult {
        self.lock().write_raw(addr_val)
    }

    /// Reads the register at `addr`.
    pub fn read_register(&self, addr: u32) -> NicResult<u32> {
        self.lock().read_register(addr)
    }
}

/// Exclusive access to the register bus.
pub struct AxiBusGuard<'a, C: AxiChannel> {
    channel: MutexGuard<'a, C>,
    loop_threshold: usize,
    msg_level: MsgLevel,
}

impl<C: AxiChannel> AxiBusGuard<'_, C> {
    /// Enables per-transaction traces for this guard.
    pub fn traced(mut self, msg_level: MsgLevel) -> Self {
        self.msg_level = msg_level;
        self
    }

    /// Writes a pre-packed `addr << 32 | value` command word.
    pub fn write_raw(&mut self, addr_val: u64) -> NicResult {
        let polled = self.transact(CompletionSlot::Write, AxiReg::WriteAddrVal, addr_val);
        if self.msg_level.contains(MsgLevel::DRV) {
            debug!(
                "write_axi: addr={:#x} val={:#x} r={:?} (loop={})",
                addr_val >> 32,
                addr_val & 0xffff_ffff,
                polled.status,
                polled.loops
            );
        }
        self.check(polled, addr_val >> 32).map(|_| ())
    }

    /// Writes `value` to the register at `addr`.
    #[inline]
    pub fn write_register(&mut self, addr: u32, value: u32) -> NicResult {
        self.write_raw(encode_write(addr, value))
    }

    /// Reads the register at `addr`.
    pub fn read_register(&mut self, addr: u32) -> NicResult<u32> {
        let polled = self.transact(CompletionSlot::Read, AxiReg::ReadAddr, addr as u64);
        if self.msg_level.contains(MsgLevel::DRV) {
            debug!(
                "read_axi: addr={:#x} val={:#x} r={:?} (loop={})",
                addr,
                polled.completion.data(),
                polled.status,
                polled.loops
            );
        }
        self.check(polled, addr as u64)
    }

    /// Clear the slot, issue the command, spin on the slot's status.
    fn transact(&mut self, slot: CompletionSlot, reg: AxiReg, word: u64) -> Polled {
        self.channel.clear_completion(slot);
        self.channel.issue(reg, word);

        let mut loops = 0;
        loop {
            compiler_fence(Ordering::SeqCst);
            let completion = self.channel.completion(slot);
            match completion.status() {
                CompletionStatus::Waiting => {
                    loops += 1;
                    if loops >= self.loop_threshold {
                        // Hardware is presumed dead; leave the slot cleared.
                        self.channel.clear_completion(slot);
                        return Polled {
                            completion: Completion::CLEARED,
                            status: CompletionStatus::Waiting,
                            loops,
                        };
                    }
                }
                status => {
                    return Polled {
                        completion,
                        status,
                        loops,
                    };
                }
            }
        }
    }

    fn check(&self, polled: Polled, addr: u64) -> NicResult<u32> {
        match polled.status {
            CompletionStatus::Okay => Ok(polled.completion.data()),
            CompletionStatus::Nacked => nic_err!(Nacked, "axi access to {:#x} gets NACK", addr),
            CompletionStatus::Waiting => nic_err!(
                Timeout,
                "axi access to {:#x} not completed after {} polls",
                addr,
                polled.loops
            ),
            CompletionStatus::Other(raw) => {
                warn!("axi access to {:#x} completed with unknown status {:#x}", addr, raw);
                Ok(polled.completion.data())
            }
        }
    }
}
