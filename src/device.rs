//! The per-device control plane.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, Ordering};

use memory_addr::VirtAddrRange;

use crate::axi::{AxiBus, AxiChannel};
use crate::command::{Command, Response};
use crate::config::{MsgLevel, NicUserConfig};
use crate::error::{NicResult, nic_err};
use crate::mmap::{MappedRegion, MappingService};
use crate::notify::{NotificationHub, PollEvents};
use crate::ops::{AddressSpace, IrqControl, UserCaps, UserOps, WaitContext};
use crate::session::{Direction, Directions, SessionState};

/// User-facing interface of one NIC.
///
/// Owns the register bus, the notification hub and the mapping service, and
/// sequences control-plane commands across them. The interrupt path reaches
/// the same hub through [`NicUserDevice::notifier`].
pub struct NicUserDevice<C: AxiChannel> {
    ops: Arc<dyn UserOps>,
    hub: NotificationHub,
    bus: AxiBus<C>,
    mappings: MappingService,
}

impl<C: AxiChannel> NicUserDevice<C> {
    /// Attaches the user interface to a device.
    pub fn new(
        ops: Arc<dyn UserOps>,
        irq: Arc<dyn IrqControl>,
        channel: C,
        config: NicUserConfig,
    ) -> Self {
        let hub = NotificationHub::new(irq);
        hub.set_msg_level(config.msg_level);
        if config.msg_level.contains(MsgLevel::PROBE) {
            debug!(
                "user interface attached: caps={:?} axi_loop_threshold={} page_size={:#x}",
                ops.capabilities(),
                config.axi_loop_threshold,
                config.page_size
            );
        }
        Self {
            ops,
            hub,
            bus: AxiBus::with_loop_threshold(channel, config.axi_loop_threshold),
            mappings: MappingService::new(config.page_size),
        }
    }

    /// The notification hub, for the interrupt path.
    #[inline]
    pub fn notifier(&self) -> &NotificationHub {
        &self.hub
    }

    /// The register bus.
    #[inline]
    pub fn bus(&self) -> &AxiBus<C> {
        &self.bus
    }

    /// The current message level.
    #[inline]
    pub fn msg_level(&self) -> MsgLevel {
        self.hub.msg_level()
    }

    /// Replaces the message level.
    #[inline]
    pub fn set_msg_level(&self, level: MsgLevel) {
        self.hub.set_msg_level(level);
    }

    #[inline]
    fn traced(&self, level: MsgLevel) -> bool {
        self.msg_level().contains(level)
    }

    /// A snapshot of the session state.
    pub fn session(&self) -> SessionState {
        self.hub.state()
    }

    /// Mappings granted in the current session.
    pub fn mapped_count(&self) -> usize {
        self.mappings.mapped_count()
    }

    /// Opens a user handle on the device.
    pub fn open(&self) -> UserFile<'_, C> {
        UserFile {
            dev: self,
            session: AtomicU64::new(NO_SESSION),
        }
    }

    /// Decodes and runs a legacy `ioctl` command.
    pub fn ioctl(&self, cmd: u32, arg: u64) -> NicResult<Response> {
        self.dispatch(Command::decode(cmd, arg)?)
    }

    /// Runs a control-plane command.
    pub fn dispatch(&self, cmd: Command) -> NicResult<Response> {
        match cmd {
            Command::LegacyProbe => Ok(Response::Done),
            Command::StartSession { mask, arg } => self.start_session(mask, arg).map(Response::Hook),
            Command::EndSession { arg } => Ok(Response::Hook(self.end_session(arg))),
            Command::PrepareReceiveBuffer { slot } => {
                self.prepare_rx_buffer(slot).map(|_| Response::Done)
            }
            Command::Transmit { encoded } => self.transmit(encoded).map(Response::Status),
            Command::WriteRegister { addr, value } => {
                self.write_register(addr, value).map(|_| Response::Done)
            }
            Command::ReadRegister { addr } => self
                .read_register(addr)
                .map(|value| Response::register(addr, value)),
        }
    }

    /// Starts a user session notified for `mask`.
    ///
    /// The session starts with the data-path interrupt masked. Returns the
    /// init hook's result, or 0 without one.
    pub fn start_session(&self, mask: Directions, arg: u64) -> NicResult<u64> {
        self.begin_session(mask, arg).map(|(_, ret)| ret)
    }

    /// Starts a session and returns its id along with the init hook's result.
    fn begin_session(&self, mask: Directions, arg: u64) -> NicResult<(u64, u64)> {
        let id = match self.hub.start_session(mask) {
            Ok(id) => id,
            Err(_) => {
                return nic_err!(Busy, "user session already in use (flags={:?})", self.hub.state());
            }
        };
        self.mappings.reset();
        let ret = if self.ops.capabilities().contains(UserCaps::INIT) {
            self.ops.init(arg)
        } else {
            0
        };
        if self.traced(MsgLevel::DRV) {
            debug!("user init: session={} flags={:?} ret={}", id, self.hub.state(), ret);
        }
        Ok((id, ret))
    }

    /// Ends the user session, leaving the interrupt unmasked with a gc resync
    /// pending. Returns the exit hook's result, or 0 without one.
    pub fn end_session(&self, arg: u64) -> u64 {
        let ret = self.exit_hook(arg);
        self.mappings.reset();
        self.hub.end_session();
        if self.traced(MsgLevel::DRV) {
            debug!("user exit: flags={:?} ret={}", self.hub.state(), ret);
        }
        ret
    }

    /// Ends session `id` on behalf of a handle that went away without
    /// cleaning up. A later session is left running.
    fn release_session(&self, id: u64) -> bool {
        if !self.hub.end_session_if(id) {
            return false;
        }
        warn!("user handle released with session {} still active, ending it", id);
        self.exit_hook(0);
        self.mappings.reset();
        true
    }

    fn exit_hook(&self, arg: u64) -> u64 {
        if self.ops.capabilities().contains(UserCaps::EXIT) {
            self.ops.exit(arg)
        } else {
            0
        }
    }

    /// Hands receive buffer `slot` back to the hardware.
    pub fn prepare_rx_buffer(&self, slot: u64) -> NicResult {
        if !self.ops.capabilities().contains(UserCaps::PREPARE_RX) {
            return nic_err!(Unsupported, "no lbuf preparation hook");
        }
        if self.traced(MsgLevel::DRV) {
            debug!("user-driven lbuf preparation: i={}", slot);
        }
        self.ops.prepare_rx_buffer(slot);
        Ok(())
    }

    /// Transmits the user buffer described by `encoded`, returning the
    /// hardware layer's status untouched.
    pub fn transmit(&self, encoded: u64) -> NicResult<i32> {
        if !self.ops.capabilities().contains(UserCaps::XMIT) {
            return nic_err!(Unsupported, "no user xmit hook");
        }
        Ok(self.ops.start_xmit(encoded))
    }

    /// Writes an AXI register.
    pub fn write_register(&self, addr: u32, value: u32) -> NicResult {
        self.bus
            .lock()
            .traced(self.msg_level())
            .write_register(addr, value)
    }

    /// Reads an AXI register.
    pub fn read_register(&self, addr: u32) -> NicResult<u32> {
        self.bus.lock().traced(self.msg_level()).read_register(addr)
    }

    /// Maps the next hardware buffer area at `range` in `aspace`.
    pub fn mmap<A: AddressSpace + ?Sized>(
        &self,
        range: VirtAddrRange,
        aspace: &mut A,
    ) -> NicResult<MappedRegion> {
        self.mappings
            .map(range, &*self.ops, aspace, self.msg_level())
    }

    /// Non-blocking readiness check. `None` stands for a caller without an
    /// event key and asks for both directions.
    pub fn poll(&self, requested: Option<PollEvents>) -> PollEvents {
        self.hub
            .poll(requested.unwrap_or(PollEvents::DEFAULT_KEY))
    }

    /// Blocks until a requested direction is ready or `ctx` is signalled.
    pub fn wait_for_events<W: WaitContext + ?Sized>(
        &self,
        requested: PollEvents,
        ctx: &W,
    ) -> NicResult<PollEvents> {
        self.hub.wait_for_events(requested, ctx)
    }

    /// Producer entry point; see [`NotificationHub::notify`].
    #[inline]
    pub fn notify(&self, dir: Direction) -> bool {
        self.hub.notify(dir)
    }
}

const NO_SESSION: u64 = 0;

/// An open handle on a [`NicUserDevice`].
///
/// Dropping the handle that started the running session ends that session,
/// as if the process had exited without cleaning up.
pub struct UserFile<'a, C: AxiChannel> {
    dev: &'a NicUserDevice<C>,
    /// Id of the last session this handle started.
    session: AtomicU64,
}

impl<'a, C: AxiChannel> UserFile<'a, C> {
    /// The device this handle is open on.
    #[inline]
    pub fn device(&self) -> &'a NicUserDevice<C> {
        self.dev
    }

    /// Decodes and runs a legacy `ioctl` command.
    pub fn ioctl(&self, cmd: u32, arg: u64) -> NicResult<Response> {
        self.dispatch(Command::decode(cmd, arg)?)
    }

    /// Runs a control-plane command on behalf of this handle.
    pub fn dispatch(&self, cmd: Command) -> NicResult<Response> {
        match cmd {
            Command::StartSession { mask, arg } => {
                let (id, ret) = self.dev.begin_session(mask, arg)?;
                self.session.store(id, Ordering::Release);
                Ok(Response::Hook(ret))
            }
            Command::EndSession { .. } => {
                self.session.store(NO_SESSION, Ordering::Release);
                self.dev.dispatch(cmd)
            }
            _ => self.dev.dispatch(cmd),
        }
    }

    /// Maps the next hardware buffer area at `range`.
    pub fn mmap<A: AddressSpace + ?Sized>(
        &self,
        range: VirtAddrRange,
        aspace: &mut A,
    ) -> NicResult<MappedRegion> {
        self.dev.mmap(range, aspace)
    }

    /// Non-blocking readiness check.
    pub fn poll(&self, requested: Option<PollEvents>) -> PollEvents {
        self.dev.poll(requested)
    }

    /// Blocks until a requested direction is ready or `ctx` is signalled.
    pub fn wait_for_events<W: WaitContext + ?Sized>(
        &self,
        requested: PollEvents,
        ctx: &W,
    ) -> NicResult<PollEvents> {
        self.dev.wait_for_events(requested, ctx)
    }
}

impl<C: AxiChannel> Drop for UserFile<'_, C> {
    fn drop(&mut self) {
        let id = *self.session.get_mut();
        if id != NO_SESSION {
            self.dev.release_session(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axi::{AxiReg, Completion, CompletionSlot, CompletionStatus};
    use crate::error::NicError;
    use core::sync::atomic::AtomicUsize;

    struct NullChannel;

    impl AxiChannel for NullChannel {
        fn clear_completion(&self, _slot: CompletionSlot) {}
        fn issue(&self, _reg: AxiReg, _word: u64) {}
        fn completion(&self, _slot: CompletionSlot) -> Completion {
            Completion::new(CompletionStatus::Okay, 0x77)
        }
    }

    #[derive(Default)]
    struct Hooks {
        inits: AtomicUsize,
        exits: AtomicUsize,
        last_arg: AtomicU64,
    }

    impl UserOps for Hooks {
        fn capabilities(&self) -> UserCaps {
            UserCaps::INIT | UserCaps::EXIT
        }

        fn init(&self, arg: u64) -> u64 {
            self.inits.fetch_add(1, Ordering::SeqCst);
            self.last_arg.store(arg, Ordering::SeqCst);
            0xaa
        }

        fn exit(&self, arg: u64) -> u64 {
            self.exits.fetch_add(1, Ordering::SeqCst);
            self.last_arg.store(arg, Ordering::SeqCst);
            0xbb
        }
    }

    struct NoIrq;

    impl IrqControl for NoIrq {
        fn mask_irq(&self) {}
        fn unmask_irq(&self) {}
    }

    fn device() -> (Arc<Hooks>, NicUserDevice<NullChannel>) {
        let hooks = Arc::new(Hooks::default());
        let dev = NicUserDevice::new(
            hooks.clone(),
            Arc::new(NoIrq),
            NullChannel,
            NicUserConfig::default().with_msg_level(MsgLevel::all()),
        );
        (hooks, dev)
    }

    #[test]
    fn test_hooks_get_arguments() {
        let (hooks, dev) = device();
        assert_eq!(dev.start_session(Directions::RX, 0x51), Ok(0xaa));
        assert_eq!(hooks.last_arg.load(Ordering::SeqCst), 0x51);
        assert_eq!(dev.end_session(0x52), 0xbb);
        assert_eq!(hooks.last_arg.load(Ordering::SeqCst), 0x52);
    }

    #[test]
    fn test_busy_does_not_call_hook() {
        let (hooks, dev) = device();
        dev.start_session(Directions::RX, 0).unwrap();
        assert_eq!(dev.start_session(Directions::TX, 0), Err(NicError::Busy));
        assert_eq!(hooks.inits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_capabilities() {
        let (_hooks, dev) = device();
        assert_eq!(
            dev.dispatch(Command::PrepareReceiveBuffer { slot: 1 }),
            Err(NicError::Unsupported)
        );
        assert_eq!(
            dev.dispatch(Command::Transmit { encoded: 1 }),
            Err(NicError::Unsupported)
        );
    }

    #[test]
    fn test_read_register_packs_address() {
        let (_hooks, dev) = device();
        assert_eq!(
            dev.dispatch(Command::ReadRegister { addr: 0x20 }),
            Ok(Response::Register(0x0000_0020_0000_0077))
        );
        assert_eq!(dev.ioctl(crate::command::nr::READ_STAT, 0), Ok(Response::Done));
    }

    #[test]
    fn test_dropping_owner_ends_session() {
        let (hooks, dev) = device();
        {
            let file = dev.open();
            file.dispatch(Command::StartSession {
                mask: Directions::RX,
                arg: 0,
            })
            .unwrap();
            // A second handle does not own the session
            drop(dev.open());
            assert!(dev.session().is_active());
        }
        assert!(!dev.session().is_active());
        assert_eq!(hooks.exits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_msg_level_roundtrip() {
        let (_hooks, dev) = device();
        dev.set_msg_level(MsgLevel::INTR);
        assert_eq!(dev.msg_level(), MsgLevel::INTR);
    }
}
