use bitflags::bitflags;
use memory_addr::PAGE_SIZE_4K;

/// Spin bound for a single register transaction, so a dead AXI interface
/// cannot wedge the caller.
pub const DEFAULT_AXI_LOOP_THRESHOLD: usize = 100_000_000;

bitflags! {
    /// Message categories that gate debug traces, set through the
    /// adapter's message-level knob.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MsgLevel: u32 {
        /// Driver control path: sessions, mappings, register accesses.
        const DRV = 1 << 0;
        /// Attach-time setup.
        const PROBE = 1 << 1;
        /// Interrupt enable/disable and wakeups.
        const INTR = 1 << 9;
    }
}

/// The configuration of a NIC user interface
#[derive(Debug, Clone, Copy)]
pub struct NicUserConfig {
    /// Maximum number of completion polls per register transaction
    pub axi_loop_threshold: usize,
    /// Alignment required of mapping requests
    pub page_size: usize,
    /// Initial message level
    pub msg_level: MsgLevel,
}

/// The implemention for NicUserConfig
impl NicUserConfig {
    /// The new function for NicUserConfig
    pub const fn new() -> Self {
        Self {
            axi_loop_threshold: DEFAULT_AXI_LOOP_THRESHOLD,
            page_size: PAGE_SIZE_4K,
            msg_level: MsgLevel::empty(),
        }
    }

    /// Overrides the register transaction spin bound.
    pub const fn with_axi_loop_threshold(mut self, threshold: usize) -> Self {
        self.axi_loop_threshold = threshold;
        self
    }

    /// Overrides the mapping alignment.
    pub const fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Overrides the initial message level.
    pub const fn with_msg_level(mut self, msg_level: MsgLevel) -> Self {
        self.msg_level = msg_level;
        self
    }
}

impl Default for NicUserConfig {
    fn default() -> Self {
        Self::new()
    }
}
