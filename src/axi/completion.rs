//! Completion slot word decoding.
//!
//! The hardware reports each transaction in an 8-byte slot of the host
//! completion buffer:
//!
//! ```text
//! 63            32 31             0
//! ┌───────────────┬───────────────┐
//! │    status     │     data      │
//! └───────────────┴───────────────┘
//! ```

/// Total size of the host completion buffer.
pub const AXI_COMPLETION_SIZE: usize = 16;

const STATUS_SHIFT: u32 = 32;
const DATA_MASK: u64 = (1 << STATUS_SHIFT) - 1;

/// One of the two completion slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionSlot {
    /// Read completion, first 8 bytes of the buffer.
    Read,
    /// Write completion, second 8 bytes of the buffer.
    Write,
}

impl CompletionSlot {
    /// Byte offset of the slot inside the completion buffer.
    #[inline]
    pub const fn offset(self) -> usize {
        match self {
            CompletionSlot::Read => 0,
            CompletionSlot::Write => 8,
        }
    }
}

/// Transaction status reported in the upper half of a completion word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    /// The hardware has not answered yet.
    Waiting,
    /// The transaction completed.
    Okay,
    /// The hardware rejected the access.
    Nacked,
    /// A status code this driver does not know about.
    Other(u32),
}

impl CompletionStatus {
    const WAIT: u32 = 0x0;
    const OKAY: u32 = 0x1;
    const NACK: u32 = 0x2;

    /// Decodes a raw status code.
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            Self::WAIT => CompletionStatus::Waiting,
            Self::OKAY => CompletionStatus::Okay,
            Self::NACK => CompletionStatus::Nacked,
            other => CompletionStatus::Other(other),
        }
    }

    /// Encodes the status back to its raw code.
    pub const fn as_raw(self) -> u32 {
        match self {
            CompletionStatus::Waiting => Self::WAIT,
            CompletionStatus::Okay => Self::OKAY,
            CompletionStatus::Nacked => Self::NACK,
            CompletionStatus::Other(raw) => raw,
        }
    }
}

/// A raw completion slot word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Completion(pub u64);

impl Completion {
    /// The cleared slot value written before each transaction.
    pub const CLEARED: Completion = Completion(0);

    /// Builds a completion word as the hardware would write it.
    #[inline]
    pub const fn new(status: CompletionStatus, data: u32) -> Self {
        Self(((status.as_raw() as u64) << STATUS_SHIFT) | data as u64)
    }

    /// The status half.
    #[inline]
    pub const fn status(self) -> CompletionStatus {
        CompletionStatus::from_raw((self.0 >> STATUS_SHIFT) as u32)
    }

    /// The data half.
    #[inline]
    pub const fn data(self) -> u32 {
        (self.0 & DATA_MASK) as u32
    }
}
