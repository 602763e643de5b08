//! Poll event masks.

use bitflags::bitflags;

use crate::session::{Direction, Directions};

bitflags! {
    /// Poll event bits, numerically identical to the Linux `POLL*` values.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PollEvents: u32 {
        /// Data to read.
        const IN = 0x001;
        /// Urgent data to read.
        const PRI = 0x002;
        /// Writing is possible.
        const OUT = 0x004;
        /// Error condition.
        const ERR = 0x008;
        /// Normal data to read.
        const RDNORM = 0x040;
        /// Priority band data to read.
        const RDBAND = 0x080;
        /// Normal data may be written.
        const WRNORM = 0x100;
        /// Priority band data may be written.
        const WRBAND = 0x200;
    }
}

impl PollEvents {
    /// Events assumed when the caller supplies no event key.
    pub const DEFAULT_KEY: PollEvents =
        PollEvents::IN.union(PollEvents::OUT).union(PollEvents::ERR);

    /// Directions requested by this event mask.
    pub fn directions(self) -> Directions {
        let mut dirs = Directions::empty();
        if self.intersects(PollEvents::IN | PollEvents::RDNORM) {
            dirs |= Directions::RX;
        }
        if self.intersects(PollEvents::OUT | PollEvents::WRNORM) {
            dirs |= Directions::TX;
        }
        dirs
    }

    /// Events reported when `dir` becomes ready.
    pub const fn ready(dir: Direction) -> PollEvents {
        match dir {
            Direction::Rx => PollEvents::IN.union(PollEvents::RDNORM),
            Direction::Tx => PollEvents::OUT.union(PollEvents::WRNORM),
        }
    }

    /// Key carried by a producer wakeup on `dir`.
    pub const fn wake_key(dir: Direction) -> PollEvents {
        match dir {
            Direction::Rx => PollEvents::ready(dir).union(PollEvents::RDBAND),
            Direction::Tx => PollEvents::ready(dir).union(PollEvents::WRBAND),
        }
    }
}
