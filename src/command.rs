//! Control-plane commands and their legacy numeric encoding.

use crate::error::{NicResult, nic_err};
use crate::session::Directions;

/// Legacy command numbers of the character-device `ioctl` surface.
pub mod nr {
    /// Debug statistics placeholder, accepted and ignored.
    pub const READ_STAT: u32 = 0;
    /// Start a session.
    pub const INIT: u32 = 1;
    /// End a session.
    pub const EXIT: u32 = 2;
    /// Return a receive buffer to the hardware.
    pub const PREPARE_RX: u32 = 3;
    /// Transmit a user buffer.
    pub const XMIT: u32 = 4;
    /// Write an AXI register.
    pub const WRITE_REG: u32 = 5;
    /// Read an AXI register. The argument is the 32-bit register address;
    /// wider arguments are rejected.
    pub const READ_REG: u32 = 6;
}

/// A decoded control-plane command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Accepted for compatibility, does nothing.
    LegacyProbe,
    /// Start a session notified for `mask`; `arg` is passed to the init hook.
    StartSession {
        /// Directions to be notified about.
        mask: Directions,
        /// Opaque hook argument.
        arg: u64,
    },
    /// End the session; `arg` is passed to the exit hook.
    EndSession {
        /// Opaque hook argument.
        arg: u64,
    },
    /// Hand receive buffer `slot` back to the hardware.
    PrepareReceiveBuffer {
        /// Buffer slot index.
        slot: u64,
    },
    /// Transmit the user buffer described by `encoded` (reference and size).
    Transmit {
        /// Buffer reference and size.
        encoded: u64,
    },
    /// Write `value` to AXI register `addr`.
    WriteRegister {
        /// Register address.
        addr: u32,
        /// Value to write.
        value: u32,
    },
    /// Read AXI register `addr`.
    ReadRegister {
        /// Register address.
        addr: u32,
    },
}

impl Command {
    /// Decodes a raw command number and argument.
    pub fn decode(cmd: u32, arg: u64) -> NicResult<Self> {
        Ok(match cmd {
            nr::READ_STAT => Command::LegacyProbe,
            nr::INIT => Command::StartSession {
                mask: Directions::from_bits_truncate(arg as u32),
                arg,
            },
            nr::EXIT => Command::EndSession { arg },
            nr::PREPARE_RX => Command::PrepareReceiveBuffer { slot: arg },
            nr::XMIT => Command::Transmit { encoded: arg },
            nr::WRITE_REG => Command::WriteRegister {
                addr: (arg >> 32) as u32,
                value: arg as u32,
            },
            nr::READ_REG => match u32::try_from(arg) {
                Ok(addr) => Command::ReadRegister { addr },
                Err(_) => return nic_err!(InvalidArgument, "register address {:#x} out of range", arg),
            },
            _ => return nic_err!(InvalidArgument, "unknown command {}", cmd),
        })
    }
}

/// What a command hands back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// Nothing to return.
    Done,
    /// Word returned by a session hook, 0 when the hook is absent.
    Hook(u64),
    /// Status returned by the transmit hook.
    Status(i32),
    /// Register value, with the register address packed into the upper
    /// 32 bits as older register tools expect.
    Register(u64),
}

impl Response {
    /// Packs a register read result for legacy callers.
    #[inline]
    pub const fn register(addr: u32, value: u32) -> Self {
        Response::Register(((addr as u64) << 32) | value as u64)
    }

    /// The value the legacy `ioctl` surface returns or copies out.
    pub const fn as_raw(self) -> i64 {
        match self {
            Response::Done => 0,
            Response::Hook(word) | Response::Register(word) => word as i64,
            Response::Status(status) => status as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NicError;

    #[test]
    fn test_decode_commands() {
        assert_eq!(Command::decode(nr::READ_STAT, 42), Ok(Command::LegacyProbe));
        assert_eq!(
            Command::decode(nr::INIT, 0x103),
            Ok(Command::StartSession {
                mask: Directions::RX | Directions::TX,
                arg: 0x103
            })
        );
        assert_eq!(
            Command::decode(nr::WRITE_REG, 0x4401_0000_dead_beef),
            Ok(Command::WriteRegister {
                addr: 0x4401_0000,
                value: 0xdead_beef
            })
        );
        assert_eq!(
            Command::decode(nr::READ_REG, 0x4401_0004),
            Ok(Command::ReadRegister { addr: 0x4401_0004 })
        );
    }

    #[test]
    fn test_decode_unknown() {
        assert_eq!(Command::decode(0x99, 0), Err(NicError::InvalidArgument));
    }

    #[test]
    fn test_decode_read_reg_rejects_wide_address() {
        assert_eq!(
            Command::decode(nr::READ_REG, 0x1_0000_0000),
            Err(NicError::InvalidArgument)
        );
        assert_eq!(
            Command::decode(nr::READ_REG, u32::MAX as u64),
            Ok(Command::ReadRegister { addr: u32::MAX })
        );
    }

    #[test]
    fn test_register_response_packs_address() {
        let resp = Response::register(0x10, 0xabcd);
        assert_eq!(resp, Response::Register(0x0000_0010_0000_abcd));
        assert_eq!(Response::Status(-5).as_raw(), -5);
        assert_eq!(Response::Done.as_raw(), 0);
    }
}
