//! Error type shared by the control plane, the register bus and the
//! notification path.

use core::fmt;

use axerrno::{AxError, LinuxError};

/// Errors reported to a user session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NicError {
    /// A session is already active on the device.
    Busy,
    /// The hardware layer does not provide the requested capability.
    Unsupported,
    /// Unknown command or malformed argument (e.g. misaligned mapping range).
    InvalidArgument,
    /// The hardware rejected a register transaction.
    Nacked,
    /// The hardware never completed a register transaction within the spin bound.
    Timeout,
    /// A blocking wait was cancelled by a pending signal.
    Interrupted,
    /// A collaborator failed; the error is passed through untouched.
    Collaborator(AxError),
}

/// Result alias used throughout the crate.
pub type NicResult<T = ()> = Result<T, NicError>;

impl NicError {
    /// Maps the error onto the errno the legacy character-device surface returns.
    ///
    /// `Nacked` and `Timeout` are indistinguishable to callers: both report
    /// an invalid access.
    pub fn as_linux_error(&self) -> LinuxError {
        match self {
            NicError::Busy => LinuxError::EBUSY,
            NicError::Unsupported => LinuxError::EOPNOTSUPP,
            NicError::InvalidArgument => LinuxError::EINVAL,
            NicError::Nacked | NicError::Timeout => LinuxError::EFAULT,
            NicError::Interrupted => LinuxError::EINTR,
            NicError::Collaborator(err) => LinuxError::from(*err),
        }
    }

    /// Negated errno, as returned from an `ioctl` handler.
    #[inline]
    pub fn code(&self) -> i32 {
        -self.as_linux_error().code()
    }

    /// Whether the error came out of a register-bus transaction.
    #[inline]
    pub const fn is_bus_fault(&self) -> bool {
        matches!(self, NicError::Nacked | NicError::Timeout)
    }
}

/// Builds a [`NicError`] from its variant name, logging the context message
/// if one is given.
macro_rules! nic_err_type {
    ($err:ident) => {
        $crate::error::NicError::$err
    };
    ($err:ident, $($msg:tt)+) => {{
        warn!(
            "[NicError::{:?}] {}",
            $crate::error::NicError::$err,
            format_args!($($msg)+)
        );
        $crate::error::NicError::$err
    }};
}

/// `Err` form of [`nic_err_type!`].
macro_rules! nic_err {
    ($($args:tt)+) => {
        Err($crate::error::nic_err_type!($($args)+))
    };
}

pub(crate) use {nic_err, nic_err_type};

impl From<AxError> for NicError {
    fn from(err: AxError) -> Self {
        NicError::Collaborator(err)
    }
}

impl fmt::Display for NicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NicError::Busy => f.write_str("user session already active"),
            NicError::Unsupported => f.write_str("operation not provided by the hardware layer"),
            NicError::InvalidArgument => f.write_str("invalid argument"),
            NicError::Nacked => f.write_str("register access nacked by hardware"),
            NicError::Timeout => f.write_str("register access never completed"),
            NicError::Interrupted => f.write_str("wait interrupted by signal"),
            NicError::Collaborator(err) => write!(f, "hardware layer error: {:?}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(NicError::Busy.as_linux_error(), LinuxError::EBUSY);
        assert_eq!(NicError::InvalidArgument.as_linux_error(), LinuxError::EINVAL);
        assert_eq!(NicError::Interrupted.as_linux_error(), LinuxError::EINTR);
        assert_eq!(NicError::Unsupported.as_linux_error(), LinuxError::EOPNOTSUPP);
    }

    #[test]
    fn test_bus_faults_look_alike() {
        assert_eq!(NicError::Nacked.code(), NicError::Timeout.code());
        assert_eq!(NicError::Nacked.code(), -LinuxError::EFAULT.code());
        assert!(NicError::Timeout.is_bus_fault());
        assert!(!NicError::Busy.is_bus_fault());
    }

    fn reject(busy: bool) -> NicResult<u32> {
        if busy {
            return nic_err!(Busy, "session {} still running", 3);
        }
        nic_err!(InvalidArgument)
    }

    #[test]
    fn test_err_macros_carry_variant() {
        assert_eq!(reject(true), Err(NicError::Busy));
        assert_eq!(reject(false), Err(NicError::InvalidArgument));
        assert_eq!(nic_err_type!(Timeout, "addr={:#x}", 0x40), NicError::Timeout);
    }

    #[test]
    fn test_collaborator_passthrough() {
        let err: NicError = AxError::NoMemory.into();
        assert_eq!(err, NicError::Collaborator(AxError::NoMemory));
        assert_eq!(err.as_linux_error(), LinuxError::ENOMEM);
    }
}
