//! Error taxonomy shared by every peripheral.

use core::fmt;

/// Errors reported by the I/O core.
///
/// Steady-state operations (`read`, `write`, polling) return these as plain
/// `Result` values. Initialization raises them through
/// [`FaultDomain::raise`](crate::fault::FaultDomain::raise).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Error {
    /// Bad handle, zero-length request or out-of-range peripheral index.
    InvalidArgument = 1,
    /// The mechanism layer reported an error status.
    HardwareFault = 2,
    /// A synchronous transfer exceeded its bound.
    Timeout = 3,
    /// A transfer was requested while another one is in flight, or the
    /// peripheral is already claimed.
    ResourceBusy = 4,
    /// A producer overwrote unread data. Non-fatal.
    Overflow = 5,
}

impl Error {
    /// Returns the stable numeric code of this error.
    #[inline]
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Looks up an error by its numeric code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::InvalidArgument),
            2 => Some(Self::HardwareFault),
            3 => Some(Self::Timeout),
            4 => Some(Self::ResourceBusy),
            5 => Some(Self::Overflow),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => f.write_str("invalid argument"),
            Self::HardwareFault => f.write_str("hardware fault"),
            Self::Timeout => f.write_str("operation timed out"),
            Self::ResourceBusy => f.write_str("resource busy"),
            Self::Overflow => f.write_str("buffer overflow"),
        }
    }
}
