//! Mechanism status codes.

use core::fmt;

use pslab_core::Error;

/// Failure reported by a mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwStatus {
    /// The peripheral reported an error.
    Error,
    /// The peripheral is busy with another operation.
    Busy,
    /// The peripheral did not respond in time.
    Timeout,
}

impl fmt::Display for HwStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("hardware error"),
            Self::Busy => f.write_str("hardware busy"),
            Self::Timeout => f.write_str("hardware timeout"),
        }
    }
}

/// Maps a mechanism failure onto the firmware error taxonomy.
impl From<HwStatus> for Error {
    fn from(status: HwStatus) -> Self {
        match status {
            HwStatus::Error => Error::HardwareFault,
            HwStatus::Busy => Error::ResourceBusy,
            HwStatus::Timeout => Error::Timeout,
        }
    }
}
