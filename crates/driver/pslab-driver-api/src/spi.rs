//! SPI bus mechanism.

use crate::mechanism::Mechanism;
use crate::polled::PolledIo;
use crate::status::HwStatus;

/// Clock polarity and phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpiMode {
    /// CPOL = 0, CPHA = 0.
    #[default]
    Mode0,
    /// CPOL = 0, CPHA = 1.
    Mode1,
    /// CPOL = 1, CPHA = 0.
    Mode2,
    /// CPOL = 1, CPHA = 1.
    Mode3,
}

/// Bus settings for an SPI mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiSettings {
    /// Serial clock frequency in hertz.
    pub clock_hz: u32,
    /// Clock polarity and phase.
    pub mode: SpiMode,
}

impl Default for SpiSettings {
    fn default() -> Self {
        Self {
            clock_hz: 1_000_000,
            mode: SpiMode::Mode0,
        }
    }
}

/// A master-mode SPI bus.
///
/// Synchronous transfers go through [`PolledIo`], one byte exchanged per
/// write. Asynchronous transfers go through [`transfer`](Self::transfer);
/// the ISR hands the clocked-in bytes to `Spi::on_transfer_complete`.
pub trait SpiMechanism: Mechanism + PolledIo {
    /// Starts an asynchronous full-duplex transfer of `tx`.
    ///
    /// # Errors
    ///
    /// Returns [`HwStatus`] if the transfer could not be started.
    fn transfer(&mut self, tx: &[u8]) -> Result<(), HwStatus>;
}
