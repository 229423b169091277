//! Byte-stream (UART) mechanism.

use crate::mechanism::Mechanism;
use crate::status::HwStatus;

/// Parity setting of a serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    /// No parity bit.
    #[default]
    None,
    /// Even parity.
    Even,
    /// Odd parity.
    Odd,
}

/// Stop bits of a serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopBits {
    /// One stop bit.
    #[default]
    One,
    /// Two stop bits.
    Two,
}

/// Line settings for a UART mechanism.
///
/// Defaults to 115200 baud, 8 data bits, no parity, one stop bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConfig {
    /// Baud rate in bits per second.
    pub baud_rate: u32,
    /// Data bits per frame.
    pub data_bits: u8,
    /// Parity.
    pub parity: Parity,
    /// Stop bits.
    pub stop_bits: StopBits,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

/// A full-duplex byte stream driven by interrupts or DMA.
///
/// Reception is continuous once started: the ISR hands every arrived chunk
/// to `StreamPort::on_receive`. Transmission is one chunk at a time: the
/// policy calls [`transmit`](Self::transmit) and waits for the ISR to call
/// `StreamPort::on_transmit_complete` before sending the next chunk.
pub trait StreamMechanism: Mechanism {
    /// Starts an asynchronous transmission of `bytes`.
    ///
    /// The mechanism copies `bytes` (or owns a DMA buffer large enough for
    /// one chunk); the slice is not borrowed past the call.
    ///
    /// # Errors
    ///
    /// Returns [`HwStatus`] if the transmission could not be started.
    fn transmit(&mut self, bytes: &[u8]) -> Result<(), HwStatus>;
}
