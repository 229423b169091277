//! Register-level polled I/O.

/// Status-register polling for synchronous transfers.
///
/// Methods never wait; the policy layer bounds its own polling loops.
pub trait PolledIo {
    /// Returns `true` if the transmit data register can accept a byte.
    fn tx_ready(&self) -> bool;

    /// Writes one byte to the transmit data register.
    fn write_byte(&mut self, byte: u8);

    /// Returns `true` if the receive data register holds a byte.
    fn rx_ready(&self) -> bool;

    /// Reads one byte from the receive data register.
    fn read_byte(&mut self) -> u8;
}
