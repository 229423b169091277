//! USB CDC (virtual serial port) mechanism.

use crate::mechanism::Mechanism;

/// CDC control line state set by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineState {
    /// Data Terminal Ready. De-asserted when the host closes the port.
    pub dtr: bool,
    /// Request To Send.
    pub rts: bool,
}

/// A USB device stack exposing one CDC interface.
///
/// The stack is polled: the policy calls [`task`](Self::task) from the main
/// loop at least once per millisecond. Data moves through the stack's own
/// FIFOs; the policy drains the receive FIFO into its ring buffer.
pub trait UsbMechanism: Mechanism {
    /// Steps the device stack. Returns the new line state if the host
    /// changed it since the last call.
    fn task(&mut self) -> Option<LineState>;

    /// Returns `true` if the device is enumerated and the port is open.
    fn connected(&self) -> bool;

    /// Returns the number of bytes waiting in the receive FIFO.
    fn rx_available(&self) -> usize;

    /// Moves up to `buf.len()` bytes out of the receive FIFO.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Returns the free space in the transmit FIFO.
    fn tx_available(&self) -> usize;

    /// Returns the total size of the transmit FIFO.
    fn tx_capacity(&self) -> usize;

    /// Queues up to `bytes.len()` bytes into the transmit FIFO.
    fn write(&mut self, bytes: &[u8]) -> usize;

    /// Sends whatever the transmit FIFO holds, even a short packet.
    fn flush(&mut self);
}
