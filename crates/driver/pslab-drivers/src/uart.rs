//! Synchronous UART transfers.
//!
//! A UART is a [`StreamPort`] whose mechanism also exposes its status
//! registers. While the port is stopped the data registers are free, and
//! [`write_blocking`](StreamPort::write_blocking) /
//! [`read_blocking`](StreamPort::read_blocking) drive them directly with a
//! bounded number of polls per byte.

use pslab_core::{Error, log_trace};
use pslab_driver_api::{PolledIo, StreamMechanism};

use crate::stream::StreamPort;

/// A UART port.
pub type Uart<'a, M> = StreamPort<'a, M>;

/// Polls `ready` up to `limit` times.
fn spin_until(limit: u32, mut ready: impl FnMut() -> bool) -> Result<(), Error> {
    for _ in 0..limit {
        if ready() {
            return Ok(());
        }
        core::hint::spin_loop();
    }
    Err(Error::Timeout)
}

impl<M: StreamMechanism + PolledIo> StreamPort<'_, M> {
    /// Transmits `bytes` by polling the transmit data register.
    ///
    /// Interrupts stay masked for the whole transfer.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] for empty `bytes` or after `deinit`.
    /// - [`Error::ResourceBusy`] while the port is running: the interrupt
    ///   path owns the data registers then.
    /// - [`Error::Timeout`] if a byte is not accepted within the spin limit.
    pub fn write_blocking(&self, bytes: &[u8]) -> Result<(), Error> {
        if bytes.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let mut st = self.state.lock();
        if !st.initialized {
            return Err(Error::InvalidArgument);
        }
        if st.running || st.tx_busy {
            return Err(Error::ResourceBusy);
        }
        let limit = st.spin_limit;
        for &byte in bytes {
            spin_until(limit, || st.mech.tx_ready())?;
            st.mech.write_byte(byte);
        }
        log_trace!("uart{}: wrote {} bytes (polled)", self.index(), bytes.len());
        Ok(())
    }

    /// Fills `buf` by polling the receive data register.
    ///
    /// # Errors
    ///
    /// Same as [`write_blocking`](Self::write_blocking); on timeout, the
    /// bytes received so far are in `buf`.
    pub fn read_blocking(&self, buf: &mut [u8]) -> Result<(), Error> {
        if buf.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let mut st = self.state.lock();
        if !st.initialized {
            return Err(Error::InvalidArgument);
        }
        if st.running {
            return Err(Error::ResourceBusy);
        }
        let limit = st.spin_limit;
        for slot in buf.iter_mut() {
            spin_until(limit, || st.mech.rx_ready())?;
            *slot = st.mech.read_byte();
        }
        Ok(())
    }
}
