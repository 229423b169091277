//! Latched event flags.
//!
//! Interrupt handlers must not do real work; they raise a [`Pending`] flag in
//! an [`EventLatch`] and return. The polling loop calls
//! [`EventLatch::service`] once per iteration and does the work there.
//!
//! A flag is cleared *before* its handler runs, so an arrival while the
//! handler is still busy latches the flag again and is seen on the next
//! iteration instead of being lost.

use bitflags::bitflags;

use crate::sync::loom_compat::{AtomicU32, Ordering};

bitflags! {
    /// Events deferred from interrupt context to the polling loop.
    ///
    /// Bit order is service priority: lower bits are serviced first.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Pending: u32 {
        /// An ADC completion notification fired.
        const ADC_COMPLETE = 1 << 0;
        /// The USB-CDC receive threshold was reached.
        const USB_RX = 1 << 1;
        /// A UART receive threshold was reached.
        const UART_RX = 1 << 2;
        /// A UART transmit buffer drained below its threshold.
        const UART_TX = 1 << 3;
        /// A UART transmission fully completed.
        const UART_TX_DONE = 1 << 4;
        /// An asynchronous SPI transfer completed.
        const SPI_COMPLETE = 1 << 5;
        /// Free for application use.
        const USER0 = 1 << 16;
        /// Free for application use.
        const USER1 = 1 << 17;
    }
}

/// A set of [`Pending`] flags shared between interrupt and polling context.
#[derive(Debug)]
pub struct EventLatch {
    bits: AtomicU32,
}

impl EventLatch {
    /// Creates an empty latch.
    #[cfg(not(loom))]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bits: AtomicU32::new(0),
        }
    }

    /// Creates an empty latch.
    #[cfg(loom)]
    #[must_use]
    pub fn new() -> Self {
        Self {
            bits: AtomicU32::new(0),
        }
    }

    /// Latches `flags`. Safe to call from interrupt context.
    pub fn raise(&self, flags: Pending) {
        self.bits.fetch_or(flags.bits(), Ordering::Release);
    }

    /// Clears `flags`, returning `true` if any of them was set.
    pub fn take(&self, flags: Pending) -> bool {
        let prev = self.bits.fetch_and(!flags.bits(), Ordering::AcqRel);
        prev & flags.bits() != 0
    }

    /// Returns the currently latched flags without clearing them.
    #[must_use]
    pub fn pending(&self) -> Pending {
        Pending::from_bits_retain(self.bits.load(Ordering::Acquire))
    }

    /// Clears every flag.
    pub fn clear_all(&self) {
        self.bits.store(0, Ordering::Release);
    }

    /// Services latched flags in priority order.
    ///
    /// Takes a snapshot of the latched set, then for each flag in it, lowest
    /// bit first, clears the flag and calls `f` with it. Flags raised while
    /// `f` runs stay latched for the next call. Returns the number of flags
    /// serviced.
    pub fn service(&self, mut f: impl FnMut(Pending)) -> usize {
        let mut snapshot = self.bits.load(Ordering::Acquire);
        let mut serviced = 0;
        while snapshot != 0 {
            let bit = 1u32 << snapshot.trailing_zeros();
            snapshot &= !bit;
            let flag = Pending::from_bits_retain(bit);
            if self.take(flag) {
                f(flag);
                serviced += 1;
            }
        }
        serviced
    }
}

#[cfg(not(loom))]
impl Default for EventLatch {
    fn default() -> Self {
        Self::new()
    }
}
