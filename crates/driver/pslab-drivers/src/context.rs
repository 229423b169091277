//! The I/O context shared by every driver.
//!
//! One [`IoContext`] exists per firmware image, normally as a `static`. It
//! owns the fault domain used during bring-up, the event latch the polling
//! loop services, and the per-peripheral instance claims that keep two
//! drivers off the same hardware.

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

use pslab_core::{Error, EventLatch, FaultDomain};

/// Peripheral families and their instance counts on the reference board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeripheralKind {
    /// Analog-to-digital converters.
    Adc,
    /// UARTs.
    Uart,
    /// SPI buses.
    Spi,
    /// USB-CDC interfaces.
    Usb,
}

impl PeripheralKind {
    /// Returns the number of instances the board provides.
    #[must_use]
    pub const fn instance_count(self) -> usize {
        match self {
            Self::Adc => 2,
            Self::Uart => 3,
            Self::Spi => 2,
            Self::Usb => 1,
        }
    }

    const fn slot(self) -> usize {
        match self {
            Self::Adc => 0,
            Self::Uart => 1,
            Self::Spi => 2,
            Self::Usb => 3,
        }
    }
}

impl fmt::Display for PeripheralKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Adc => f.write_str("adc"),
            Self::Uart => f.write_str("uart"),
            Self::Spi => f.write_str("spi"),
            Self::Usb => f.write_str("usb"),
        }
    }
}

/// Process-wide driver state, passed to every driver's `init`.
#[derive(Debug)]
pub struct IoContext {
    faults: FaultDomain,
    events: EventLatch,
    // One bit per instance, one word per PeripheralKind.
    claims: [AtomicU8; 4],
}

impl IoContext {
    /// Creates a context with no claimed peripherals.
    #[cfg(not(loom))]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            faults: FaultDomain::new(),
            events: EventLatch::new(),
            claims: [const { AtomicU8::new(0) }; 4],
        }
    }

    /// Creates a context with no claimed peripherals.
    #[cfg(loom)]
    #[must_use]
    pub fn new() -> Self {
        Self {
            faults: FaultDomain::new(),
            events: EventLatch::new(),
            claims: [const { AtomicU8::new(0) }; 4],
        }
    }

    /// Returns the fault domain for bring-up code.
    #[must_use]
    pub fn faults(&self) -> &FaultDomain {
        &self.faults
    }

    /// Returns the event latch the polling loop services.
    #[must_use]
    pub fn events(&self) -> &EventLatch {
        &self.events
    }

    /// Claims instance `index` of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `index` is out of range and
    /// [`Error::ResourceBusy`] if the instance is already claimed.
    pub fn claim(&self, kind: PeripheralKind, index: usize) -> Result<(), Error> {
        let bit = Self::bit(kind, index)?;
        let prev = self.claims[kind.slot()].fetch_or(bit, Ordering::AcqRel);
        if prev & bit != 0 {
            return Err(Error::ResourceBusy);
        }
        Ok(())
    }

    /// Releases a claim taken with [`claim`](Self::claim).
    pub fn release(&self, kind: PeripheralKind, index: usize) {
        if let Ok(bit) = Self::bit(kind, index) {
            self.claims[kind.slot()].fetch_and(!bit, Ordering::AcqRel);
        }
    }

    /// Returns `true` if instance `index` of `kind` is claimed.
    #[must_use]
    pub fn is_claimed(&self, kind: PeripheralKind, index: usize) -> bool {
        Self::bit(kind, index)
            .is_ok_and(|bit| self.claims[kind.slot()].load(Ordering::Acquire) & bit != 0)
    }

    fn bit(kind: PeripheralKind, index: usize) -> Result<u8, Error> {
        if index >= kind.instance_count() {
            return Err(Error::InvalidArgument);
        }
        Ok(1 << index)
    }
}

#[cfg(not(loom))]
impl Default for IoContext {
    fn default() -> Self {
        Self::new()
    }
}
