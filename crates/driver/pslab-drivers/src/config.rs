//! Driver configuration and firmware-wide constants.
//!
//! Every driver config carries the peripheral index (checked against
//! [`PeripheralKind::instance_count`](crate::PeripheralKind::instance_count)
//! and claimed in the [`IoContext`](crate::IoContext)) plus the mechanism's
//! own configuration in `hw`.

use pslab_core::FullPolicy;

/// Largest chunk handed to a stream mechanism per transmit.
pub const TX_CHUNK: usize = 64;

/// Status-register polls before a synchronous transfer gives up.
///
/// Roughly 100 ms at the core clock of the reference board.
pub const SYNC_SPIN_LIMIT: u32 = 100_000;

/// `Usb::task` calls with data pending in the transmit FIFO before it is
/// flushed as a short packet.
pub const USB_TX_FLUSH_POLLS: u32 = 100;

/// Default ADC sample rate in hertz.
pub const DEFAULT_ADC_RATE_HZ: u32 = 1_000;

/// Byte clocked out while receiving on SPI.
pub const SPI_FILLER: u8 = 0xFF;

/// UART (stream port) configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig<C> {
    /// Peripheral index.
    pub index: usize,
    /// Mechanism configuration.
    pub hw: C,
    /// What the receive buffer does when full.
    pub rx_policy: FullPolicy,
    /// Poll limit for `write_blocking` / `read_blocking`.
    pub spin_limit: u32,
}

impl<C: Default> Default for StreamConfig<C> {
    fn default() -> Self {
        Self {
            index: 0,
            hw: C::default(),
            rx_policy: FullPolicy::OverwriteOldest,
            spin_limit: SYNC_SPIN_LIMIT,
        }
    }
}

/// SPI bus configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiConfig<C> {
    /// Bus index.
    pub index: usize,
    /// Mechanism configuration.
    pub hw: C,
    /// Poll limit per byte for synchronous transfers.
    pub spin_limit: u32,
}

impl<C: Default> Default for SpiConfig<C> {
    fn default() -> Self {
        Self {
            index: 0,
            hw: C::default(),
            spin_limit: SYNC_SPIN_LIMIT,
        }
    }
}

/// ADC configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcConfig<C> {
    /// Converter index.
    pub index: usize,
    /// Mechanism configuration.
    pub hw: C,
    /// Samples per second. Must be non-zero and within the mechanism's
    /// maximum.
    pub sample_rate_hz: u32,
}

impl<C: Default> Default for AdcConfig<C> {
    fn default() -> Self {
        Self {
            index: 0,
            hw: C::default(),
            sample_rate_hz: DEFAULT_ADC_RATE_HZ,
        }
    }
}

/// USB-CDC configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbConfig<C> {
    /// Interface index.
    pub index: usize,
    /// Mechanism configuration.
    pub hw: C,
    /// Idle polls before a partly filled transmit FIFO is flushed.
    pub flush_polls: u32,
}

impl<C: Default> Default for UsbConfig<C> {
    fn default() -> Self {
        Self {
            index: 0,
            hw: C::default(),
            flush_polls: USB_TX_FLUSH_POLLS,
        }
    }
}
