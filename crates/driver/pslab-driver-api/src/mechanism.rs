//! Lifecycle shared by every mechanism.

use crate::status::HwStatus;

/// The lifecycle half of a mechanism.
///
/// The policy layer calls these in a fixed order: `init` once, then any
/// number of `start`/`stop` pairs, then `deinit`. `stop` must disable the
/// peripheral's interrupt and DMA sources before returning, so that no
/// completion entry point runs afterwards.
pub trait Mechanism {
    /// Target-specific configuration (pins, clocks, baud rate, ...).
    type Config;

    /// Configures the peripheral. Interrupts stay disabled until `start`.
    ///
    /// # Errors
    ///
    /// Returns [`HwStatus`] if the peripheral could not be configured.
    fn init(&mut self, config: &Self::Config) -> Result<(), HwStatus>;

    /// Returns the peripheral to its reset state.
    fn deinit(&mut self);

    /// Enables the peripheral's interrupt and DMA sources.
    ///
    /// # Errors
    ///
    /// Returns [`HwStatus`] if the peripheral refused to start.
    fn start(&mut self) -> Result<(), HwStatus>;

    /// Disables the peripheral's interrupt and DMA sources.
    fn stop(&mut self);
}
