//! Analog-to-digital converter mechanism.

use crate::mechanism::Mechanism;
use crate::status::HwStatus;

/// A timer-triggered ADC.
///
/// Once started, the ISR hands every conversion result to
/// `Adc::on_conversion`.
pub trait AdcMechanism: Mechanism {
    /// Returns the highest sample rate the converter supports, in hertz.
    fn max_sample_rate(&self) -> u32;

    /// Programs the trigger timer for `hz` samples per second.
    ///
    /// # Errors
    ///
    /// Returns [`HwStatus`] if the timer cannot produce that rate.
    fn configure_rate(&mut self, hz: u32) -> Result<(), HwStatus>;
}
