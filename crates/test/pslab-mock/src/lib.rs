//! Host-side mechanisms for testing the PSLab policy layer.
//!
//! Each mock records every call the policy makes and lets the test inject
//! failures and incoming data. Mocks are cheap `Clone` handles around shared
//! state: hand one clone to the driver and keep another to inspect and
//! script the hardware side.
//!
//! ```ignore
//! let mech = MockStream::new();
//! let hw = mech.clone();
//! let uart = StreamPort::init(&ctx, &cfg, mech, &mut rx, &mut tx)?;
//! uart.write(b"World")?;
//! assert_eq!(hw.transmits(), [b"World".to_vec()]);
//! ```

pub mod adc;
pub mod spi;
pub mod stream;
pub mod usb;

pub use adc::MockAdc;
pub use spi::MockSpi;
pub use stream::MockStream;
pub use usb::MockUsb;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A call made by the policy layer on a mechanism.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `Mechanism::init`.
    Init,
    /// `Mechanism::deinit`.
    Deinit,
    /// `Mechanism::start`.
    Start,
    /// `Mechanism::stop`.
    Stop,
    /// `StreamMechanism::transmit` with the bytes handed over.
    Transmit(Vec<u8>),
    /// `SpiMechanism::transfer` with the bytes handed over.
    Transfer(Vec<u8>),
    /// `AdcMechanism::configure_rate`.
    ConfigureRate(u32),
    /// `UsbMechanism::flush`.
    Flush,
}

/// Locks `m`, ignoring poisoning from a panicked test thread.
pub(crate) fn lock<T>(m: &Arc<Mutex<T>>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
