//! Peripheral policy layer for the PSLab firmware.
//!
//! Each driver here owns the platform-independent half of a peripheral:
//! ring buffers, callback thresholds, busy flags and the
//! init/start/stop/deinit lifecycle. The register-level half is a mechanism
//! from [`pslab_driver_api`], supplied by board support code.
//!
//! All drivers are bound to an [`IoContext`] created once at startup.
//! Initialization returns `Result<_, Fault>` and is meant to run inside
//! [`FaultDomain::protect`](pslab_core::FaultDomain::protect); steady-state
//! operations return `Result<_, Error>`.
//!
//! | Driver | Mechanism | Entry points called from the ISR |
//! |---|---|---|
//! | [`StreamPort`] (UART) | `StreamMechanism` | `on_receive`, `on_transmit_complete` |
//! | [`Spi`] | `SpiMechanism` | `on_transfer_complete` |
//! | [`Adc`] | `AdcMechanism` | `on_conversion` |
//! | [`Usb`] | `UsbMechanism` | none, polled through `task` |

#![cfg_attr(not(test), no_std)]

pub mod adc;
pub mod config;
pub mod context;
pub mod spi;
pub mod stream;
pub mod uart;
pub mod usb;

pub use adc::Adc;
pub use config::{AdcConfig, SpiConfig, StreamConfig, UsbConfig};
pub use context::{IoContext, PeripheralKind};
pub use spi::Spi;
pub use stream::StreamPort;
pub use uart::Uart;
pub use usb::Usb;
