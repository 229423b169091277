//! Mechanism traits for the PSLab peripheral drivers.
//!
//! Every peripheral driver is split in two:
//!
//! - **Policy** (`pslab-drivers`) -- buffering, thresholds, callbacks and the
//!   lifecycle contract. Platform independent.
//! - **Mechanism** (this crate's traits) -- register and DMA programming for
//!   one target. Implemented by board support code, or by `pslab-mock` on the
//!   host.
//!
//! The traits are layered the same way for every family: [`Mechanism`]
//! carries the lifecycle, and a family trait ([`StreamMechanism`],
//! [`SpiMechanism`], [`AdcMechanism`], [`UsbMechanism`]) adds the transfer
//! primitives. Mechanisms report failure with [`HwStatus`]; the policy maps
//! it onto the firmware error taxonomy.
//!
//! A mechanism's interrupt service routine must call the policy's completion
//! entry point (`on_receive`, `on_transmit_complete`, `on_transfer_complete`,
//! `on_conversion`) with the received bytes, the converted value or the bare
//! completion event.

#![cfg_attr(not(test), no_std)]

pub mod adc;
pub mod mechanism;
pub mod polled;
pub mod spi;
pub mod status;
pub mod stream;
pub mod usb;

pub use adc::AdcMechanism;
pub use mechanism::Mechanism;
pub use polled::PolledIo;
pub use spi::{SpiMechanism, SpiMode, SpiSettings};
pub use status::HwStatus;
pub use stream::{Parity, SerialConfig, StopBits, StreamMechanism};
pub use usb::{LineState, UsbMechanism};
