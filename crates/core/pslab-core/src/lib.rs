//! Core I/O primitives for the PSLab firmware.
//!
//! Everything here is allocation-free and usable from both interrupt context
//! and the cooperative polling loop:
//!
//! - [`ringbuf`] -- fixed-capacity byte FIFO over caller-owned storage.
//! - [`fault`] -- protected scopes that let multi-step hardware setup abort
//!   to a single recovery clause.
//! - [`dispatch`] / [`event`] -- threshold callback slots and the latched
//!   flags that defer interrupt work to the polling loop.
//! - [`sync`] -- the interrupt-disabling lock guarding shared driver state.
//! - [`log`] -- leveled logging through a registered sink.

#![cfg_attr(not(test), no_std)]

pub mod dispatch;
pub mod error;
pub mod event;
pub mod fault;
pub mod log;
pub mod ringbuf;
pub mod sync;

pub use dispatch::{CallbackSlot, CallbackSlots, Direction, Handler, Notice};
pub use error::Error;
pub use event::{EventLatch, Pending};
pub use fault::{Fault, FaultDomain, Outcome};
pub use ringbuf::{FullPolicy, RingBuffer};
