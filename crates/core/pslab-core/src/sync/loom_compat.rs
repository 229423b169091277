//! Loom compatibility shim.
//!
//! When compiled with `cfg(loom)`, re-exports loom's atomics. Otherwise,
//! re-exports the `core::sync::atomic` types.
//!
//! Only the event latch routes through here; it is the one piece of state
//! interrupt handlers and the polling loop share without taking a lock.

// ---------------------------------------------------------------------------
// Loom mode
// ---------------------------------------------------------------------------

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicU32, Ordering};

// ---------------------------------------------------------------------------
// Normal mode
// ---------------------------------------------------------------------------

#[cfg(not(loom))]
pub(crate) use core::sync::atomic::{AtomicU32, Ordering};
