//! Synchronization primitives for driver state.
//!
//! Provides [`IrqSpinLock`], the lock every driver uses to share its state
//! between interrupt handlers and the polling loop.

mod irq_spinlock;

pub(crate) mod loom_compat;

pub use irq_spinlock::{IrqSpinLock, IrqSpinLockGuard};
