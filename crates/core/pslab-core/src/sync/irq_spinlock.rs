//! Interrupt-safe spin lock.
//!
//! Masks interrupts before acquiring the inner flag and restores the previous
//! mask on release. Driver state is shared between an interrupt handler and
//! the polling loop on a single core; with interrupts masked the handler
//! cannot preempt the holder, so the spin never actually waits on target.
//! On the host the mask is a no-op and the flag does the work, which lets
//! tests drive "interrupt" callbacks from a second thread.

use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering, compiler_fence};

/// A spin lock that masks interrupts while held.
pub struct IrqSpinLock<T> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

// SAFETY: The atomic flag ensures exclusive access to `data`.
unsafe impl<T: Send> Send for IrqSpinLock<T> {}
unsafe impl<T: Send> Sync for IrqSpinLock<T> {}

impl<T> IrqSpinLock<T> {
    /// Creates a new unlocked `IrqSpinLock`.
    pub const fn new(value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(value),
        }
    }

    /// Acquires the lock, masking interrupts first.
    pub fn lock(&self) -> IrqSpinLockGuard<'_, T> {
        let saved = save_and_mask();

        // TTAS spin to acquire.
        loop {
            if self
                .locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return IrqSpinLockGuard {
                    lock: self,
                    saved,
                    _not_send: PhantomData,
                };
            }
            while self.locked.load(Ordering::Relaxed) {
                core::hint::spin_loop();
            }
        }
    }
}

/// RAII guard that releases the lock and restores the interrupt mask on drop.
///
/// Not `Send`: the saved mask belongs to the context that took the lock.
pub struct IrqSpinLockGuard<'a, T> {
    lock: &'a IrqSpinLock<T>,
    saved: u32,
    _not_send: PhantomData<*const ()>,
}

impl<T> Deref for IrqSpinLockGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: The lock is held, so we have exclusive access to the data.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for IrqSpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: The lock is held, so we have exclusive access to the data.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for IrqSpinLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
        restore(self.saved);
    }
}

#[cfg(all(target_os = "none", target_arch = "arm"))]
#[inline]
fn save_and_mask() -> u32 {
    let primask: u32;
    // SAFETY: Reading PRIMASK and masking interrupts is always allowed in
    // privileged thread or handler mode.
    unsafe {
        core::arch::asm!(
            "mrs {}, PRIMASK",
            "cpsid i",
            out(reg) primask,
            options(nostack, preserves_flags),
        );
    }
    compiler_fence(Ordering::SeqCst);
    primask
}

#[cfg(all(target_os = "none", target_arch = "arm"))]
#[inline]
fn restore(primask: u32) {
    compiler_fence(Ordering::SeqCst);
    // PRIMASK bit 0 set means interrupts were already masked by the caller.
    if primask & 1 == 0 {
        // SAFETY: Re-enabling interrupts restores the state saved on entry.
        unsafe {
            core::arch::asm!("cpsie i", options(nostack, preserves_flags));
        }
    }
}

#[cfg(not(all(target_os = "none", target_arch = "arm")))]
#[inline]
fn save_and_mask() -> u32 {
    compiler_fence(Ordering::SeqCst);
    0
}

#[cfg(not(all(target_os = "none", target_arch = "arm")))]
#[inline]
fn restore(_saved: u32) {
    compiler_fence(Ordering::SeqCst);
}
