//! Threshold-gated callback slots.
//!
//! Every asynchronous peripheral keeps one [`CallbackSlot`] per
//! [`Direction`]. The policy layer evaluates a slot from its interrupt entry
//! point after updating the ring buffer; when the slot decides to fire, the
//! policy invokes the returned [`Handler`] after dropping its lock.
//!
//! Thresholds are edge-triggered: a slot fires once when the watched
//! quantity reaches its threshold, then stays quiet until the quantity drops
//! below the threshold again (the consumer drained the buffer) and re-arms.

use crate::event::{EventLatch, Pending};

/// The direction a callback slot watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Fires on buffered receive bytes.
    Receive,
    /// Fires on free transmit space.
    Transmit,
    /// Fires on completion events (transfer done, conversion done).
    Complete,
}

impl Direction {
    const fn index(self) -> usize {
        match self {
            Self::Receive => 0,
            Self::Transmit => 1,
            Self::Complete => 2,
        }
    }
}

/// Payload handed to a plain function handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notice {
    /// The slot that fired.
    pub direction: Direction,
    /// Buffered bytes (receive), free bytes (transmit) or events counted
    /// (complete) at the moment the slot fired.
    pub available: usize,
}

/// What happens when a slot fires.
///
/// Handlers run in interrupt context and must not block.
#[derive(Debug, Clone, Copy)]
pub enum Handler<'a> {
    /// Latch a flag for the polling loop.
    Latch(&'a EventLatch, Pending),
    /// Call a function.
    Call(fn(Notice)),
}

impl Handler<'_> {
    /// Runs the handler.
    pub fn invoke(self, notice: Notice) {
        match self {
            Self::Latch(latch, flags) => latch.raise(flags),
            Self::Call(f) => f(notice),
        }
    }
}

/// One direction's registration: handler, threshold and trigger state.
#[derive(Debug, Clone, Copy)]
pub struct CallbackSlot<'a> {
    handler: Option<Handler<'a>>,
    threshold: usize,
    armed: bool,
}

impl<'a> CallbackSlot<'a> {
    /// Creates an empty slot.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            handler: None,
            threshold: 1,
            armed: false,
        }
    }

    /// Registers `handler`, replacing any previous one. A threshold of 0 is
    /// treated as 1.
    pub fn register(&mut self, threshold: usize, handler: Handler<'a>) {
        self.handler = Some(handler);
        self.threshold = threshold.max(1);
        self.armed = true;
    }

    /// Removes the handler.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Returns `true` if a handler is registered.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.handler.is_some()
    }

    /// Returns the effective threshold.
    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Decides whether the slot fires for the current `available` level.
    ///
    /// Returns the handler to invoke, disarming the slot, if it is armed and
    /// `available` has reached the threshold. Re-arms the slot when
    /// `available` is below the threshold.
    pub fn evaluate(&mut self, available: usize) -> Option<Handler<'a>> {
        let handler = self.handler?;
        if available < self.threshold {
            self.armed = true;
            return None;
        }
        if !self.armed {
            return None;
        }
        self.armed = false;
        Some(handler)
    }

    /// Re-arms the slot if `available` has dropped below the threshold.
    ///
    /// Called on the consumer side after draining.
    pub fn rearm(&mut self, available: usize) {
        if available < self.threshold {
            self.armed = true;
        }
    }
}

impl Default for CallbackSlot<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// The three slots of one peripheral.
#[derive(Debug, Clone, Copy)]
pub struct CallbackSlots<'a> {
    slots: [CallbackSlot<'a>; 3],
}

impl<'a> CallbackSlots<'a> {
    /// Creates a set of empty slots.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [CallbackSlot::new(); 3],
        }
    }

    /// Returns the slot for `direction`.
    #[must_use]
    pub fn get(&self, direction: Direction) -> &CallbackSlot<'a> {
        &self.slots[direction.index()]
    }

    /// Returns the slot for `direction` mutably.
    pub fn get_mut(&mut self, direction: Direction) -> &mut CallbackSlot<'a> {
        &mut self.slots[direction.index()]
    }

    /// Clears every slot.
    pub fn clear_all(&mut self) {
        *self = Self::new();
    }
}

impl Default for CallbackSlots<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn empty_slot_never_fires() {
        let mut slot = CallbackSlot::new();
        assert!(slot.evaluate(100).is_none());
        assert!(!slot.is_registered());
    }

    #[test]
    fn fires_once_at_threshold() {
        let latch = EventLatch::new();
        let mut slot = CallbackSlot::new();
        slot.register(5, Handler::Latch(&latch, Pending::UART_RX));

        let fired: Vec<usize> = (1..=7).filter(|&n| slot.evaluate(n).is_some()).collect();
        assert_eq!(fired, [5]);
    }

    #[test]
    fn rearms_after_drain() {
        let latch = EventLatch::new();
        let mut slot = CallbackSlot::new();
        slot.register(3, Handler::Latch(&latch, Pending::UART_RX));
        assert!(slot.evaluate(3).is_some());
        assert!(slot.evaluate(4).is_none());
        slot.rearm(0);
        assert!(slot.evaluate(2).is_none());
        assert!(slot.evaluate(3).is_some());
    }

    #[test]
    fn zero_threshold_is_one() {
        let latch = EventLatch::new();
        let mut slot = CallbackSlot::new();
        slot.register(0, Handler::Latch(&latch, Pending::UART_RX));
        assert_eq!(slot.threshold(), 1);
        assert!(slot.evaluate(0).is_none());
        assert!(slot.evaluate(1).is_some());
    }

    #[test]
    fn latch_handler_raises_flag() {
        let latch = EventLatch::new();
        let handler = Handler::Latch(&latch, Pending::SPI_COMPLETE);
        handler.invoke(Notice {
            direction: Direction::Complete,
            available: 1,
        });
        assert!(latch.take(Pending::SPI_COMPLETE));
    }

    #[test]
    fn call_handler_receives_notice() {
        static LAST: AtomicUsize = AtomicUsize::new(0);
        fn on_notice(notice: Notice) {
            assert_eq!(notice.direction, Direction::Transmit);
            LAST.store(notice.available, Ordering::Relaxed);
        }
        Handler::Call(on_notice).invoke(Notice {
            direction: Direction::Transmit,
            available: 42,
        });
        assert_eq!(LAST.load(Ordering::Relaxed), 42);
    }

    #[test]
    fn slots_are_independent() {
        let latch = EventLatch::new();
        let mut slots = CallbackSlots::new();
        slots
            .get_mut(Direction::Receive)
            .register(1, Handler::Latch(&latch, Pending::UART_RX));
        assert!(slots.get(Direction::Receive).is_registered());
        assert!(!slots.get(Direction::Transmit).is_registered());
        assert!(slots.get_mut(Direction::Complete).evaluate(10).is_none());
        slots.clear_all();
        assert!(!slots.get(Direction::Receive).is_registered());
    }
}
