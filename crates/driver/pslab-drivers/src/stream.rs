//! Interrupt-driven byte stream (UART policy).
//!
//! A [`StreamPort`] owns a receive and a transmit [`RingBuffer`]. The
//! mechanism's ISR feeds received bytes in through
//! [`on_receive`](StreamPort::on_receive) and reports finished chunks through
//! [`on_transmit_complete`](StreamPort::on_transmit_complete); the polling
//! loop drains and fills the rings with [`read`](StreamPort::read) and
//! [`write`](StreamPort::write).
//!
//! Transmission is chunked: at most [`TX_CHUNK`] bytes are handed to the
//! mechanism at a time, and the next chunk is started from the completion
//! entry point until the transmit ring is empty.
//!
//! Handlers registered with [`set_callback`](StreamPort::set_callback) are
//! invoked after the state lock is released.

use pslab_core::dispatch::{CallbackSlots, Direction, Handler, Notice};
use pslab_core::fault::Fault;
use pslab_core::ringbuf::{FullPolicy, RingBuffer};
use pslab_core::sync::IrqSpinLock;
use pslab_core::{Error, log_debug, log_error, log_info, log_trace, log_warn};
use pslab_driver_api::StreamMechanism;

use crate::config::{StreamConfig, TX_CHUNK};
use crate::context::{IoContext, PeripheralKind};

pub(crate) struct StreamState<'a, M> {
    pub(crate) mech: M,
    pub(crate) initialized: bool,
    pub(crate) running: bool,
    pub(crate) tx_busy: bool,
    pub(crate) spin_limit: u32,
    rx: RingBuffer<'a>,
    tx: RingBuffer<'a>,
    slots: CallbackSlots<'a>,
    completions: usize,
}

impl<M: StreamMechanism> StreamState<'_, M> {
    /// Hands the next chunk of the transmit ring to the mechanism.
    ///
    /// Bytes leave the ring only once the mechanism accepted them.
    fn kick(&mut self) -> Result<(), Error> {
        if self.tx_busy || self.tx.is_empty() {
            return Ok(());
        }
        let mut chunk = [0u8; TX_CHUNK];
        let n = self.tx.peek_into(&mut chunk);
        self.mech.transmit(&chunk[..n]).map_err(Error::from)?;
        self.tx.discard(n);
        self.tx_busy = true;
        Ok(())
    }
}

/// A UART-style byte stream bound to one peripheral instance.
pub struct StreamPort<'a, M: StreamMechanism> {
    ctx: &'a IoContext,
    index: usize,
    pub(crate) state: IrqSpinLock<StreamState<'a, M>>,
}

impl<'a, M: StreamMechanism> StreamPort<'a, M> {
    /// Initializes the port.
    ///
    /// Claims the instance in `ctx`, binds `rx` and `tx` as the ring
    /// storage and configures the mechanism. The port is not running until
    /// [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Raises [`Error::InvalidArgument`] for an out-of-range index or empty
    /// storage, [`Error::ResourceBusy`] if the instance is already claimed
    /// and [`Error::HardwareFault`] if the mechanism fails to initialize.
    pub fn init(
        ctx: &'a IoContext,
        config: &StreamConfig<M::Config>,
        mut mech: M,
        rx: &'a mut [u8],
        tx: &'a mut [u8],
    ) -> Result<Self, Fault> {
        let faults = ctx.faults();
        let rx = faults.check(RingBuffer::with_policy(rx, config.rx_policy))?;
        let tx = faults.check(RingBuffer::with_policy(tx, FullPolicy::RejectNewest))?;
        faults.check(ctx.claim(PeripheralKind::Uart, config.index))?;

        if let Err(status) = mech.init(&config.hw) {
            ctx.release(PeripheralKind::Uart, config.index);
            log_error!("uart{}: mechanism init failed: {status}", config.index);
            return faults.raise(Error::HardwareFault);
        }

        log_info!(
            "uart{}: initialized (rx {} bytes, tx {} bytes)",
            config.index,
            rx.capacity(),
            tx.capacity()
        );
        Ok(Self {
            ctx,
            index: config.index,
            state: IrqSpinLock::new(StreamState {
                mech,
                initialized: true,
                running: false,
                tx_busy: false,
                spin_limit: config.spin_limit,
                rx,
                tx,
                slots: CallbackSlots::new(),
                completions: 0,
            }),
        })
    }

    /// Returns the peripheral index.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Enables reception and transmit completion interrupts.
    ///
    /// Starting a running port is a no-op. Data queued while stopped is sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] after `deinit`, or the mapped
    /// mechanism status if it refused to start.
    pub fn start(&self) -> Result<(), Error> {
        let mut st = self.state.lock();
        if !st.initialized {
            return Err(Error::InvalidArgument);
        }
        if st.running {
            return Ok(());
        }
        st.mech.start().map_err(Error::from)?;
        st.running = true;
        log_debug!("uart{}: started", self.index);
        st.kick()
    }

    /// Disables the peripheral's interrupts, then resets transfer state.
    ///
    /// Also aborts a chunk handed over by `write` on a port that was never
    /// started. Idempotent. Late completion events are ignored afterwards.
    pub fn stop(&self) {
        let mut st = self.state.lock();
        if !st.running && !st.tx_busy {
            return;
        }
        st.mech.stop();
        st.running = false;
        st.tx_busy = false;
        st.completions = 0;
        log_debug!("uart{}: stopped", self.index);
    }

    /// Stops the port, de-initializes the mechanism, clears all callbacks and
    /// releases the claim.
    ///
    /// The ring storage is left as it is. Further calls on the port return
    /// [`Error::InvalidArgument`].
    pub fn deinit(&self) {
        let mut st = self.state.lock();
        if !st.initialized {
            return;
        }
        if st.running || st.tx_busy {
            st.mech.stop();
            st.running = false;
        }
        st.mech.deinit();
        st.initialized = false;
        st.tx_busy = false;
        st.completions = 0;
        st.slots.clear_all();
        drop(st);
        self.ctx.release(PeripheralKind::Uart, self.index);
        log_info!("uart{}: deinitialized", self.index);
    }

    /// Moves up to `buf.len()` received bytes into `buf`.
    ///
    /// Never blocks. Returns `Ok(0)` and leaves `buf` untouched if nothing
    /// was received.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty `buf` or after
    /// `deinit`.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, Error> {
        if buf.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let mut st = self.state.lock();
        if !st.initialized {
            return Err(Error::InvalidArgument);
        }
        let n = st.rx.read(buf);
        let available = st.rx.available_to_read();
        st.slots.get_mut(Direction::Receive).rearm(available);
        Ok(n)
    }

    /// Queues `bytes` for transmission, starting a transfer if none is in
    /// flight.
    ///
    /// Returns how many bytes were queued; bytes that do not fit in the
    /// transmit ring are not queued.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for empty `bytes` or after
    /// `deinit`, or the mapped mechanism status if starting the transfer
    /// failed. The bytes stay queued in that case.
    pub fn write(&self, bytes: &[u8]) -> Result<usize, Error> {
        if bytes.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let mut st = self.state.lock();
        if !st.initialized {
            return Err(Error::InvalidArgument);
        }
        let queued = st.tx.write(bytes);
        let free = st.tx.available_to_write();
        st.slots.get_mut(Direction::Transmit).rearm(free);
        if queued < bytes.len() {
            log_warn!(
                "uart{}: tx ring full, {} bytes not queued",
                self.index,
                bytes.len() - queued
            );
        }
        st.kick()?;
        Ok(queued)
    }

    /// Registers `handler` for `direction`.
    ///
    /// `threshold` is the minimum number of buffered bytes (receive), free
    /// transmit bytes (transmit) or finished transmissions (complete). A
    /// receive handler whose threshold is already met fires immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] after `deinit`.
    pub fn set_callback(
        &self,
        direction: Direction,
        threshold: usize,
        handler: Handler<'a>,
    ) -> Result<(), Error> {
        let mut st = self.state.lock();
        if !st.initialized {
            return Err(Error::InvalidArgument);
        }
        st.slots.get_mut(direction).register(threshold, handler);
        let fire = if direction == Direction::Receive {
            let available = st.rx.available_to_read();
            st.slots
                .get_mut(direction)
                .evaluate(available)
                .map(|h| (h, available))
        } else {
            None
        };
        drop(st);
        if let Some((handler, available)) = fire {
            handler.invoke(Notice {
                direction,
                available,
            });
        }
        Ok(())
    }

    /// Removes the handler for `direction`.
    pub fn clear_callback(&self, direction: Direction) {
        self.state.lock().slots.get_mut(direction).clear();
    }

    /// Receive entry point, called by the mechanism's ISR with newly arrived
    /// bytes.
    ///
    /// Ignored while the port is stopped.
    pub fn on_receive(&self, bytes: &[u8]) {
        let _irq = self.ctx.faults().enter_interrupt();
        let fire = {
            let mut st = self.state.lock();
            if !st.running {
                log_trace!("uart{}: rx while stopped, dropped", self.index);
                return;
            }
            let overwritten = bytes.iter().filter(|&&b| st.rx.push(b)).count();
            if overwritten > 0 {
                log_trace!("uart{}: rx overflow, {overwritten} bytes lost", self.index);
            }
            let available = st.rx.available_to_read();
            st.slots
                .get_mut(Direction::Receive)
                .evaluate(available)
                .map(|h| (h, available))
        };
        if let Some((handler, available)) = fire {
            handler.invoke(Notice {
                direction: Direction::Receive,
                available,
            });
        }
    }

    /// Transmit completion entry point, called by the mechanism's ISR when
    /// the chunk handed to `transmit` has left the wire.
    ///
    /// Starts the next chunk if more data is queued. Ignored if no transfer
    /// is in flight (after `stop`, or a spurious interrupt).
    pub fn on_transmit_complete(&self) {
        let _irq = self.ctx.faults().enter_interrupt();
        let mut fired: [Option<(Handler<'a>, Notice)>; 2] = [None, None];
        {
            let mut st = self.state.lock();
            if !st.tx_busy {
                log_trace!("uart{}: stray tx completion", self.index);
                return;
            }
            st.tx_busy = false;
            if let Err(err) = st.kick() {
                log_trace!("uart{}: next chunk failed: {err}", self.index);
            }

            let free = st.tx.available_to_write();
            if let Some(h) = st.slots.get_mut(Direction::Transmit).evaluate(free) {
                fired[0] = Some((
                    h,
                    Notice {
                        direction: Direction::Transmit,
                        available: free,
                    },
                ));
            }

            if !st.tx_busy {
                st.completions += 1;
                let count = st.completions;
                if let Some(h) = st.slots.get_mut(Direction::Complete).evaluate(count) {
                    st.completions = 0;
                    st.slots.get_mut(Direction::Complete).rearm(0);
                    fired[1] = Some((
                        h,
                        Notice {
                            direction: Direction::Complete,
                            available: count,
                        },
                    ));
                }
            }
        }
        for (handler, notice) in fired.into_iter().flatten() {
            handler.invoke(notice);
        }
    }

    /// Returns the number of received bytes waiting to be read.
    #[must_use]
    pub fn rx_available(&self) -> usize {
        self.state.lock().rx.available_to_read()
    }

    /// Returns the free space in the transmit ring.
    #[must_use]
    pub fn tx_free_space(&self) -> usize {
        self.state.lock().tx.available_to_write()
    }

    /// Returns `true` while a chunk is in flight.
    #[must_use]
    pub fn tx_busy(&self) -> bool {
        self.state.lock().tx_busy
    }

    /// Returns `true` between `start` and `stop`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Returns `false` after `deinit`.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    /// Returns the number of received bytes lost to a full receive ring.
    #[must_use]
    pub fn rx_dropped(&self) -> usize {
        self.state.lock().rx.dropped()
    }
}

impl<M: StreamMechanism> Drop for StreamPort<'_, M> {
    fn drop(&mut self) {
        self.deinit();
    }
}
