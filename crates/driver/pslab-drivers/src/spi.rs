//! SPI bus policy.
//!
//! Two transfer styles share one bus:
//!
//! - synchronous [`transmit`](Spi::transmit) / [`receive`](Spi::receive) /
//!   [`transfer`](Spi::transfer), which poll the mechanism's status
//!   registers with a bounded spin per byte;
//! - asynchronous [`start_transfer`](Spi::start_transfer), whose clocked-in
//!   bytes arrive through [`on_transfer_complete`](Spi::on_transfer_complete)
//!   and are buffered for [`read`](Spi::read).
//!
//! Only one transfer is in flight at a time; anything else returns
//! [`Error::ResourceBusy`] until it completes.

use pslab_core::dispatch::{CallbackSlots, Direction, Handler, Notice};
use pslab_core::fault::Fault;
use pslab_core::ringbuf::RingBuffer;
use pslab_core::sync::IrqSpinLock;
use pslab_core::{Error, log_debug, log_error, log_info, log_trace};
use pslab_driver_api::SpiMechanism;

use crate::config::{SPI_FILLER, SpiConfig};
use crate::context::{IoContext, PeripheralKind};

struct SpiState<'a, M> {
    mech: M,
    initialized: bool,
    running: bool,
    in_progress: bool,
    spin_limit: u32,
    rx: RingBuffer<'a>,
    slots: CallbackSlots<'a>,
    completions: usize,
}

impl<M: SpiMechanism> SpiState<'_, M> {
    fn check_idle(&self) -> Result<(), Error> {
        if !self.initialized {
            return Err(Error::InvalidArgument);
        }
        if self.in_progress {
            return Err(Error::ResourceBusy);
        }
        Ok(())
    }

    /// Clocks one byte out and returns the byte clocked in.
    fn exchange(&mut self, out: u8) -> Result<u8, Error> {
        let mut polls = 0;
        while !self.mech.tx_ready() {
            polls += 1;
            if polls >= self.spin_limit {
                return Err(Error::Timeout);
            }
            core::hint::spin_loop();
        }
        self.mech.write_byte(out);
        polls = 0;
        while !self.mech.rx_ready() {
            polls += 1;
            if polls >= self.spin_limit {
                return Err(Error::Timeout);
            }
            core::hint::spin_loop();
        }
        Ok(self.mech.read_byte())
    }
}

/// An SPI bus in master mode.
pub struct Spi<'a, M: SpiMechanism> {
    ctx: &'a IoContext,
    index: usize,
    state: IrqSpinLock<SpiState<'a, M>>,
}

impl<'a, M: SpiMechanism> Spi<'a, M> {
    /// Initializes bus `config.index`, binding `rx` as storage for bytes
    /// received by asynchronous transfers.
    ///
    /// # Errors
    ///
    /// Raises [`Error::InvalidArgument`] for an out-of-range bus or empty
    /// storage, [`Error::ResourceBusy`] if the bus is already claimed and
    /// [`Error::HardwareFault`] if the mechanism fails to initialize.
    pub fn init(
        ctx: &'a IoContext,
        config: &SpiConfig<M::Config>,
        mut mech: M,
        rx: &'a mut [u8],
    ) -> Result<Self, Fault> {
        let faults = ctx.faults();
        let rx = faults.check(RingBuffer::new(rx))?;
        faults.check(ctx.claim(PeripheralKind::Spi, config.index))?;

        if let Err(status) = mech.init(&config.hw) {
            ctx.release(PeripheralKind::Spi, config.index);
            log_error!("spi{}: mechanism init failed: {status}", config.index);
            return faults.raise(Error::HardwareFault);
        }

        log_info!("spi{}: initialized", config.index);
        Ok(Self {
            ctx,
            index: config.index,
            state: IrqSpinLock::new(SpiState {
                mech,
                initialized: true,
                running: false,
                in_progress: false,
                spin_limit: config.spin_limit,
                rx,
                slots: CallbackSlots::new(),
                completions: 0,
            }),
        })
    }

    /// Returns the bus index.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Enables the bus's completion interrupt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] after `deinit`, or the mapped
    /// mechanism status.
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
        log_debug!("spi{}: started", self.index);
        Ok(())
    }

    /// Disables the completion interrupt and abandons any transfer in
    /// flight. Idempotent.
    pub fn stop(&self) {
        let mut st = self.state.lock();
        if !st.running {
            return;
        }
        st.mech.stop();
        st.running = false;
        st.in_progress = false;
        st.completions = 0;
        log_debug!("spi{}: stopped", self.index);
    }

    /// Stops the bus, de-initializes the mechanism, clears all callbacks and
    /// releases the claim.
    pub fn deinit(&self) {
        let mut st = self.state.lock();
        if !st.initialized {
            return;
        }
        if st.running {
            st.mech.stop();
            st.running = false;
        }
        st.mech.deinit();
        st.initialized = false;
        st.in_progress = false;
        st.completions = 0;
        st.slots.clear_all();
        drop(st);
        self.ctx.release(PeripheralKind::Spi, self.index);
        log_info!("spi{}: deinitialized", self.index);
    }

    /// Clocks out `tx`, discarding the bytes clocked in.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] for empty `tx` or after `deinit`.
    /// - [`Error::ResourceBusy`] while an asynchronous transfer is in flight.
    /// - [`Error::Timeout`] if the bus stalls.
    pub fn transmit(&self, tx: &[u8]) -> Result<(), Error> {
        if tx.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let mut st = self.state.lock();
        st.check_idle()?;
        for &byte in tx {
            st.exchange(byte)?;
        }
        Ok(())
    }

    /// Fills `rx` from the bus, clocking out filler bytes.
    ///
    /// # Errors
    ///
    /// Same as [`transmit`](Self::transmit).
    pub fn receive(&self, rx: &mut [u8]) -> Result<(), Error> {
        if rx.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let mut st = self.state.lock();
        st.check_idle()?;
        for slot in rx.iter_mut() {
            *slot = st.exchange(SPI_FILLER)?;
        }
        Ok(())
    }

    /// Full-duplex transfer: clocks out `tx` while filling `rx`.
    ///
    /// # Errors
    ///
    /// Same as [`transmit`](Self::transmit); also
    /// [`Error::InvalidArgument`] if the lengths differ.
    pub fn transfer(&self, tx: &[u8], rx: &mut [u8]) -> Result<(), Error> {
        if tx.is_empty() || tx.len() != rx.len() {
            return Err(Error::InvalidArgument);
        }
        let mut st = self.state.lock();
        st.check_idle()?;
        for (&out, slot) in tx.iter().zip(rx.iter_mut()) {
            *slot = st.exchange(out)?;
        }
        Ok(())
    }

    /// Starts an asynchronous full-duplex transfer of `tx`.
    ///
    /// The bytes clocked in are delivered through
    /// [`on_transfer_complete`](Self::on_transfer_complete).
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] for empty `tx`, after `deinit`, or while
    ///   the bus is stopped.
    /// - [`Error::ResourceBusy`] while another transfer is in flight.
    /// - The mapped mechanism status if the transfer could not start.
    pub fn start_transfer(&self, tx: &[u8]) -> Result<(), Error> {
        if tx.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let mut st = self.state.lock();
        st.check_idle()?;
        if !st.running {
            return Err(Error::InvalidArgument);
        }
        st.mech.transfer(tx).map_err(Error::from)?;
        st.in_progress = true;
        Ok(())
    }

    /// Transfer completion entry point, called by the mechanism's ISR with
    /// the bytes clocked in.
    ///
    /// Ignored if no transfer is in flight.
    pub fn on_transfer_complete(&self, rx: &[u8]) {
        let _irq = self.ctx.faults().enter_interrupt();
        let mut fired: [Option<(Handler<'a>, Notice)>; 2] = [None, None];
        {
            let mut st = self.state.lock();
            if !st.in_progress {
                log_trace!("spi{}: stray completion", self.index);
                return;
            }
            st.in_progress = false;
            for &byte in rx {
                st.rx.push(byte);
            }

            let available = st.rx.available_to_read();
            if let Some(h) = st.slots.get_mut(Direction::Receive).evaluate(available) {
                fired[0] = Some((
                    h,
                    Notice {
                        direction: Direction::Receive,
                        available,
                    },
                ));
            }

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
        for (handler, notice) in fired.into_iter().flatten() {
            handler.invoke(notice);
        }
    }

    /// Moves up to `buf.len()` bytes received by asynchronous transfers
    /// into `buf`.
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

    /// Registers `handler` for `direction`.
    ///
    /// Receive thresholds count buffered bytes; complete thresholds count
    /// finished asynchronous transfers. A receive handler whose threshold is
    /// already met fires immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] after `deinit` or for
    /// [`Direction::Transmit`], which SPI has no use for.
    pub fn set_callback(
        &self,
        direction: Direction,
        threshold: usize,
        handler: Handler<'a>,
    ) -> Result<(), Error> {
        if direction == Direction::Transmit {
            return Err(Error::InvalidArgument);
        }
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

    /// Returns `true` while an asynchronous transfer is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state.lock().in_progress
    }

    /// Returns the number of buffered received bytes.
    #[must_use]
    pub fn rx_available(&self) -> usize {
        self.state.lock().rx.available_to_read()
    }
}

impl<M: SpiMechanism> Drop for Spi<'_, M> {
    fn drop(&mut self) {
        self.deinit();
    }
}
