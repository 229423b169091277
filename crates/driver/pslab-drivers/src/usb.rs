//! USB-CDC policy.
//!
//! Unlike the other drivers, USB runs entirely from the polling loop: the
//! device stack is stepped by [`Usb::task`], which moves received data from
//! the stack's FIFO into the ring buffer, evaluates the receive callback and
//! flushes the transmit FIFO once it has held data for
//! [`USB_TX_FLUSH_POLLS`](crate::config::USB_TX_FLUSH_POLLS) calls without a
//! new write. Every operation therefore takes `&mut self` and no lock is
//! involved.
//!
//! When the host de-asserts DTR (closes the port) the receive ring and the
//! flush counter are reset so stale data is not handed to the next session.

use pslab_core::dispatch::{CallbackSlot, Direction, Handler, Notice};
use pslab_core::fault::Fault;
use pslab_core::ringbuf::RingBuffer;
use pslab_core::{Error, log_debug, log_error, log_info, log_trace};
use pslab_driver_api::{LineState, UsbMechanism};

use crate::config::UsbConfig;
use crate::context::{IoContext, PeripheralKind};

/// A USB-CDC virtual serial port.
pub struct Usb<'a, M: UsbMechanism> {
    ctx: &'a IoContext,
    index: usize,
    mech: M,
    initialized: bool,
    running: bool,
    rx: RingBuffer<'a>,
    rx_slot: CallbackSlot<'a>,
    idle_polls: u32,
    flush_polls: u32,
    line: LineState,
}

impl<'a, M: UsbMechanism> Usb<'a, M> {
    /// Initializes interface `config.index` with `rx` as receive storage.
    ///
    /// # Errors
    ///
    /// Raises [`Error::InvalidArgument`] for an out-of-range interface or
    /// empty storage, [`Error::ResourceBusy`] if the interface is already
    /// claimed and [`Error::HardwareFault`] if the device stack fails to
    /// initialize.
    pub fn init(
        ctx: &'a IoContext,
        config: &UsbConfig<M::Config>,
        mut mech: M,
        rx: &'a mut [u8],
    ) -> Result<Self, Fault> {
        let faults = ctx.faults();
        let rx = faults.check(RingBuffer::new(rx))?;
        faults.check(ctx.claim(PeripheralKind::Usb, config.index))?;

        if let Err(status) = mech.init(&config.hw) {
            ctx.release(PeripheralKind::Usb, config.index);
            log_error!("usb{}: device stack init failed: {status}", config.index);
            return faults.raise(Error::HardwareFault);
        }

        log_info!("usb{}: initialized", config.index);
        Ok(Self {
            ctx,
            index: config.index,
            mech,
            initialized: true,
            running: false,
            rx,
            rx_slot: CallbackSlot::new(),
            idle_polls: 0,
            flush_polls: config.flush_polls,
            line: LineState::default(),
        })
    }

    /// Returns the interface index.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Connects the device to the bus.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] after `deinit`, or the mapped
    /// mechanism status.
    pub fn start(&mut self) -> Result<(), Error> {
        if !self.initialized {
            return Err(Error::InvalidArgument);
        }
        if self.running {
            return Ok(());
        }
        self.mech.start().map_err(Error::from)?;
        self.running = true;
        log_debug!("usb{}: started", self.index);
        Ok(())
    }

    /// Disconnects the device from the bus. Idempotent.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.mech.stop();
        self.running = false;
        self.idle_polls = 0;
        log_debug!("usb{}: stopped", self.index);
    }

    /// Stops the interface, de-initializes the stack, clears the callback
    /// and releases the claim.
    pub fn deinit(&mut self) {
        if !self.initialized {
            return;
        }
        self.stop();
        self.mech.deinit();
        self.initialized = false;
        self.rx_slot.clear();
        self.ctx.release(PeripheralKind::Usb, self.index);
        log_info!("usb{}: deinitialized", self.index);
    }

    /// Steps the device stack. Call at least once per millisecond.
    pub fn task(&mut self) {
        if !self.initialized || !self.running {
            return;
        }
        if let Some(line) = self.mech.task() {
            self.on_line_state(line);
        }
        if !self.mech.connected() {
            return;
        }

        self.drain_fifo();
        self.check_rx_callback();

        if self.mech.tx_available() < self.mech.tx_capacity() {
            self.idle_polls += 1;
            if self.idle_polls >= self.flush_polls {
                log_trace!("usb{}: flushing idle tx fifo", self.index);
                self.mech.flush();
                self.idle_polls = 0;
            }
        } else {
            self.idle_polls = 0;
        }
    }

    fn on_line_state(&mut self, line: LineState) {
        log_debug!("usb{}: dtr={} rts={}", self.index, line.dtr, line.rts);
        if !line.dtr {
            self.rx.reset();
            self.rx_slot.rearm(0);
            self.idle_polls = 0;
        }
        self.line = line;
    }

    /// Moves bytes from the stack's receive FIFO into the ring, stopping
    /// when the ring is full so the host is back-pressured.
    fn drain_fifo(&mut self) {
        while self.mech.rx_available() > 0 && !self.rx.is_full() {
            let mut byte = [0u8; 1];
            if self.mech.read(&mut byte) != 1 {
                break;
            }
            self.rx.push(byte[0]);
        }
    }

    fn check_rx_callback(&mut self) {
        let available = self.rx.available_to_read();
        if let Some(handler) = self.rx_slot.evaluate(available) {
            handler.invoke(Notice {
                direction: Direction::Receive,
                available,
            });
        }
    }

    /// Returns `true` if received data is buffered or waiting in the FIFO.
    #[must_use]
    pub fn rx_ready(&self) -> bool {
        self.initialized && (!self.rx.is_empty() || self.mech.rx_available() > 0)
    }

    /// Returns the number of received bytes ready to read, pulling pending
    /// FIFO data into the ring first.
    pub fn rx_available(&mut self) -> usize {
        if !self.initialized {
            return 0;
        }
        self.drain_fifo();
        self.rx.available_to_read()
    }

    /// Moves up to `buf.len()` received bytes into `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty `buf` or after
    /// `deinit`.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if buf.is_empty() || !self.initialized {
            return Err(Error::InvalidArgument);
        }
        self.drain_fifo();
        let n = self.rx.read(buf);
        self.rx_slot.rearm(self.rx.available_to_read());
        Ok(n)
    }

    /// Queues `bytes` in the stack's transmit FIFO, returning how many fit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for empty `bytes` or after
    /// `deinit`.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize, Error> {
        if bytes.is_empty() || !self.initialized {
            return Err(Error::InvalidArgument);
        }
        self.idle_polls = 0;
        Ok(self.mech.write(bytes))
    }

    /// Registers `handler` to fire once `threshold` bytes are buffered.
    ///
    /// Fires immediately if the threshold is already met.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] after `deinit` or for any
    /// direction other than [`Direction::Receive`].
    pub fn set_callback(
        &mut self,
        direction: Direction,
        threshold: usize,
        handler: Handler<'a>,
    ) -> Result<(), Error> {
        if direction != Direction::Receive || !self.initialized {
            return Err(Error::InvalidArgument);
        }
        self.rx_slot.register(threshold, handler);
        self.check_rx_callback();
        Ok(())
    }

    /// Shorthand for `set_callback(Direction::Receive, ..)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] after `deinit`.
    pub fn set_rx_callback(
        &mut self,
        threshold: usize,
        handler: Handler<'a>,
    ) -> Result<(), Error> {
        self.set_callback(Direction::Receive, threshold, handler)
    }

    /// Returns the free space in the transmit FIFO.
    #[must_use]
    pub fn tx_free_space(&self) -> usize {
        if !self.initialized {
            return 0;
        }
        self.mech.tx_available()
    }

    /// Returns `true` while the transmit FIFO holds unsent data.
    #[must_use]
    pub fn tx_busy(&self) -> bool {
        self.initialized && self.mech.tx_available() < self.mech.tx_capacity()
    }

    /// Returns the last line state reported by the host.
    #[must_use]
    pub fn line_state(&self) -> LineState {
        self.line
    }
}

impl<M: UsbMechanism> Drop for Usb<'_, M> {
    fn drop(&mut self) {
        self.deinit();
    }
}
