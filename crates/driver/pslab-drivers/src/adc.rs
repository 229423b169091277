//! Timer-triggered ADC policy.
//!
//! The mechanism converts at a fixed rate once started and reports each
//! result through [`Adc::on_conversion`]. The policy latches the newest
//! sample for [`Adc::take_sample`] and fires the complete callback every
//! `threshold` conversions.

use pslab_core::dispatch::{CallbackSlot, Direction, Handler, Notice};
use pslab_core::fault::Fault;
use pslab_core::sync::IrqSpinLock;
use pslab_core::{Error, log_debug, log_error, log_info, log_warn};
use pslab_driver_api::AdcMechanism;

use crate::config::AdcConfig;
use crate::context::{IoContext, PeripheralKind};

struct AdcState<'a, M> {
    mech: M,
    initialized: bool,
    running: bool,
    sample_rate_hz: u32,
    latest: Option<u32>,
    conversions: u64,
    since_notify: usize,
    complete: CallbackSlot<'a>,
}

fn validate_rate(hz: u32, max: u32) -> Result<(), Error> {
    if hz == 0 || hz > max {
        return Err(Error::InvalidArgument);
    }
    Ok(())
}

/// One analog-to-digital converter.
pub struct Adc<'a, M: AdcMechanism> {
    ctx: &'a IoContext,
    index: usize,
    state: IrqSpinLock<AdcState<'a, M>>,
}

impl<'a, M: AdcMechanism> Adc<'a, M> {
    /// Initializes converter `config.index` at `config.sample_rate_hz`.
    ///
    /// # Errors
    ///
    /// Raises [`Error::InvalidArgument`] for an out-of-range index or a
    /// sample rate of zero or above the mechanism's maximum,
    /// [`Error::ResourceBusy`] if the converter is already claimed and
    /// [`Error::HardwareFault`] if the mechanism fails to initialize or to
    /// program the rate.
    pub fn init(
        ctx: &'a IoContext,
        config: &AdcConfig<M::Config>,
        mut mech: M,
    ) -> Result<Self, Fault> {
        let faults = ctx.faults();
        let max = mech.max_sample_rate();
        if validate_rate(config.sample_rate_hz, max).is_err() {
            log_warn!(
                "adc{}: sample rate {} Hz outside 1..={max}",
                config.index,
                config.sample_rate_hz
            );
            return faults.raise(Error::InvalidArgument);
        }
        faults.check(ctx.claim(PeripheralKind::Adc, config.index))?;

        let hw = mech
            .init(&config.hw)
            .and_then(|()| mech.configure_rate(config.sample_rate_hz));
        if let Err(status) = hw {
            mech.deinit();
            ctx.release(PeripheralKind::Adc, config.index);
            log_error!("adc{}: mechanism init failed: {status}", config.index);
            return faults.raise(Error::HardwareFault);
        }

        log_info!(
            "adc{}: initialized at {} Hz",
            config.index,
            config.sample_rate_hz
        );
        Ok(Self {
            ctx,
            index: config.index,
            state: IrqSpinLock::new(AdcState {
                mech,
                initialized: true,
                running: false,
                sample_rate_hz: config.sample_rate_hz,
                latest: None,
                conversions: 0,
                since_notify: 0,
                complete: CallbackSlot::new(),
            }),
        })
    }

    /// Returns the converter index.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Starts conversions.
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
        log_debug!("adc{}: started", self.index);
        Ok(())
    }

    /// Stops conversions. Idempotent.
    pub fn stop(&self) {
        let mut st = self.state.lock();
        if !st.running {
            return;
        }
        st.mech.stop();
        st.running = false;
        st.since_notify = 0;
        log_debug!("adc{}: stopped", self.index);
    }

    /// Stops the converter, de-initializes the mechanism, clears the
    /// callback and releases the claim.
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
        st.latest = None;
        st.complete.clear();
        drop(st);
        self.ctx.release(PeripheralKind::Adc, self.index);
        log_info!("adc{}: deinitialized", self.index);
    }

    /// Changes the sample rate.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] for a rate of zero or above the
    ///   mechanism's maximum, or after `deinit`.
    /// - [`Error::ResourceBusy`] while running.
    /// - The mapped mechanism status if the timer could not be programmed.
    pub fn set_sample_rate(&self, hz: u32) -> Result<(), Error> {
        let mut st = self.state.lock();
        if !st.initialized {
            return Err(Error::InvalidArgument);
        }
        if st.running {
            return Err(Error::ResourceBusy);
        }
        validate_rate(hz, st.mech.max_sample_rate())?;
        st.mech.configure_rate(hz).map_err(Error::from)?;
        st.sample_rate_hz = hz;
        Ok(())
    }

    /// Returns the configured sample rate.
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.state.lock().sample_rate_hz
    }

    /// Conversion entry point, called by the mechanism's ISR with each
    /// result. Ignored while stopped.
    pub fn on_conversion(&self, value: u32) {
        let _irq = self.ctx.faults().enter_interrupt();
        let fire = {
            let mut st = self.state.lock();
            if !st.running {
                return;
            }
            st.latest = Some(value);
            st.conversions += 1;
            st.since_notify += 1;
            let count = st.since_notify;
            let fire = st.complete.evaluate(count).map(|h| (h, count));
            if fire.is_some() {
                st.since_notify = 0;
                st.complete.rearm(0);
            }
            fire
        };
        if let Some((handler, count)) = fire {
            handler.invoke(Notice {
                direction: Direction::Complete,
                available: count,
            });
        }
    }

    /// Returns the newest sample and clears the latch, or `None` if no
    /// conversion finished since the last call.
    pub fn take_sample(&self) -> Option<u32> {
        self.state.lock().latest.take()
    }

    /// Returns the newest sample without clearing the latch.
    #[must_use]
    pub fn latest(&self) -> Option<u32> {
        self.state.lock().latest
    }

    /// Returns the number of conversions since `init`.
    #[must_use]
    pub fn conversions(&self) -> u64 {
        self.state.lock().conversions
    }

    /// Registers `handler` to fire every `threshold` conversions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] after `deinit` or for any direction
    /// other than [`Direction::Complete`].
    pub fn set_callback(
        &self,
        direction: Direction,
        threshold: usize,
        handler: Handler<'a>,
    ) -> Result<(), Error> {
        if direction != Direction::Complete {
            return Err(Error::InvalidArgument);
        }
        let mut st = self.state.lock();
        if !st.initialized {
            return Err(Error::InvalidArgument);
        }
        st.complete.register(threshold, handler);
        st.since_notify = 0;
        Ok(())
    }
}

impl<M: AdcMechanism> Drop for Adc<'_, M> {
    fn drop(&mut self) {
        self.deinit();
    }
}
