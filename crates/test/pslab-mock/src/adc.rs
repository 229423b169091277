//! Recording ADC mechanism.

use std::sync::{Arc, Mutex};

use pslab_driver_api::{AdcMechanism, HwStatus, Mechanism};

use crate::{Call, lock};

/// Maximum rate of the mock converter: the trigger timer's 25 kHz.
pub const MOCK_MAX_RATE_HZ: u32 = 25_000;

#[derive(Debug)]
struct AdcLog {
    calls: Vec<Call>,
    fail_init: Option<HwStatus>,
    fail_rate: Option<HwStatus>,
    rate: Option<u32>,
}

/// An ADC mechanism that records calls.
#[derive(Debug, Clone)]
pub struct MockAdc {
    log: Arc<Mutex<AdcLog>>,
}

impl MockAdc {
    /// Creates a mock with a maximum rate of [`MOCK_MAX_RATE_HZ`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(AdcLog {
                calls: Vec::new(),
                fail_init: None,
                fail_rate: None,
                rate: None,
            })),
        }
    }

    /// Makes `init` fail with `status`.
    pub fn fail_init(&self, status: HwStatus) {
        lock(&self.log).fail_init = Some(status);
    }

    /// Makes `configure_rate` fail with `status`.
    pub fn fail_rate(&self, status: HwStatus) {
        lock(&self.log).fail_rate = Some(status);
    }

    /// Returns the rate last programmed.
    #[must_use]
    pub fn rate(&self) -> Option<u32> {
        lock(&self.log).rate
    }

    /// Returns every call made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.log).calls.clone()
    }
}

impl Default for MockAdc {
    fn default() -> Self {
        Self::new()
    }
}

impl Mechanism for MockAdc {
    type Config = ();

    fn init(&mut self, _config: &()) -> Result<(), HwStatus> {
        let mut log = lock(&self.log);
        log.calls.push(Call::Init);
        log.fail_init.map_or(Ok(()), Err)
    }

    fn deinit(&mut self) {
        lock(&self.log).calls.push(Call::Deinit);
    }

    fn start(&mut self) -> Result<(), HwStatus> {
        lock(&self.log).calls.push(Call::Start);
        Ok(())
    }

    fn stop(&mut self) {
        lock(&self.log).calls.push(Call::Stop);
    }
}

impl AdcMechanism for MockAdc {
    fn max_sample_rate(&self) -> u32 {
        MOCK_MAX_RATE_HZ
    }

    fn configure_rate(&mut self, hz: u32) -> Result<(), HwStatus> {
        let mut log = lock(&self.log);
        log.calls.push(Call::ConfigureRate(hz));
        if let Some(status) = log.fail_rate {
            return Err(status);
        }
        log.rate = Some(hz);
        Ok(())
    }
}
