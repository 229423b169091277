//! Recording SPI mechanism.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use pslab_driver_api::{HwStatus, Mechanism, PolledIo, SpiMechanism, SpiSettings};

use crate::{Call, lock};

#[derive(Debug)]
struct SpiLog {
    calls: Vec<Call>,
    fail_init: Option<HwStatus>,
    fail_transfer: Option<HwStatus>,
    stalled: bool,
    // Bytes the peripheral will clock in next; empty means loopback.
    miso: VecDeque<u8>,
    mosi: Vec<u8>,
    shifted: VecDeque<u8>,
}

/// An SPI mechanism that records calls.
///
/// Polled exchanges answer from a scripted MISO queue, or echo the byte
/// clocked out when the queue is empty.
#[derive(Debug, Clone)]
pub struct MockSpi {
    log: Arc<Mutex<SpiLog>>,
}

impl MockSpi {
    /// Creates an idle, loopback mock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(SpiLog {
                calls: Vec::new(),
                fail_init: None,
                fail_transfer: None,
                stalled: false,
                miso: VecDeque::new(),
                mosi: Vec::new(),
                shifted: VecDeque::new(),
            })),
        }
    }

    /// Makes `init` fail with `status`.
    pub fn fail_init(&self, status: HwStatus) {
        lock(&self.log).fail_init = Some(status);
    }

    /// Makes `transfer` fail with `status`.
    pub fn fail_transfer(&self, status: HwStatus) {
        lock(&self.log).fail_transfer = Some(status);
    }

    /// Stalls the bus: status registers never report ready.
    pub fn stall(&self) {
        lock(&self.log).stalled = true;
    }

    /// Scripts the bytes the peripheral answers with.
    pub fn script_miso(&self, bytes: &[u8]) {
        lock(&self.log).miso.extend(bytes);
    }

    /// Returns the bytes clocked out through polled exchanges.
    #[must_use]
    pub fn mosi(&self) -> Vec<u8> {
        lock(&self.log).mosi.clone()
    }

    /// Returns every call made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.log).calls.clone()
    }
}

impl Default for MockSpi {
    fn default() -> Self {
        Self::new()
    }
}

impl Mechanism for MockSpi {
    type Config = SpiSettings;

    fn init(&mut self, _config: &SpiSettings) -> Result<(), HwStatus> {
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

impl PolledIo for MockSpi {
    fn tx_ready(&self) -> bool {
        !lock(&self.log).stalled
    }

    fn write_byte(&mut self, byte: u8) {
        let mut log = lock(&self.log);
        log.mosi.push(byte);
        let answer = log.miso.pop_front().unwrap_or(byte);
        log.shifted.push_back(answer);
    }

    fn rx_ready(&self) -> bool {
        let log = lock(&self.log);
        !log.stalled && !log.shifted.is_empty()
    }

    fn read_byte(&mut self) -> u8 {
        lock(&self.log).shifted.pop_front().unwrap_or(0)
    }
}

impl SpiMechanism for MockSpi {
    fn transfer(&mut self, tx: &[u8]) -> Result<(), HwStatus> {
        let mut log = lock(&self.log);
        if let Some(status) = log.fail_transfer {
            return Err(status);
        }
        log.calls.push(Call::Transfer(tx.to_vec()));
        Ok(())
    }
}
