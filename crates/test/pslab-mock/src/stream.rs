//! Recording UART mechanism.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use pslab_driver_api::{HwStatus, Mechanism, PolledIo, SerialConfig, StreamMechanism};

use crate::{Call, lock};

#[derive(Debug)]
struct StreamLog {
    calls: Vec<Call>,
    config: Option<SerialConfig>,
    fail_init: Option<HwStatus>,
    fail_start: Option<HwStatus>,
    fail_transmit: Option<HwStatus>,
    rx_register: VecDeque<u8>,
    wire: Vec<u8>,
    tx_ready: bool,
}

/// A UART mechanism that records calls and serves polled data from a queue.
#[derive(Debug, Clone)]
pub struct MockStream {
    log: Arc<Mutex<StreamLog>>,
}

impl MockStream {
    /// Creates a mock whose transmit register is always ready.
    #[must_use]
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(StreamLog {
                calls: Vec::new(),
                config: None,
                fail_init: None,
                fail_start: None,
                fail_transmit: None,
                rx_register: VecDeque::new(),
                wire: Vec::new(),
                tx_ready: true,
            })),
        }
    }

    /// Makes `init` fail with `status`.
    pub fn fail_init(&self, status: HwStatus) {
        lock(&self.log).fail_init = Some(status);
    }

    /// Makes `start` fail with `status`.
    pub fn fail_start(&self, status: HwStatus) {
        lock(&self.log).fail_start = Some(status);
    }

    /// Makes `transmit` fail with `status`, or succeed again with `None`.
    pub fn fail_transmit(&self, status: Option<HwStatus>) {
        lock(&self.log).fail_transmit = status;
    }

    /// Sets whether the transmit data register accepts bytes.
    pub fn set_tx_ready(&self, ready: bool) {
        lock(&self.log).tx_ready = ready;
    }

    /// Queues bytes to be returned by polled reads.
    pub fn feed_rx(&self, bytes: &[u8]) {
        lock(&self.log).rx_register.extend(bytes);
    }

    /// Returns every call made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.log).calls.clone()
    }

    /// Returns the chunks handed to `transmit`, in order.
    #[must_use]
    pub fn transmits(&self) -> Vec<Vec<u8>> {
        lock(&self.log)
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Transmit(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the number of times `call` was made.
    #[must_use]
    pub fn count(&self, call: &Call) -> usize {
        lock(&self.log).calls.iter().filter(|c| *c == call).count()
    }

    /// Returns the bytes written through polled I/O.
    #[must_use]
    pub fn wire(&self) -> Vec<u8> {
        lock(&self.log).wire.clone()
    }

    /// Returns the config passed to `init`.
    #[must_use]
    pub fn config(&self) -> Option<SerialConfig> {
        lock(&self.log).config
    }
}

impl Default for MockStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Mechanism for MockStream {
    type Config = SerialConfig;

    fn init(&mut self, config: &SerialConfig) -> Result<(), HwStatus> {
        let mut log = lock(&self.log);
        log.calls.push(Call::Init);
        if let Some(status) = log.fail_init {
            return Err(status);
        }
        log.config = Some(*config);
        Ok(())
    }

    fn deinit(&mut self) {
        lock(&self.log).calls.push(Call::Deinit);
    }

    fn start(&mut self) -> Result<(), HwStatus> {
        let mut log = lock(&self.log);
        log.calls.push(Call::Start);
        log.fail_start.map_or(Ok(()), Err)
    }

    fn stop(&mut self) {
        lock(&self.log).calls.push(Call::Stop);
    }
}

impl StreamMechanism for MockStream {
    fn transmit(&mut self, bytes: &[u8]) -> Result<(), HwStatus> {
        let mut log = lock(&self.log);
        if let Some(status) = log.fail_transmit {
            return Err(status);
        }
        log.calls.push(Call::Transmit(bytes.to_vec()));
        Ok(())
    }
}

impl PolledIo for MockStream {
    fn tx_ready(&self) -> bool {
        lock(&self.log).tx_ready
    }

    fn write_byte(&mut self, byte: u8) {
        lock(&self.log).wire.push(byte);
    }

    fn rx_ready(&self) -> bool {
        !lock(&self.log).rx_register.is_empty()
    }

    fn read_byte(&mut self) -> u8 {
        lock(&self.log).rx_register.pop_front().unwrap_or(0)
    }
}
