//! Scripted USB-CDC device stack.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use pslab_driver_api::{HwStatus, LineState, Mechanism, UsbMechanism};

use crate::{Call, lock};

/// Transmit FIFO size of the mock stack.
pub const MOCK_TX_FIFO: usize = 64;

#[derive(Debug)]
struct UsbLog {
    calls: Vec<Call>,
    fail_init: Option<HwStatus>,
    connected: bool,
    line: Option<LineState>,
    tasks: usize,
    rx_fifo: VecDeque<u8>,
    tx_fifo: Vec<u8>,
    sent: Vec<u8>,
}

/// A device stack whose host side is driven by the test.
#[derive(Debug, Clone)]
pub struct MockUsb {
    log: Arc<Mutex<UsbLog>>,
}

impl MockUsb {
    /// Creates a disconnected stack with empty FIFOs.
    #[must_use]
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(UsbLog {
                calls: Vec::new(),
                fail_init: None,
                connected: false,
                line: None,
                tasks: 0,
                rx_fifo: VecDeque::new(),
                tx_fifo: Vec::new(),
                sent: Vec::new(),
            })),
        }
    }

    /// Makes `init` fail with `status`.
    pub fn fail_init(&self, status: HwStatus) {
        lock(&self.log).fail_init = Some(status);
    }

    /// Simulates the host opening the port (enumerated, DTR asserted).
    pub fn host_open(&self) {
        let mut log = lock(&self.log);
        log.connected = true;
        log.line = Some(LineState {
            dtr: true,
            rts: true,
        });
    }

    /// Simulates the host closing the port (DTR de-asserted).
    pub fn host_close(&self) {
        lock(&self.log).line = Some(LineState {
            dtr: false,
            rts: false,
        });
    }

    /// Simulates the host sending `bytes`.
    pub fn host_send(&self, bytes: &[u8]) {
        lock(&self.log).rx_fifo.extend(bytes);
    }

    /// Returns the bytes that reached the host through `flush`.
    #[must_use]
    pub fn host_received(&self) -> Vec<u8> {
        lock(&self.log).sent.clone()
    }

    /// Returns the bytes still waiting in the receive FIFO.
    #[must_use]
    pub fn rx_fifo_len(&self) -> usize {
        lock(&self.log).rx_fifo.len()
    }

    /// Returns the number of `flush` calls.
    #[must_use]
    pub fn flushes(&self) -> usize {
        lock(&self.log)
            .calls
            .iter()
            .filter(|c| **c == Call::Flush)
            .count()
    }

    /// Returns the number of `task` calls.
    #[must_use]
    pub fn tasks(&self) -> usize {
        lock(&self.log).tasks
    }

    /// Returns every call made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.log).calls.clone()
    }
}

impl Default for MockUsb {
    fn default() -> Self {
        Self::new()
    }
}

impl Mechanism for MockUsb {
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

impl UsbMechanism for MockUsb {
    fn task(&mut self) -> Option<LineState> {
        let mut log = lock(&self.log);
        log.tasks += 1;
        log.line.take()
    }

    fn connected(&self) -> bool {
        lock(&self.log).connected
    }

    fn rx_available(&self) -> usize {
        lock(&self.log).rx_fifo.len()
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut log = lock(&self.log);
        let n = buf.len().min(log.rx_fifo.len());
        for (slot, byte) in buf.iter_mut().zip(log.rx_fifo.drain(..n)) {
            *slot = byte;
        }
        n
    }

    fn tx_available(&self) -> usize {
        MOCK_TX_FIFO - lock(&self.log).tx_fifo.len()
    }

    fn tx_capacity(&self) -> usize {
        MOCK_TX_FIFO
    }

    fn write(&mut self, bytes: &[u8]) -> usize {
        let mut log = lock(&self.log);
        let n = bytes.len().min(MOCK_TX_FIFO - log.tx_fifo.len());
        log.tx_fifo.extend_from_slice(&bytes[..n]);
        n
    }

    fn flush(&mut self) {
        let mut log = lock(&self.log);
        log.calls.push(Call::Flush);
        let pending = std::mem::take(&mut log.tx_fifo);
        log.sent.extend(pending);
    }
}
