//! Mock implementations for testing
//!
//! Host-side stand-ins for every peripheral the driver framework touches.
//! All bus-side mocks share one [`BusTrace`], so a test can assert on the
//! interleaving of chip-select edges, clock changes and transfers across
//! devices, and in particular on bus contention.

#![cfg(any(test, feature = "std"))]

mod sd_card;

pub use sd_card::SdCardSim;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use embedded_hal_async::delay::DelayNs;

use crate::peripheral::{I2cPeripheral, SpiPeripheral};
use crate::storage::{File, Storage};

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Bus trace
// ---------------------------------------------------------------------------

/// One observable event on the mock bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// A chip-select went active (low).
    Select(&'static str),
    /// A chip-select went inactive (high).
    Deselect(&'static str),
    /// A non-select control line changed level.
    Line {
        /// Pin name
        name: &'static str,
        /// New level
        high: bool,
    },
    /// The bus clock was reconfigured.
    Clock(u32),
    /// Bytes clocked out. `selected` is the chip-select active at the time.
    Write {
        /// Active chip-select, if any
        selected: Option<&'static str>,
        /// Bytes sent
        bytes: Vec<u8>,
    },
    /// Full-duplex transfer.
    Transfer {
        /// Active chip-select, if any
        selected: Option<&'static str>,
        /// Bytes sent
        out: Vec<u8>,
        /// Bytes received
        input: Vec<u8>,
    },
}

#[derive(Default)]
struct TraceState {
    events: Vec<BusEvent>,
    selected: Vec<&'static str>,
    contention: usize,
    scripted: VecDeque<u8>,
    fail_next: bool,
}

/// Shared, cloneable event log for every mock on one bus.
#[derive(Clone, Default)]
pub struct BusTrace {
    state: Arc<Mutex<TraceState>>,
}

impl BusTrace {
    /// Create an empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every event so far.
    pub fn events(&self) -> Vec<BusEvent> {
        locked(&self.state).events.clone()
    }

    /// Number of times a chip-select went active while another one was
    /// already active.
    pub fn contention(&self) -> usize {
        locked(&self.state).contention
    }

    /// Chip-selects currently active.
    pub fn selected(&self) -> Vec<&'static str> {
        locked(&self.state).selected.clone()
    }

    /// Concatenation of every byte written or transferred while `name` was
    /// the active chip-select.
    pub fn bytes_sent_to(&self, name: &str) -> Vec<u8> {
        let state = locked(&self.state);
        let mut out = Vec::new();
        for event in &state.events {
            match event {
                BusEvent::Write { selected: Some(s), bytes } if *s == name => {
                    out.extend_from_slice(bytes);
                }
                BusEvent::Transfer { selected: Some(s), out: sent, .. } if *s == name => {
                    out.extend_from_slice(sent);
                }
                _ => {}
            }
        }
        out
    }

    /// Every clock rate the bus was set to, in order.
    pub fn clocks(&self) -> Vec<u32> {
        locked(&self.state)
            .events
            .iter()
            .filter_map(|e| match e {
                BusEvent::Clock(hz) => Some(*hz),
                _ => None,
            })
            .collect()
    }

    /// Queue bytes to be returned by the next transfers, ahead of the
    /// installed responder.
    pub fn script_response(&self, bytes: &[u8]) {
        locked(&self.state).scripted.extend(bytes.iter().copied());
    }

    /// Make the next SPI operation fail, clock changes included.
    pub fn fail_next_transfer(&self) {
        locked(&self.state).fail_next = true;
    }

    /// Drop all recorded events, keeping selects and scripted bytes.
    pub fn clear_events(&self) {
        locked(&self.state).events.clear();
    }

    fn select(&self, name: &'static str) {
        let mut state = locked(&self.state);
        if !state.selected.is_empty() && !state.selected.contains(&name) {
            state.contention = state.contention.saturating_add(1);
        }
        if !state.selected.contains(&name) {
            state.selected.push(name);
        }
        state.events.push(BusEvent::Select(name));
    }

    fn deselect(&self, name: &'static str) {
        let mut state = locked(&self.state);
        state.selected.retain(|s| *s != name);
        state.events.push(BusEvent::Deselect(name));
    }

    fn push(&self, event: BusEvent) {
        locked(&self.state).events.push(event);
    }

    fn current_select(&self) -> Option<&'static str> {
        locked(&self.state).selected.first().copied()
    }

    fn take_failure(&self) -> bool {
        core::mem::take(&mut locked(&self.state).fail_next)
    }

    fn next_scripted(&self) -> Option<u8> {
        locked(&self.state).scripted.pop_front()
    }
}

// ---------------------------------------------------------------------------
// Pins
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq)]
enum PinRole {
    ChipSelect,
    Control,
}

/// Output pin that records its edges into a [`BusTrace`].
pub struct MockPin {
    name: &'static str,
    role: PinRole,
    high: bool,
    trace: BusTrace,
}

impl MockPin {
    /// Active-low chip-select, starting deasserted (high).
    pub fn chip_select(name: &'static str, trace: &BusTrace) -> Self {
        Self {
            name,
            role: PinRole::ChipSelect,
            high: true,
            trace: trace.clone(),
        }
    }

    /// Plain control line (e.g. data/command), starting low.
    pub fn line(name: &'static str, trace: &BusTrace) -> Self {
        Self {
            name,
            role: PinRole::Control,
            high: false,
            trace: trace.clone(),
        }
    }

    /// Current level.
    pub fn is_set_high(&self) -> bool {
        self.high
    }

    fn drive(&mut self, high: bool) {
        self.high = high;
        match (self.role, high) {
            (PinRole::ChipSelect, false) => self.trace.select(self.name),
            (PinRole::ChipSelect, true) => self.trace.deselect(self.name),
            (PinRole::Control, _) => self.trace.push(BusEvent::Line {
                name: self.name,
                high,
            }),
        }
    }
}

impl ErrorType for MockPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.drive(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.drive(true);
        Ok(())
    }
}

#[derive(Default)]
struct ReadyState {
    stuck_low: bool,
    busy_polls: u32,
    polls: u32,
}

/// Scriptable input line standing in for the decoder's DREQ.
#[derive(Clone, Default)]
pub struct ReadyLine {
    state: Arc<Mutex<ReadyState>>,
}

impl ReadyLine {
    /// A line that always reads high.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report low for the next `polls` reads, then high again.
    pub fn busy_for(&self, polls: u32) {
        locked(&self.state).busy_polls = polls;
    }

    /// Hold the line low until [`ReadyLine::release`].
    pub fn hold_low(&self) {
        locked(&self.state).stuck_low = true;
    }

    /// Undo [`ReadyLine::hold_low`].
    pub fn release(&self) {
        locked(&self.state).stuck_low = false;
    }

    /// Total reads so far.
    pub fn polls(&self) -> u32 {
        locked(&self.state).polls
    }
}

impl ErrorType for ReadyLine {
    type Error = core::convert::Infallible;
}

impl InputPin for ReadyLine {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        let mut state = locked(&self.state);
        state.polls = state.polls.saturating_add(1);
        if state.stuck_low {
            return Ok(false);
        }
        if state.busy_polls > 0 {
            state.busy_polls = state.busy_polls.saturating_sub(1);
            return Ok(false);
        }
        Ok(true)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

// ---------------------------------------------------------------------------
// SPI
// ---------------------------------------------------------------------------

/// Produces the byte a device clocks back for each byte sent.
pub trait Responder: Send {
    /// Exchange one byte.
    fn exchange(&mut self, out: u8) -> u8;
}

/// Responder for a bus with nothing driving MISO.
pub struct FloatingBus;

impl Responder for FloatingBus {
    fn exchange(&mut self, _out: u8) -> u8 {
        0xFF
    }
}

/// Mock SPI transfer failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockSpiError;

/// Recording SPI bus.
pub struct MockSpi {
    trace: BusTrace,
    responder: Box<dyn Responder>,
}

impl MockSpi {
    /// Bus with a floating MISO line.
    pub fn new(trace: &BusTrace) -> Self {
        Self::with_responder(trace, FloatingBus)
    }

    /// Bus whose MISO is driven by `responder`.
    pub fn with_responder(trace: &BusTrace, responder: impl Responder + 'static) -> Self {
        Self {
            trace: trace.clone(),
            responder: Box::new(responder),
        }
    }
}

impl SpiPeripheral for MockSpi {
    type Error = MockSpiError;

    async fn transfer_in_place(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        if self.trace.take_failure() {
            return Err(MockSpiError);
        }
        let out = buf.to_vec();
        for byte in buf.iter_mut() {
            let sent = *byte;
            let received = self.responder.exchange(sent);
            *byte = self.trace.next_scripted().unwrap_or(received);
        }
        self.trace.push(BusEvent::Transfer {
            selected: self.trace.current_select(),
            out,
            input: buf.to_vec(),
        });
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        if self.trace.take_failure() {
            return Err(MockSpiError);
        }
        for &byte in data {
            let _ = self.responder.exchange(byte);
        }
        self.trace.push(BusEvent::Write {
            selected: self.trace.current_select(),
            bytes: data.to_vec(),
        });
        Ok(())
    }

    fn set_frequency(&mut self, hz: u32) -> Result<(), Self::Error> {
        if self.trace.take_failure() {
            return Err(MockSpiError);
        }
        self.trace.push(BusEvent::Clock(hz));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// I2C
// ---------------------------------------------------------------------------

/// Mock I2C failure (no device acknowledged the address).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockI2cError;

struct RegisterFile {
    address: u8,
    registers: [u8; 256],
    pointer: u8,
    writes: Vec<(u8, u8)>,
}

/// Register-file I2C target.
#[derive(Clone)]
pub struct MockI2c {
    file: Arc<Mutex<RegisterFile>>,
}

impl MockI2c {
    /// Target at 7-bit `address` with all registers zero.
    pub fn new(address: u8) -> Self {
        Self {
            file: Arc::new(Mutex::new(RegisterFile {
                address,
                registers: [0; 256],
                pointer: 0,
                writes: Vec::new(),
            })),
        }
    }

    /// An FT6206 at 0x38 reporting the FocalTech vendor and chip IDs.
    pub fn ft6206() -> Self {
        let mock = Self::new(0x38);
        mock.set_register(0xA8, 0x11);
        mock.set_register(0xA3, 0x06);
        mock
    }

    /// Preload a register.
    pub fn set_register(&self, reg: u8, value: u8) {
        let mut file = locked(&self.file);
        if let Some(slot) = file.registers.get_mut(usize::from(reg)) {
            *slot = value;
        }
    }

    /// Current register value.
    pub fn register(&self, reg: u8) -> u8 {
        locked(&self.file)
            .registers
            .get(usize::from(reg))
            .copied()
            .unwrap_or(0)
    }

    /// Every (register, value) pair written so far.
    pub fn writes(&self) -> Vec<(u8, u8)> {
        locked(&self.file).writes.clone()
    }
}

impl I2cPeripheral for MockI2c {
    type Error = MockI2cError;

    async fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error> {
        let mut file = locked(&self.file);
        if address != file.address {
            return Err(MockI2cError);
        }
        let Some((&reg, values)) = data.split_first() else {
            return Ok(());
        };
        file.pointer = reg;
        let mut at = reg;
        for &value in values {
            if let Some(slot) = file.registers.get_mut(usize::from(at)) {
                *slot = value;
            }
            file.writes.push((at, value));
            at = at.wrapping_add(1);
        }
        Ok(())
    }

    async fn write_read(
        &mut self,
        address: u8,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Self::Error> {
        I2cPeripheral::write(self, address, write).await?;
        let mut file = locked(&self.file);
        let mut at = file.pointer;
        for byte in read.iter_mut() {
            *byte = file.registers.get(usize::from(at)).copied().unwrap_or(0);
            at = at.wrapping_add(1);
        }
        file.pointer = at;
        Ok(())
    }

    fn set_frequency(&mut self, _hz: u32) -> Result<(), Self::Error> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Delay
// ---------------------------------------------------------------------------

/// Delay that only yields to the executor, so bounded polls run instantly.
#[derive(Debug, Clone, Copy, Default)]
pub struct YieldDelay;

impl DelayNs for YieldDelay {
    async fn delay_ns(&mut self, _ns: u32) {
        embassy_futures::yield_now().await;
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Mock storage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryStorageError {
    /// No file with that name
    NotFound,
}

/// In-memory file system of named byte blobs.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    files: Vec<(String, Arc<Vec<u8>>)>,
    opens: Arc<Mutex<Vec<String>>>,
}

impl MemoryStorage {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file.
    #[must_use]
    pub fn with_file(mut self, name: &str, contents: Vec<u8>) -> Self {
        self.files.push((name.to_owned(), Arc::new(contents)));
        self
    }

    /// Every name passed to `open_file`, in order.
    pub fn opened(&self) -> Vec<String> {
        locked(&self.opens).clone()
    }
}

/// File handed out by [`MemoryStorage`].
pub struct MemoryFile {
    data: Arc<Vec<u8>>,
    pos: usize,
}

impl File for MemoryFile {
    type Error = MemoryStorageError;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let rest = self.data.get(self.pos..).unwrap_or(&[]);
        let n = rest.len().min(buf.len());
        if let (Some(dst), Some(src)) = (buf.get_mut(..n), rest.get(..n)) {
            dst.copy_from_slice(src);
        }
        self.pos = self.pos.saturating_add(n);
        Ok(n)
    }

    async fn seek(&mut self, pos: u64) -> Result<u64, Self::Error> {
        self.pos = usize::try_from(pos).unwrap_or(usize::MAX).min(self.data.len());
        Ok(self.pos as u64)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

impl Storage for MemoryStorage {
    type Error = MemoryStorageError;
    type File = MemoryFile;

    async fn open_file(&mut self, path: &str) -> Result<Self::File, Self::Error> {
        locked(&self.opens).push(path.to_owned());
        self.files
            .iter()
            .find(|(name, _)| name == path)
            .map(|(_, data)| MemoryFile {
                data: Arc::clone(data),
                pos: 0,
            })
            .ok_or(MemoryStorageError::NotFound)
    }

    async fn exists(&mut self, path: &str) -> Result<bool, Self::Error> {
        Ok(self.files.iter().any(|(name, _)| name == path))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_selects_count_as_contention() {
        let trace = BusTrace::new();
        let mut a = MockPin::chip_select("a", &trace);
        let mut b = MockPin::chip_select("b", &trace);
        a.set_low().unwrap();
        a.set_high().unwrap();
        b.set_low().unwrap();
        assert_eq!(trace.contention(), 0);
        a.set_low().unwrap();
        assert_eq!(trace.contention(), 1);
        assert_eq!(trace.selected(), ["b", "a"]);
    }

    #[tokio::test]
    async fn writes_are_attributed_to_active_select() {
        let trace = BusTrace::new();
        let mut spi = MockSpi::new(&trace);
        let mut cs = MockPin::chip_select("dev", &trace);
        spi.write(&[1, 2]).await.unwrap();
        cs.set_low().unwrap();
        spi.write(&[3, 4]).await.unwrap();
        cs.set_high().unwrap();
        assert_eq!(trace.bytes_sent_to("dev"), [3, 4]);
    }

    #[tokio::test]
    async fn scripted_bytes_come_back_before_responder() {
        let trace = BusTrace::new();
        let mut spi = MockSpi::new(&trace);
        trace.script_response(&[0x12, 0x34]);
        let mut buf = [0u8; 3];
        spi.transfer_in_place(&mut buf).await.unwrap();
        assert_eq!(buf, [0x12, 0x34, 0xFF]);
    }

    #[tokio::test]
    async fn injected_failure_hits_one_transfer() {
        let trace = BusTrace::new();
        let mut spi = MockSpi::new(&trace);
        trace.fail_next_transfer();
        assert_eq!(spi.write(&[0]).await, Err(MockSpiError));
        assert!(spi.write(&[0]).await.is_ok());
    }

    #[test]
    fn injected_failure_hits_clock_change() {
        let trace = BusTrace::new();
        let mut spi = MockSpi::new(&trace);
        trace.fail_next_transfer();
        assert_eq!(spi.set_frequency(1_000_000), Err(MockSpiError));
        assert!(trace.clocks().is_empty());
        assert_eq!(spi.set_frequency(1_000_000), Ok(()));
        assert_eq!(trace.clocks(), vec![1_000_000]);
    }

    #[test]
    fn ready_line_recovers_after_busy_polls() {
        let mut line = ReadyLine::new();
        line.busy_for(2);
        assert!(!line.is_high().unwrap());
        assert!(!line.is_high().unwrap());
        assert!(line.is_high().unwrap());
        assert_eq!(line.polls(), 3);
    }

    #[tokio::test]
    async fn i2c_register_file_reads_from_pointer() {
        let mut i2c = MockI2c::ft6206();
        let mut id = [0u8; 1];
        i2c.write_read(0x38, &[0xA8], &mut id).await.unwrap();
        assert_eq!(id, [0x11]);
        assert_eq!(i2c.write_read(0x39, &[0xA8], &mut id).await, Err(MockI2cError));
    }

    #[tokio::test]
    async fn memory_file_reads_then_hits_eof() {
        let mut storage = MemoryStorage::new().with_file("t.mp3", vec![7; 10]);
        let mut file = storage.open_file("t.mp3").await.unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(file.read(&mut buf).await.unwrap(), 8);
        assert_eq!(file.read(&mut buf).await.unwrap(), 2);
        assert_eq!(file.read(&mut buf).await.unwrap(), 0);
        file.seek(0).await.unwrap();
        assert_eq!(file.read(&mut buf).await.unwrap(), 8);
        assert_eq!(storage.opened(), ["t.mp3"]);
    }
}
