//! Host-side test doubles for the hardware traits
//!
//! Most doubles are cheap handles over shared state so a test can keep one
//! copy for inspection while the controller owns another.

extern crate std;

use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::string::String;
use std::vec::Vec;

use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_hal::spi::{ErrorType as SpiErrorType, Operation, SpiDevice};
use embedded_hal_async::delay::DelayNs;
use hal_abstractions::{FileStore, Monotonic, PowerControl, Rtc, Timestamp};

use crate::fault::Fault;
use crate::record::Measurement;
use crate::sensor::SensorReader;

/// Virtual time base; delays advance it instantly
#[derive(Debug, Clone, Default)]
pub struct FakeTimer {
    ns: Rc<Cell<u64>>,
}

impl FakeTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_ms(&self, ms: u64) {
        self.ns.set(self.ns.get() + ms * 1_000_000);
    }
}

impl Monotonic for FakeTimer {
    fn now_ms(&self) -> u64 {
        self.ns.get() / 1_000_000
    }
}

impl DelayNs for FakeTimer {
    async fn delay_ns(&mut self, ns: u32) {
        self.ns.set(self.ns.get() + ns as u64);
    }
}

#[derive(Debug, Default)]
struct SerialState {
    rx: VecDeque<u8>,
    scheduled: Vec<(u64, Vec<u8>)>,
    tx: Vec<u8>,
    /// Every write with the time it happened; never cleared
    write_log: Vec<(u64, Vec<u8>)>,
    reply: Option<(u64, Vec<u8>)>,
    clock: Option<FakeTimer>,
}

impl SerialState {
    fn now_ms(&self) -> u64 {
        self.clock.as_ref().map_or(0, |c| c.now_ms())
    }

    fn release_due(&mut self) {
        let now = self.now_ms();
        let mut i = 0;
        while i < self.scheduled.len() {
            if self.scheduled[i].0 <= now {
                let (_, bytes) = self.scheduled.remove(i);
                self.rx.extend(bytes);
            } else {
                i += 1;
            }
        }
    }
}

/// In-memory serial port with timed input and captured output
#[derive(Debug, Clone, Default)]
pub struct MemSerial {
    state: Rc<RefCell<SerialState>>,
}

impl MemSerial {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timed input is released against this clock
    pub fn attach_clock(&self, timer: &FakeTimer) {
        self.state.borrow_mut().clock = Some(timer.clone());
    }

    /// Make bytes available immediately
    pub fn feed(&self, bytes: &[u8]) {
        self.state.borrow_mut().rx.extend(bytes.iter().copied());
    }

    /// Make bytes available once the attached clock reaches `at_ms`
    pub fn feed_at(&self, at_ms: u64, bytes: &[u8]) {
        self.state
            .borrow_mut()
            .scheduled
            .push((at_ms, bytes.to_vec()));
    }

    /// Queue `bytes` to arrive `delay_ms` after the next flush
    pub fn reply_after_flush(&self, delay_ms: u64, bytes: &[u8]) {
        self.state.borrow_mut().reply = Some((delay_ms, bytes.to_vec()));
    }

    /// Bytes not yet consumed by the reader
    pub fn pending(&self) -> usize {
        let mut state = self.state.borrow_mut();
        state.release_due();
        state.rx.len()
    }

    pub fn written(&self) -> Vec<u8> {
        self.state.borrow().tx.clone()
    }

    /// Time of the first write of exactly `bytes`
    pub fn written_at(&self, bytes: &[u8]) -> Option<u64> {
        self.state
            .borrow()
            .write_log
            .iter()
            .find(|(_, written)| written == bytes)
            .map(|(at, _)| *at)
    }

    /// Output split into CRLF-terminated lines, then cleared
    pub fn take_lines(&self) -> Vec<String> {
        let tx = core::mem::take(&mut self.state.borrow_mut().tx);
        String::from_utf8(tx)
            .unwrap()
            .split_terminator("\r\n")
            .map(String::from)
            .collect()
    }
}

impl embedded_io_async::ErrorType for MemSerial {
    type Error = Infallible;
}

impl embedded_io_async::Read for MemSerial {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut state = self.state.borrow_mut();
        state.release_due();
        let n = buf.len().min(state.rx.len());
        for (slot, byte) in buf.iter_mut().zip(state.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl embedded_io_async::ReadReady for MemSerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        let mut state = self.state.borrow_mut();
        state.release_due();
        Ok(!state.rx.is_empty())
    }
}

impl embedded_io_async::Write for MemSerial {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut state = self.state.borrow_mut();
        let now = state.now_ms();
        state.tx.extend_from_slice(buf);
        state.write_log.push((now, buf.to_vec()));
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        if let Some((delay, bytes)) = state.reply.take() {
            let at = state.now_ms() + delay;
            state.scheduled.push((at, bytes));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeFailure;

#[derive(Debug, Default)]
struct RtcState {
    time: Option<Timestamp>,
    fail_begin: bool,
    fail_now: bool,
    fail_adjust: bool,
    adjustments: usize,
}

/// Clock that holds whatever it was last set to
#[derive(Debug, Clone, Default)]
pub struct FakeRtc {
    state: Rc<RefCell<RtcState>>,
}

impl FakeRtc {
    pub fn at(time: Timestamp) -> Self {
        let rtc = Self::default();
        rtc.state.borrow_mut().time = Some(time);
        rtc
    }

    pub fn time(&self) -> Option<Timestamp> {
        self.state.borrow().time
    }

    pub fn adjustments(&self) -> usize {
        self.state.borrow().adjustments
    }

    pub fn fail_begin(&self, fail: bool) {
        self.state.borrow_mut().fail_begin = fail;
    }

    pub fn fail_now(&self, fail: bool) {
        self.state.borrow_mut().fail_now = fail;
    }

    pub fn fail_adjust(&self, fail: bool) {
        self.state.borrow_mut().fail_adjust = fail;
    }
}

impl Rtc for FakeRtc {
    type Error = FakeFailure;

    fn begin(&mut self) -> Result<(), Self::Error> {
        if self.state.borrow().fail_begin {
            return Err(FakeFailure);
        }
        Ok(())
    }

    fn now(&mut self) -> Result<Timestamp, Self::Error> {
        let state = self.state.borrow();
        if state.fail_now {
            return Err(FakeFailure);
        }
        state.time.ok_or(FakeFailure)
    }

    fn adjust(&mut self, timestamp: Timestamp) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        if state.fail_adjust {
            return Err(FakeFailure);
        }
        state.time = Some(timestamp);
        state.adjustments += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct StoreState {
    files: BTreeMap<String, Vec<u8>>,
    stamps: Vec<Timestamp>,
    fail_mount: bool,
    fail_append: bool,
}

/// Files kept in memory
#[derive(Debug, Clone, Default)]
pub struct MemStore {
    state: Rc<RefCell<StoreState>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self, name: &str) -> Option<String> {
        self.state
            .borrow()
            .files
            .get(name)
            .map(|bytes| String::from_utf8(bytes.clone()).unwrap())
    }

    pub fn file_count(&self) -> usize {
        self.state.borrow().files.len()
    }

    /// Directory-entry stamps passed with each append, in order
    pub fn stamps(&self) -> Vec<Timestamp> {
        self.state.borrow().stamps.clone()
    }

    pub fn fail_mount(&self, fail: bool) {
        self.state.borrow_mut().fail_mount = fail;
    }

    pub fn fail_append(&self, fail: bool) {
        self.state.borrow_mut().fail_append = fail;
    }
}

impl FileStore for MemStore {
    type Error = FakeFailure;

    fn mount(&mut self) -> Result<(), Self::Error> {
        if self.state.borrow().fail_mount {
            return Err(FakeFailure);
        }
        Ok(())
    }

    fn file_len(&mut self, name: &str) -> Result<Option<u32>, Self::Error> {
        Ok(self
            .state
            .borrow()
            .files
            .get(name)
            .map(|bytes| bytes.len() as u32))
    }

    fn append(&mut self, name: &str, data: &[u8], stamp: Timestamp) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        if state.fail_append {
            return Err(FakeFailure);
        }
        state
            .files
            .entry(String::from(name))
            .or_default()
            .extend_from_slice(data);
        state.stamps.push(stamp);
        Ok(())
    }
}

/// Output pin that remembers every level it was driven to
#[derive(Debug, Clone, Default)]
pub struct RecordingPin {
    levels: Rc<RefCell<Vec<bool>>>,
}

impl RecordingPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_high(&self) -> bool {
        self.levels.borrow().last().copied().unwrap_or(false)
    }

    pub fn levels(&self) -> Vec<bool> {
        self.levels.borrow().clone()
    }
}

impl PinErrorType for RecordingPin {
    type Error = Infallible;
}

impl OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.levels.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.levels.borrow_mut().push(true);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SpiState {
    regs: [u8; 8],
    conversion: u16,
    pending_fault: u8,
    pointer: u8,
    writes: Vec<(u8, u8)>,
}

/// Register-level MAX31865 model
///
/// A one-shot request latches `conversion` into the RTD registers and any
/// injected fault into the status register. Setting the fault-clear bit
/// clears the status register.
#[derive(Debug, Clone, Default)]
pub struct FakeSpi {
    state: Rc<RefCell<SpiState>>,
}

impl FakeSpi {
    pub fn new() -> Self {
        Self::default()
    }

    /// 15-bit ratio reported by the next conversions
    pub fn set_conversion(&self, raw: u16) {
        self.state.borrow_mut().conversion = raw;
    }

    /// Fault bits reported by the next conversion only
    pub fn inject_fault(&self, bits: u8) {
        self.state.borrow_mut().pending_fault = bits;
    }

    pub fn reg(&self, addr: u8) -> u8 {
        self.state.borrow().regs[addr as usize]
    }

    /// Every `(register, value)` write in order
    pub fn writes(&self) -> Vec<(u8, u8)> {
        self.state.borrow().writes.clone()
    }

    fn write_reg(state: &mut SpiState, addr: u8, value: u8) {
        state.writes.push((addr, value));
        if addr == 0 {
            if value & 0x02 != 0 {
                state.regs[7] = 0;
            }
            if value & 0x20 != 0 {
                let fault = core::mem::take(&mut state.pending_fault);
                let bits = (state.conversion << 1) | u16::from(fault != 0);
                state.regs[1] = (bits >> 8) as u8;
                state.regs[2] = bits as u8;
                state.regs[7] = fault;
            }
            // One-shot and fault-clear bits self-clear
            state.regs[0] = value & !0x22;
        } else {
            state.regs[addr as usize] = value;
        }
    }
}

impl SpiErrorType for FakeSpi {
    type Error = Infallible;
}

impl SpiDevice for FakeSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        let mut writing: Option<u8> = None;
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    let mut bytes = bytes.iter().copied();
                    if writing.is_none() {
                        if let Some(addr) = bytes.next() {
                            if addr & 0x80 != 0 {
                                writing = Some(addr & 0x7F);
                            } else {
                                state.pointer = addr & 0x7F;
                            }
                        }
                    }
                    for value in bytes {
                        let addr = writing.unwrap();
                        Self::write_reg(&mut state, addr, value);
                        writing = Some(addr + 1);
                    }
                }
                Operation::Read(buf) => {
                    for slot in buf.iter_mut() {
                        *slot = state.regs[(state.pointer & 0x07) as usize];
                        state.pointer += 1;
                    }
                }
                Operation::DelayNs(_) => {}
                _ => unimplemented!("fake SPI supports write and read only"),
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerEvent {
    EnableSerial,
    Quiesce,
    Idle,
}

/// Power hooks that record calls and advance virtual time while idling
#[derive(Debug, Clone)]
pub struct FakePower {
    events: Rc<RefCell<Vec<PowerEvent>>>,
    timer: FakeTimer,
    step_ms: u32,
}

impl FakePower {
    pub fn new(timer: &FakeTimer, step_ms: u32) -> Self {
        Self {
            events: Rc::default(),
            timer: timer.clone(),
            step_ms,
        }
    }

    pub fn events(&self) -> Vec<PowerEvent> {
        self.events.borrow().clone()
    }
}

impl PowerControl for FakePower {
    fn enable_serial(&mut self) {
        self.events.borrow_mut().push(PowerEvent::EnableSerial);
    }

    fn quiesce(&mut self) {
        self.events.borrow_mut().push(PowerEvent::Quiesce);
    }

    async fn idle_step(&mut self) -> u32 {
        self.events.borrow_mut().push(PowerEvent::Idle);
        self.timer.advance_ms(self.step_ms as u64);
        self.step_ms
    }
}

/// Sensor replaying a script, then a steady reading
#[derive(Debug, Default)]
pub struct ScriptedSensor {
    script: VecDeque<(Measurement, Fault)>,
}

impl ScriptedSensor {
    pub fn steady() -> Self {
        Self::default()
    }

    pub fn then(mut self, measurement: Measurement, fault: Fault) -> Self {
        self.script.push_back((measurement, fault));
        self
    }
}

/// Reading returned once the script runs out
pub const STEADY_CELSIUS: f32 = 21.5;

impl SensorReader for ScriptedSensor {
    async fn read(&mut self) -> (Measurement, Fault) {
        self.script
            .pop_front()
            .unwrap_or((Measurement::Temperature(STEADY_CELSIUS), Fault::None))
    }
}
