//! Serial clock synchronization
//!
//! ```text
//! host:   SYNC_TIME:2025,09,05,14,30,22\n
//! logger: TIME_SYNCED:OK\r\n
//!         RTC: 2025-09-05T14:30:22Z\r\n
//! ```
//!
//! Lines without the `SYNC_TIME:` prefix are ignored silently. A malformed
//! body answers `TIME_SYNCED:ERR_FMT`, an out-of-range field answers
//! `TIME_SYNCED:ERR_RANGE`, and in both cases the clock is left alone.

use core::fmt::Write as _;

use hal_abstractions::{RangeError, Rtc, Timestamp};
use heapless::Vec;

use crate::buffer::LineBuf;
use crate::config::SyncConfig;
use crate::console::{self, Diagnostic};
use crate::deadline::{wait_readable, Deadline};
use crate::fault::Fault;
use crate::fmt::Debug2Format;
use crate::{SerialPort, Timer};

/// Literal token that starts a sync command
pub const SYNC_PREFIX: &[u8] = b"SYNC_TIME:";

/// Longest accepted inbound line; extra bytes are discarded
pub const SYNC_LINE_CAPACITY: usize = 64;

const REPLY_OK: &[u8] = b"TIME_SYNCED:OK";
const REPLY_ERR_FMT: &[u8] = b"TIME_SYNCED:ERR_FMT";
const REPLY_ERR_RANGE: &[u8] = b"TIME_SYNCED:ERR_RANGE";

/// One inbound line, terminator stripped
pub type SyncLine = Vec<u8, SYNC_LINE_CAPACITY>;

/// Six integers parsed from a command body, not yet range checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SyncCommand {
    fields: [i32; 6],
}

impl SyncCommand {
    /// Parse `YYYY,MM,DD,HH,MM,SS`
    ///
    /// Fields may carry surrounding ASCII whitespace. Anything other than
    /// exactly six integers yields `None`.
    pub fn parse(body: &[u8]) -> Option<Self> {
        let body = core::str::from_utf8(body).ok()?;
        let mut fields = [0i32; 6];
        let mut parts = body.split(',');
        for field in fields.iter_mut() {
            *field = parts.next()?.trim_ascii().parse().ok()?;
        }
        if parts.next().is_some() {
            return None;
        }
        Some(Self { fields })
    }

    /// Check every field against the calendar ranges
    pub fn validate(&self) -> Result<Timestamp, RangeError> {
        let [year, month, day, hour, minute, second] = self.fields;
        Timestamp::new(
            u16::try_from(year).map_err(|_| RangeError::Year)?,
            u8::try_from(month).map_err(|_| RangeError::Month)?,
            u8::try_from(day).map_err(|_| RangeError::Day)?,
            u8::try_from(hour).map_err(|_| RangeError::Hour)?,
            u8::try_from(minute).map_err(|_| RangeError::Minute)?,
            u8::try_from(second).map_err(|_| RangeError::Second)?,
        )
    }
}

/// Result of handling one inbound line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncOutcome {
    /// Not a sync command
    Ignored,
    /// Clock set to this value
    Accepted(Timestamp),
    RejectedFormat,
    RejectedRange(RangeError),
}

impl SyncOutcome {
    pub fn fault(&self) -> Fault {
        match self {
            Self::Ignored | Self::Accepted(_) => Fault::None,
            Self::RejectedFormat => Fault::SyncFormatError,
            Self::RejectedRange(_) => Fault::SyncRangeError,
        }
    }
}

/// Classify a line without touching the clock
///
/// `Accepted` here means the command is valid and may be committed.
pub fn interpret(line: &[u8]) -> SyncOutcome {
    let Some(body) = line.strip_prefix(SYNC_PREFIX) else {
        return SyncOutcome::Ignored;
    };
    match SyncCommand::parse(body) {
        None => SyncOutcome::RejectedFormat,
        Some(command) => match command.validate() {
            Ok(timestamp) => SyncOutcome::Accepted(timestamp),
            Err(e) => SyncOutcome::RejectedRange(e),
        },
    }
}

/// Sync command responder bound to the serial console
pub struct SyncProtocol {
    config: SyncConfig,
}

impl SyncProtocol {
    pub const fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    /// Listen for up to `window_ms` and handle at most one line
    ///
    /// Returns `None` when no input arrived or the clock rejected the write.
    pub async fn poll<T, P, R>(
        &self,
        timer: &mut T,
        port: &mut P,
        rtc: &mut R,
        window_ms: u32,
    ) -> Option<SyncOutcome>
    where
        T: Timer,
        P: SerialPort,
        R: Rtc,
    {
        let window = Deadline::after(timer, window_ms);
        if !wait_readable(timer, port, window).await {
            return None;
        }

        let line = self.read_line(timer, port).await;
        match self.respond(&line, rtc, port).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("RTC adjust failed: {:?}", Debug2Format(&e));
                None
            }
        }
    }

    /// Read one line, then discard whatever else is buffered
    ///
    /// Stops at `\n`, or when the line timeout expires with no further
    /// input. Bytes past [`SYNC_LINE_CAPACITY`] are dropped.
    pub async fn read_line<T, P>(&self, timer: &mut T, port: &mut P) -> SyncLine
    where
        T: Timer,
        P: SerialPort,
    {
        let deadline = Deadline::after(timer, self.config.line_timeout_ms);
        let mut line = SyncLine::new();
        let mut chunk = [0u8; 16];

        'line: while wait_readable(timer, port, deadline).await {
            let n = match port.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    warn!("serial read failed: {:?}", Debug2Format(&e));
                    break;
                }
            };
            for &byte in &chunk[..n] {
                if byte == b'\n' {
                    break 'line;
                }
                // Overflow policy: keep the first SYNC_LINE_CAPACITY bytes
                let _ = line.push(byte);
            }
            if deadline.has_passed(timer) {
                debug!("sync line timed out after {} bytes", line.len());
                break;
            }
        }

        if line.last() == Some(&b'\r') {
            line.pop();
        }
        drain(port).await;
        line
    }

    /// Act on one line and write the protocol response to `out`
    ///
    /// The clock is written only for a valid command. If the write fails,
    /// `RTC FAIL` is emitted instead of a status line.
    pub async fn respond<R, W>(
        &self,
        line: &[u8],
        rtc: &mut R,
        out: &mut W,
    ) -> Result<SyncOutcome, R::Error>
    where
        R: Rtc,
        W: embedded_io_async::Write,
    {
        let outcome = interpret(line);
        match outcome {
            SyncOutcome::Ignored => debug!("non-sync line ignored"),
            SyncOutcome::RejectedFormat => {
                warn!("sync command malformed");
                console::send_line(out, REPLY_ERR_FMT).await;
            }
            SyncOutcome::RejectedRange(e) => {
                warn!("sync command rejected: {}", e);
                console::send_line(out, REPLY_ERR_RANGE).await;
            }
            SyncOutcome::Accepted(timestamp) => {
                if let Err(e) = rtc.adjust(timestamp) {
                    console::diagnose(out, Diagnostic::RtcFail).await;
                    return Err(e);
                }
                info!("Clock set to {}", timestamp);
                console::send_line(out, REPLY_OK).await;
                confirm(rtc, out).await;
            }
        }
        Ok(outcome)
    }
}

/// Echo the clock as read back after a successful adjust
async fn confirm<R: Rtc, W: embedded_io_async::Write>(rtc: &mut R, out: &mut W) {
    match rtc.now() {
        Ok(now) => {
            let mut echo = LineBuf::<32>::new();
            // "RTC: " plus a 20-byte timestamp always fits
            let _ = write!(echo, "RTC: {}", now);
            console::send_line(out, echo.as_bytes()).await;
        }
        Err(e) => {
            warn!("clock read-back failed: {:?}", Debug2Format(&e));
            console::diagnose(out, Diagnostic::RtcFail).await;
        }
    }
}

async fn drain<P: SerialPort>(port: &mut P) {
    let mut scratch = [0u8; 16];
    while port.read_ready().unwrap_or(false) {
        match port.read(&mut scratch).await {
            Ok(n) if n > 0 => {}
            _ => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{FakeRtc, FakeTimer, MemSerial};
    use embassy_futures::block_on;
    use hal_abstractions::Monotonic;

    fn boot_time() -> Timestamp {
        Timestamp::new(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn run(line: &[u8]) -> (SyncOutcome, FakeRtc, MemSerial) {
        let protocol = SyncProtocol::new(SyncConfig::default());
        let rtc = FakeRtc::at(boot_time());
        let out = MemSerial::new();
        let outcome = block_on(protocol.respond(line, &mut rtc.clone(), &mut out.clone())).unwrap();
        (outcome, rtc, out)
    }

    #[test]
    fn test_parse_six_fields() {
        let cmd = SyncCommand::parse(b"2025,9,5,14,30,22").unwrap();
        assert_eq!(cmd.validate(), Timestamp::new(2025, 9, 5, 14, 30, 22));
        let padded = SyncCommand::parse(b" 2025, 09 ,05,14,30, 22 ").unwrap();
        assert_eq!(padded, cmd);
    }

    #[test]
    fn test_parse_rejects_bad_bodies() {
        assert_eq!(SyncCommand::parse(b"2025,9,5,14,30"), None);
        assert_eq!(SyncCommand::parse(b"2025,9,5,14,30,22,1"), None);
        assert_eq!(SyncCommand::parse(b"2025,9,5,14,3O,22"), None);
        assert_eq!(SyncCommand::parse(b"2025,9,5,,30,22"), None);
        assert_eq!(SyncCommand::parse(b""), None);
        assert_eq!(SyncCommand::parse(&[0xFF, b',']), None);
    }

    #[test]
    fn test_validate_reports_field() {
        let cmd = SyncCommand::parse(b"2025,9,5,14,30,-1").unwrap();
        assert_eq!(cmd.validate(), Err(RangeError::Second));
        let cmd = SyncCommand::parse(b"70000,1,1,0,0,0").unwrap();
        assert_eq!(cmd.validate(), Err(RangeError::Year));
    }

    #[test]
    fn test_in_range_command_sets_clock() {
        let (outcome, rtc, out) = run(b"SYNC_TIME:2025,09,05,14,30,22");
        let expected = Timestamp::new(2025, 9, 5, 14, 30, 22).unwrap();
        assert_eq!(outcome, SyncOutcome::Accepted(expected));
        assert_eq!(rtc.time(), Some(expected));
        assert_eq!(
            out.take_lines(),
            ["TIME_SYNCED:OK", "RTC: 2025-09-05T14:30:22Z"]
        );
    }

    #[test]
    fn test_missing_prefix_ignored() {
        for line in [&b"2025,09,05,14,30,22"[..], b"sync_time:2025,9,5,1,1,1", b"", b"HELLO"] {
            let (outcome, rtc, out) = run(line);
            assert_eq!(outcome, SyncOutcome::Ignored);
            assert_eq!(rtc.time(), Some(boot_time()));
            assert!(out.written().is_empty());
        }
    }

    #[test]
    fn test_malformed_body() {
        for line in [&b"SYNC_TIME:2025,09,05"[..], b"SYNC_TIME:a,b,c,d,e,f", b"SYNC_TIME:"] {
            let (outcome, rtc, out) = run(line);
            assert_eq!(outcome, SyncOutcome::RejectedFormat);
            assert_eq!(outcome.fault(), Fault::SyncFormatError);
            assert_eq!(rtc.adjustments(), 0);
            assert_eq!(out.take_lines(), ["TIME_SYNCED:ERR_FMT"]);
        }
    }

    #[test]
    fn test_out_of_range_fields() {
        for line in [
            &b"SYNC_TIME:2025,13,05,14,30,22"[..],
            b"SYNC_TIME:2025,09,05,24,30,22",
            b"SYNC_TIME:1999,09,05,14,30,22",
        ] {
            let (outcome, rtc, out) = run(line);
            assert_eq!(outcome.fault(), Fault::SyncRangeError);
            assert_eq!(rtc.time(), Some(boot_time()));
            assert_eq!(out.take_lines(), ["TIME_SYNCED:ERR_RANGE"]);
        }
    }

    #[test]
    fn test_adjust_failure_reports_rtc_fail() {
        let protocol = SyncProtocol::new(SyncConfig::default());
        let rtc = FakeRtc::at(boot_time());
        rtc.fail_adjust(true);
        let out = MemSerial::new();
        let result = block_on(protocol.respond(
            b"SYNC_TIME:2025,09,05,14,30,22",
            &mut rtc.clone(),
            &mut out.clone(),
        ));
        assert!(result.is_err());
        assert_eq!(out.take_lines(), ["RTC FAIL"]);
    }

    #[test]
    fn test_read_line_strips_cr_and_drains() {
        let protocol = SyncProtocol::new(SyncConfig::default());
        let mut timer = FakeTimer::new();
        let mut port = MemSerial::new();
        port.feed(b"SYNC_TIME:2025,09,05,14,30,22\r\nSYNC_TIME:2000,1");

        let line = block_on(protocol.read_line(&mut timer, &mut port));
        assert_eq!(&line[..], b"SYNC_TIME:2025,09,05,14,30,22");
        assert_eq!(port.pending(), 0);
    }

    #[test]
    fn test_read_line_truncates_long_input() {
        let protocol = SyncProtocol::new(SyncConfig::default());
        let mut timer = FakeTimer::new();
        let mut port = MemSerial::new();
        port.feed(&[b'A'; 100]);
        port.feed(b"\n");

        let line = block_on(protocol.read_line(&mut timer, &mut port));
        assert_eq!(line.len(), SYNC_LINE_CAPACITY);
    }

    #[test]
    fn test_read_line_times_out_on_partial_input() {
        let protocol = SyncProtocol::new(SyncConfig { line_timeout_ms: 200 });
        let mut timer = FakeTimer::new();
        let mut port = MemSerial::new();
        port.attach_clock(&timer);
        port.feed(b"SYNC_TI");
        port.feed_at(500, b"ME:2025,1,1,0,0,0\n");

        let line = block_on(protocol.read_line(&mut timer, &mut port));
        assert_eq!(&line[..], b"SYNC_TI");
        assert_eq!(timer.now_ms(), 200);
    }

    #[test]
    fn test_poll_handles_line_arriving_in_window() {
        let protocol = SyncProtocol::new(SyncConfig::default());
        let mut timer = FakeTimer::new();
        let port = MemSerial::new();
        port.attach_clock(&timer);
        port.feed_at(30, b"SYNC_TIME:2030,06,15,08,00,00\n");
        let rtc = FakeRtc::at(boot_time());

        let outcome = block_on(protocol.poll(&mut timer, &mut port.clone(), &mut rtc.clone(), 50));
        let expected = Timestamp::new(2030, 6, 15, 8, 0, 0).unwrap();
        assert_eq!(outcome, Some(SyncOutcome::Accepted(expected)));
        assert_eq!(rtc.time(), Some(expected));
        assert!(timer.now_ms() < 50);
    }

    #[test]
    fn test_poll_window_expires() {
        let protocol = SyncProtocol::new(SyncConfig::default());
        let mut timer = FakeTimer::new();
        let port = MemSerial::new();
        port.attach_clock(&timer);
        port.feed_at(80, b"SYNC_TIME:2030,06,15,08,00,00\n");
        let rtc = FakeRtc::at(boot_time());

        let outcome = block_on(protocol.poll(&mut timer, &mut port.clone(), &mut rtc.clone(), 50));
        assert_eq!(outcome, None);
        assert_eq!(rtc.adjustments(), 0);
        assert_eq!(timer.now_ms(), 50);
    }
}
