//! The logging control loop
//!
//! ```text
//! boot:  Rtc::begin ─▶ Rtc::now ─▶ mount ─▶ Session ─▶ ensure_header ─▶ READY
//!
//! cycle: wake ─▶ WAKE_UP ─▶ sync window ─▶ now + sensor.read ─▶ append ─▶ echo ─▶ rest
//!          ▲                                                                      │
//!          └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A policy that keeps the console up during the rest hands control back
//! whenever input arrives; the line is answered on the spot and the rest
//! picks up where it left off, so the host never waits a whole interval.
//!
//! Any boot step failing is fatal. Within a cycle nothing is: a sensor fault
//! logs the sentinel, a storage fault drops the row, a sync error only
//! produces its protocol response.

use core::fmt::Write as _;

use embedded_hal::digital::OutputPin;
use hal_abstractions::{FileStore, Rtc, Timestamp};

use crate::buffer::LineBuf;
use crate::config::LoggerConfig;
use crate::console::{self, Diagnostic};
use crate::fault::{BootError, Fault};
use crate::fmt::Debug2Format;
use crate::indicator::StatusIndicator;
use crate::record::{RowBuf, SampleRecord};
use crate::schedule::{Mode, Rest, SchedulingPolicy};
use crate::sensor::SensorReader;
use crate::session::Session;
use crate::storage::CsvLog;
use crate::sync::{SyncOutcome, SyncProtocol};
use crate::{SerialPort, Timer};

/// Sync outcomes kept per cycle for the report; later ones are still handled
pub const REST_SYNC_CAPACITY: usize = 4;

/// Collaborators handed to [`Controller::boot`]
pub struct LoggerParts<R, S, F, U, L, P, T> {
    pub rtc: R,
    pub sensor: S,
    pub store: F,
    pub console: U,
    pub led: L,
    pub policy: P,
    pub timer: T,
}

/// What happened during one cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Line handled in the sync window
    pub sync: Option<SyncOutcome>,
    /// Lines handled while resting, in arrival order
    pub rest_sync: heapless::Vec<SyncOutcome, REST_SYNC_CAPACITY>,
    pub record: SampleRecord,
    pub sensor: Fault,
    pub storage: Fault,
    pub waited_ms: u32,
}

/// Owns the session and every collaborator; runs one cycle at a time
pub struct Controller<R, S, F, U, L, P, T> {
    rtc: R,
    sensor: S,
    log: CsvLog<F>,
    console: U,
    indicator: StatusIndicator<L>,
    policy: P,
    timer: T,
    sync: SyncProtocol,
    session: Session,
    config: LoggerConfig,
    last_timestamp: Timestamp,
}

impl<R, S, F, U, L, P, T> Controller<R, S, F, U, L, P, T>
where
    R: Rtc,
    S: SensorReader,
    F: FileStore,
    U: SerialPort,
    L: OutputPin,
    P: SchedulingPolicy,
    T: Timer,
{
    /// Bring up the clock and storage and open the session file
    ///
    /// Emits `RTC FAIL`, `SD FAIL` or `FILE ERR` on the console and returns
    /// the matching [`BootError`] if a step fails; `READY` otherwise. A
    /// device ID that would not fit a row is refused before anything else.
    pub async fn boot(
        parts: LoggerParts<R, S, F, U, L, P, T>,
        config: LoggerConfig,
    ) -> Result<Self, BootError> {
        let LoggerParts {
            mut rtc,
            sensor,
            store,
            mut console,
            led,
            policy,
            timer,
        } = parts;

        if !config.device_id_fits() {
            error!("Device ID {:?} does not fit a CSV row", config.device_id);
            return Err(BootError::DeviceId);
        }

        let started = match rtc.begin().and_then(|()| rtc.now()) {
            Ok(now) => now,
            Err(e) => {
                error!("RTC unreachable: {:?}", Debug2Format(&e));
                console::diagnose(&mut console, Diagnostic::RtcFail).await;
                return Err(BootError::Clock);
            }
        };

        let mut log = CsvLog::new(store, config.header, config.device_id);
        if let Err(e) = log.mount() {
            error!("Storage mount failed: {:?}", Debug2Format(&e));
            console::diagnose(&mut console, Diagnostic::SdFail).await;
            return Err(BootError::Storage);
        }

        let session = Session::from_boot(started);
        if let Err(e) = log.ensure_header(&session) {
            error!("Cannot create {}: {:?}", session.file_name(), Debug2Format(&e));
            console::diagnose(&mut console, Diagnostic::FileErr).await;
            return Err(BootError::SessionFile);
        }

        info!(
            "Logging to {} every {} ms ({})",
            session.file_name(),
            config.interval_ms,
            policy.mode()
        );
        console::diagnose(&mut console, Diagnostic::Ready).await;

        Ok(Self {
            rtc,
            sensor,
            log,
            console,
            indicator: StatusIndicator::new(led, config.pulse_ms),
            policy,
            timer,
            sync: SyncProtocol::new(config.sync),
            session,
            config,
            last_timestamp: started,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Cycle forever
    pub async fn run(&mut self) -> ! {
        loop {
            let report = self.cycle().await;
            debug!(
                "cycle done: sensor={} storage={} waited={}ms",
                report.sensor, report.storage, report.waited_ms
            );
        }
    }

    /// Sync window, sample, persist, report, wait
    ///
    /// Lines that interrupt the wait are answered before it resumes.
    pub async fn cycle(&mut self) -> CycleReport {
        let started_ms = self.timer.now_ms();

        self.policy.wake();
        console::diagnose(&mut self.console, Diagnostic::WakeUp).await;
        let sync = self
            .sync
            .poll(
                &mut self.timer,
                &mut self.console,
                &mut self.rtc,
                self.policy.sync_window_ms(),
            )
            .await;

        let timestamp = self.timestamp().await;
        let (measurement, sensor) = self.sensor.read().await;
        if !sensor.is_none() {
            console::diagnose(&mut self.console, Diagnostic::SensorFail).await;
        }
        let record = SampleRecord::new(timestamp, measurement);

        let storage = match self.log.append(&self.session, &record) {
            Ok(()) => {
                if self.policy.mode() == Mode::Continuous {
                    self.indicator.pulse(self.timer.now_ms());
                }
                Fault::None
            }
            Err(fault) => {
                console::diagnose(&mut self.console, Diagnostic::LogErr).await;
                fault
            }
        };

        self.report(&record).await;

        let mut rest_sync = heapless::Vec::new();
        let mut waited_ms: u32 = 0;
        loop {
            let rest = self
                .policy
                .rest(
                    &mut self.timer,
                    &mut self.indicator,
                    &mut self.console,
                    self.config.interval_ms,
                    started_ms,
                )
                .await;
            waited_ms = waited_ms.saturating_add(rest.waited_ms());
            if let Rest::Done { .. } = rest {
                break;
            }
            // Input is already buffered, so a zero window reads it straight away
            if let Some(outcome) = self
                .sync
                .poll(&mut self.timer, &mut self.console, &mut self.rtc, 0)
                .await
            {
                if rest_sync.push(outcome).is_err() {
                    debug!("rest sync outcome not reported: {}", outcome);
                }
            }
        }

        CycleReport {
            sync,
            rest_sync,
            record,
            sensor,
            storage,
            waited_ms,
        }
    }

    /// Current time, or the last good reading if the clock stops answering
    async fn timestamp(&mut self) -> Timestamp {
        match self.rtc.now() {
            Ok(now) => {
                self.last_timestamp = now;
                now
            }
            Err(e) => {
                warn!("RTC read failed: {:?}", Debug2Format(&e));
                console::diagnose(&mut self.console, Diagnostic::RtcFail).await;
                self.last_timestamp
            }
        }
    }

    async fn report(&mut self, record: &SampleRecord) {
        match self.policy.mode() {
            Mode::Continuous => {
                let mut row = RowBuf::new();
                if record.write_fields(self.log.device_id(), &mut row).is_ok() {
                    console::send_line(&mut self.console, row.as_bytes()).await;
                }
            }
            Mode::LowPower => {
                let mut echo = LineBuf::<24>::new();
                let _ = write!(echo, "{}", record.timestamp);
                console::send_line(&mut self.console, echo.as_bytes()).await;
            }
        }
    }
}
