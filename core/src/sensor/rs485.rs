//! Request/response probe on a half-duplex RS-485 bus
//!
//! The transceiver direction pin is driven high to transmit the address
//! frame and low to listen. Whatever arrives before the buffer fills or the
//! response timeout expires is logged verbatim: there is no framing or
//! checksum, so a timeout or line noise looks the same as a short reply.

use embedded_hal::digital::OutputPin;
use heapless::Vec;

use crate::config::Rs485Config;
use crate::deadline::{wait_readable, Deadline};
use crate::fault::Fault;
use crate::fmt::Debug2Format;
use crate::record::{Measurement, RAW_CAPACITY};
use crate::sensor::SensorReader;
use crate::{SerialPort, Timer};

pub struct Rs485Probe<U, P, T> {
    port: U,
    direction: P,
    timer: T,
    config: Rs485Config,
}

impl<U, P, T> Rs485Probe<U, P, T>
where
    U: SerialPort,
    P: OutputPin,
    T: Timer,
{
    pub fn new(port: U, mut direction: P, timer: T, config: Rs485Config) -> Self {
        // Start in receive mode so the bus is not held
        direction.set_low().ok();
        Self {
            port,
            direction,
            timer,
            config,
        }
    }

    async fn send_request(&mut self) {
        self.direction.set_high().ok();
        let frame = self.config.address_frame;
        let sent = async {
            self.port.write_all(frame).await?;
            self.port.flush().await
        }
        .await;
        self.direction.set_low().ok();

        if let Err(e) = sent {
            warn!("RS-485 request failed: {:?}", Debug2Format(&e));
        }
    }

    async fn collect(&mut self) -> Vec<u8, RAW_CAPACITY> {
        let deadline = Deadline::after(&self.timer, self.config.response_timeout_ms);
        let mut raw = Vec::new();
        let mut chunk = [0u8; 16];

        while !raw.is_full() && wait_readable(&mut self.timer, &mut self.port, deadline).await {
            let n = match self.port.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    warn!("RS-485 read failed: {:?}", Debug2Format(&e));
                    break;
                }
            };
            let room = raw.capacity() - raw.len();
            // Bytes past capacity are discarded
            let _ = raw.extend_from_slice(&chunk[..n.min(room)]);
        }
        raw
    }
}

impl<U, P, T> SensorReader for Rs485Probe<U, P, T>
where
    U: SerialPort,
    P: OutputPin,
    T: Timer,
{
    async fn read(&mut self) -> (Measurement, Fault) {
        self.send_request().await;
        let raw = self.collect().await;
        debug!("RS-485 response: {} bytes", raw.len());
        (Measurement::Raw(raw), Fault::None)
    }
}
