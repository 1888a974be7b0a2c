//! MAX31865 RTD-to-digital converter
//!
//! Each read is a single biased one-shot conversion; the bias current is off
//! between samples to limit self-heating and power draw.

use embedded_hal::spi::{Operation, SpiDevice};
use embedded_hal_async::delay::DelayNs;

use crate::config::RtdConfig;
use crate::fault::Fault;
use crate::fmt::Debug2Format;
use crate::record::Measurement;
use crate::sensor::SensorReader;

const REG_CONFIG: u8 = 0x00;
const REG_RTD_MSB: u8 = 0x01;
const REG_HIGH_FAULT_MSB: u8 = 0x03;
const REG_FAULT_STATUS: u8 = 0x07;
const WRITE_FLAG: u8 = 0x80;

const CONFIG_BIAS: u8 = 0x80;
const CONFIG_ONE_SHOT: u8 = 0x20;
const CONFIG_3WIRE: u8 = 0x10;
const CONFIG_FAULT_CLEAR: u8 = 0x02;

const BIAS_SETTLE_MS: u32 = 10;
const CONVERSION_MS: u32 = 65;

/// Full-scale ADC code (15 bits)
const ADC_FULL_SCALE: f32 = 32768.0;

// Callendar-Van Dusen coefficients for IEC 60751 platinum RTDs
const CVD_A: f32 = 3.9083e-3;
const CVD_B: f32 = -5.775e-7;

/// One conversion as read from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Conversion {
    /// 15-bit resistance ratio
    pub code: u16,
    /// Fault status register; non-zero on any fault
    pub status: u8,
    /// Fault bit from the RTD LSB register
    pub flagged: bool,
}

impl Conversion {
    pub fn is_faulted(&self) -> bool {
        self.flagged || self.status != 0
    }
}

/// MAX31865 on a dedicated SPI device
pub struct Max31865<S, D> {
    spi: S,
    delay: D,
    config: RtdConfig,
}

impl<S, D> Max31865<S, D>
where
    S: SpiDevice,
    D: DelayNs,
{
    pub fn new(spi: S, delay: D, config: RtdConfig) -> Self {
        Self { spi, delay, config }
    }

    /// Put the converter in a known idle state
    ///
    /// Bias off, fault latch cleared, fault thresholds wide open.
    pub fn init(&mut self) -> Result<(), S::Error> {
        self.spi.write(&[
            REG_HIGH_FAULT_MSB | WRITE_FLAG,
            0xFF,
            0xFF,
            0x00,
            0x00,
        ])?;
        self.clear_fault()
    }

    fn base_config(&self) -> u8 {
        if self.config.three_wire {
            CONFIG_3WIRE
        } else {
            0
        }
    }

    fn write_config(&mut self, bits: u8) -> Result<(), S::Error> {
        let value = self.base_config() | bits;
        self.spi.write(&[REG_CONFIG | WRITE_FLAG, value])
    }

    fn read_regs(&mut self, addr: u8, buf: &mut [u8]) -> Result<(), S::Error> {
        self.spi
            .transaction(&mut [Operation::Write(&[addr]), Operation::Read(buf)])
    }

    /// Clear the fault status latch
    pub fn clear_fault(&mut self) -> Result<(), S::Error> {
        self.write_config(CONFIG_FAULT_CLEAR)
    }

    /// Run one biased one-shot conversion
    pub async fn convert(&mut self) -> Result<Conversion, S::Error> {
        self.clear_fault()?;
        self.write_config(CONFIG_BIAS)?;
        self.delay.delay_ms(BIAS_SETTLE_MS).await;
        self.write_config(CONFIG_BIAS | CONFIG_ONE_SHOT)?;
        self.delay.delay_ms(CONVERSION_MS).await;

        let mut rtd = [0u8; 2];
        self.read_regs(REG_RTD_MSB, &mut rtd)?;
        self.write_config(0)?;

        let mut status = [0u8; 1];
        self.read_regs(REG_FAULT_STATUS, &mut status)?;

        let rtd = u16::from_be_bytes(rtd);
        Ok(Conversion {
            code: rtd >> 1,
            status: status[0],
            flagged: rtd & 1 != 0,
        })
    }
}

impl<S, D> SensorReader for Max31865<S, D>
where
    S: SpiDevice,
    D: DelayNs,
{
    async fn read(&mut self) -> (Measurement, Fault) {
        match self.convert().await {
            Ok(conversion) if !conversion.is_faulted() => {
                let celsius = rtd_to_celsius(
                    conversion.code,
                    self.config.r_nominal,
                    self.config.r_ref,
                );
                (Measurement::Temperature(celsius), Fault::None)
            }
            Ok(conversion) => {
                warn!("RTD fault, status {=u8:#x}", conversion.status);
                if let Err(e) = self.clear_fault() {
                    warn!("RTD fault clear failed: {:?}", Debug2Format(&e));
                }
                (Measurement::sentinel(), Fault::SensorFault)
            }
            Err(e) => {
                warn!("RTD SPI transfer failed: {:?}", Debug2Format(&e));
                (Measurement::sentinel(), Fault::SensorFault)
            }
        }
    }
}

/// Convert a 15-bit ratio code to degrees Celsius
///
/// Uses the closed-form Callendar-Van Dusen inverse, which is exact at and
/// above 0 °C. Below 0 °C a fifth-order polynomial fit in the normalized
/// resistance takes over.
pub fn rtd_to_celsius(code: u16, r_nominal: f32, r_ref: f32) -> f32 {
    let rt = code as f32 / ADC_FULL_SCALE * r_ref;

    let z1 = -CVD_A;
    let z2 = CVD_A * CVD_A - 4.0 * CVD_B;
    let z3 = 4.0 * CVD_B / r_nominal;
    let z4 = 2.0 * CVD_B;

    let temp = (libm::sqrtf(z2 + z3 * rt) + z1) / z4;
    if temp >= 0.0 {
        return temp;
    }

    // Normalize to a 100 Ω sensor
    let r = rt / r_nominal * 100.0;
    let r2 = r * r;
    let r3 = r2 * r;
    let r4 = r3 * r;
    let r5 = r4 * r;
    -242.02 + 2.2228 * r + 2.5859e-3 * r2 - 4.8260e-6 * r3 - 2.8183e-8 * r4 + 1.5243e-10 * r5
}
