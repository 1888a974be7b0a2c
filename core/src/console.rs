//! Outbound serial lines: protocol responses and free-form diagnostics
//!
//! Console output is best effort. A failed write is logged and otherwise
//! ignored; the logging path never waits on the host.

use embedded_io_async::Write;

use crate::fmt::Debug2Format;

/// Line terminator for everything sent to the host
pub const EOL: &[u8] = b"\r\n";

/// Free-form status lines outside the sync protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Diagnostic {
    RtcFail,
    SdFail,
    FileErr,
    Ready,
    SensorFail,
    LogErr,
    WakeUp,
}

impl Diagnostic {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RtcFail => "RTC FAIL",
            Self::SdFail => "SD FAIL",
            Self::FileErr => "FILE ERR",
            Self::Ready => "READY",
            Self::SensorFail => "SENSOR FAIL",
            Self::LogErr => "LOG ERR",
            Self::WakeUp => "WAKE_UP",
        }
    }
}

/// Write `line` followed by CRLF and flush
pub async fn send_line<W: Write>(port: &mut W, line: &[u8]) {
    let result = async {
        port.write_all(line).await?;
        port.write_all(EOL).await?;
        port.flush().await
    }
    .await;

    if let Err(e) = result {
        debug!("console write failed: {:?}", Debug2Format(&e));
    }
}

/// Emit a diagnostic line
pub async fn diagnose<W: Write>(port: &mut W, diagnostic: Diagnostic) {
    send_line(port, diagnostic.as_str().as_bytes()).await;
}
