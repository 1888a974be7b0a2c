//! Bounded byte buffers for outbound lines
//!
//! Rows and protocol lines are formatted into a fixed-capacity buffer. Writing
//! past capacity fails with `fmt::Error` and leaves the bytes that fit.

use core::fmt;
use heapless::Vec;

/// Fixed-capacity line assembled with `core::fmt::Write`
#[derive(Debug, Clone, Default)]
pub struct LineBuf<const N: usize> {
    bytes: Vec<u8, N>,
}

impl<const N: usize> LineBuf<N> {
    pub const fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    /// Append raw bytes, which need not be UTF-8
    pub fn push_bytes(&mut self, data: &[u8]) -> fmt::Result {
        self.bytes.extend_from_slice(data).map_err(|_| fmt::Error)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl<const N: usize> fmt::Write for LineBuf<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_bytes(s.as_bytes())
    }
}
