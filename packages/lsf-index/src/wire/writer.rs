//! Append-only LSF writer.
//!
//! Records are encoded one at a time and written straight through to the
//! underlying writer. Used for fixtures, benchmarks and re-serializing
//! filtered logs.

use std::io::Write;

use crate::error::Result;
use crate::message::{LogMessage, MessageBody};
use crate::wire::encoder::{encode, encode_record};
use crate::wire::header::RecordHeader;

// ── LogWriter ──────────────────────────────────────────────────────

pub struct LogWriter<W: Write> {
    inner: W,
    records: usize,
    bytes: u64,
}

impl<W: Write> LogWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            records: 0,
            bytes: 0,
        }
    }

    /// Append a decoded message, preserving its header.
    pub fn append(&mut self, message: &LogMessage) -> Result<()> {
        let bytes = encode(message)?;
        self.write_record(&bytes)
    }

    /// Append a body under a new header.
    pub fn append_body(&mut self, header: &RecordHeader, body: &MessageBody) -> Result<()> {
        let bytes = encode_record(header, body)?;
        self.write_record(&bytes)
    }

    /// Append an already encoded record verbatim.
    pub fn append_raw(&mut self, record: &[u8]) -> Result<()> {
        self.write_record(record)
    }

    fn write_record(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.records += 1;
        self.bytes += bytes.len() as u64;
        Ok(())
    }

    pub fn records_written(&self) -> usize {
        self.records
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    /// Flush and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}
