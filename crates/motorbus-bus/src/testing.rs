//! A scripted in-memory transport for exercising the bus without hardware.

use std::collections::VecDeque;
use std::time::Duration;

use motorbus_frame::RxFrame;
use motorbus_transport::{Transport, TransportError};

enum ReadStep {
    Bytes(Vec<u8>),
    Fail(TransportError),
}

enum WriteStep {
    Count(usize),
    Fail(TransportError),
}

/// Replays scripted read results and records every write.
///
/// Reads past the end of the script time out. Writes accept the whole
/// buffer unless a write result was scripted.
#[derive(Default)]
pub struct ScriptedTransport {
    reads: VecDeque<ReadStep>,
    writes: VecDeque<WriteStep>,
    written: Vec<Vec<u8>>,
    read_calls: usize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a full response frame.
    pub fn push_frame(&mut self, frame: RxFrame) -> &mut Self {
        self.reads.push_back(ReadStep::Bytes(frame.as_bytes().to_vec()));
        self
    }

    /// Queue raw bytes, e.g. a truncated frame.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.reads.push_back(ReadStep::Bytes(bytes.to_vec()));
        self
    }

    /// Queue a read that fails with `err`.
    pub fn push_read_error(&mut self, err: TransportError) -> &mut Self {
        self.reads.push_back(ReadStep::Fail(err));
        self
    }

    /// Make the next write report `count` bytes written.
    pub fn push_write_count(&mut self, count: usize) -> &mut Self {
        self.writes.push_back(WriteStep::Count(count));
        self
    }

    pub fn push_write_error(&mut self, err: TransportError) -> &mut Self {
        self.writes.push_back(WriteStep::Fail(err));
        self
    }

    /// Every buffer handed to `write_bulk`, including short and failed writes.
    pub fn written(&self) -> &[Vec<u8>] {
        &self.written
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls
    }

    pub fn reads_remaining(&self) -> usize {
        self.reads.len()
    }
}

impl Transport for ScriptedTransport {
    fn write_bulk(&mut self, buf: &[u8], _timeout: Duration) -> motorbus_transport::Result<usize> {
        self.written.push(buf.to_vec());
        match self.writes.pop_front() {
            None => Ok(buf.len()),
            Some(WriteStep::Count(count)) => Ok(count.min(buf.len())),
            Some(WriteStep::Fail(err)) => Err(err),
        }
    }

    fn read_bulk(&mut self, buf: &mut [u8], _timeout: Duration) -> motorbus_transport::Result<usize> {
        self.read_calls += 1;
        match self.reads.pop_front() {
            None => Err(TransportError::Timeout),
            Some(ReadStep::Fail(err)) => Err(err),
            Some(ReadStep::Bytes(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

impl std::fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedTransport")
            .field("reads_remaining", &self.reads.len())
            .field("written", &self.written.len())
            .finish()
    }
}
