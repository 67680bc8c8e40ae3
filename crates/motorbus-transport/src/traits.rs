use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use crate::error::{Result, TransportError};

/// Smallest timeout handed to the OS; a zero socket timeout means "block forever".
const MIN_OS_TIMEOUT: Duration = Duration::from_millis(1);

/// A half-duplex byte channel carrying fixed-size bus frames.
///
/// Implementations report how many bytes actually moved. A short count is
/// not an error at this layer; the bus decides what a short transfer means.
///
/// Stream transports keep frame alignment across short transfers: bytes of
/// a short read lead the next read, and the unsent tail of a short write is
/// sent before anything else.
pub trait Transport {
    /// Write `buf`, giving up after `timeout`. Returns the number of bytes written.
    ///
    /// After a short count, writing the same `buf` again resumes it and
    /// reports the total written so far.
    fn write_bulk(&mut self, buf: &[u8], timeout: Duration) -> Result<usize>;

    /// Read up to `buf.len()` bytes before `timeout` elapses.
    ///
    /// Returns the number of bytes read, which may be short of `buf.len()`.
    /// Returns [`TransportError::Timeout`] when nothing arrived at all.
    fn read_bulk(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Transport name for diagnostics.
    fn name(&self) -> &'static str;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write_bulk(&mut self, buf: &[u8], timeout: Duration) -> Result<usize> {
        (**self).write_bulk(buf, timeout)
    }

    fn read_bulk(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        (**self).read_bulk(buf, timeout)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_bulk(&mut self, buf: &[u8], timeout: Duration) -> Result<usize> {
        (**self).write_bulk(buf, timeout)
    }

    fn read_bulk(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        (**self).read_bulk(buf, timeout)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// A connected bus stream implementing Read, Write and [`Transport`].
///
/// On Unix this wraps either a bridge socket stream or an opened serial tty.
///
/// A byte stream has no frame boundaries, so the bulk calls keep their own:
/// `carry` holds the bytes of a read that came back short, and
/// `partial_write` the frame whose tail has not gone out yet.
pub struct BusStream {
    inner: BusStreamInner,
    carry: BytesMut,
    partial_write: Option<PartialWrite>,
}

struct PartialWrite {
    frame: Bytes,
    written: usize,
}

enum BusStreamInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    #[cfg(unix)]
    Serial(std::fs::File),
}

impl Read for BusStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            BusStreamInner::Unix(stream) => stream.read(buf),
            #[cfg(unix)]
            BusStreamInner::Serial(file) => file.read(buf),
        }
    }
}

impl Write for BusStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            BusStreamInner::Unix(stream) => stream.write(buf),
            #[cfg(unix)]
            BusStreamInner::Serial(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            BusStreamInner::Unix(stream) => stream.flush(),
            #[cfg(unix)]
            BusStreamInner::Serial(file) => file.flush(),
        }
    }
}

impl BusStream {
    /// Create a BusStream from a Unix domain socket stream.
    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self::from_inner(BusStreamInner::Unix(stream))
    }

    /// Create a BusStream from an opened and configured serial tty.
    #[cfg(unix)]
    pub(crate) fn from_serial(file: std::fs::File) -> Self {
        Self::from_inner(BusStreamInner::Serial(file))
    }

    fn from_inner(inner: BusStreamInner) -> Self {
        Self {
            inner,
            carry: BytesMut::new(),
            partial_write: None,
        }
    }

    /// Create a connected pair of in-process streams.
    ///
    /// Useful for wiring a bus to a simulated device without a socket path.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        Ok((Self::from_unix(left), Self::from_unix(right)))
    }

    /// Set read timeout on the underlying stream.
    ///
    /// Serial ttys round the timeout to tenths of a second (max 25.5 s).
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            BusStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            BusStreamInner::Serial(file) => crate::serial::set_read_timeout(file, timeout),
        }
    }

    /// Set write timeout on the underlying stream.
    ///
    /// A no-op for serial ttys, whose writes complete into the kernel buffer.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            BusStreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            BusStreamInner::Serial(_) => Ok(()),
        }
    }

    /// Bytes of an unfinished frame held for the next read.
    pub fn carried(&self) -> usize {
        self.carry.len()
    }

    /// Try to clone this stream (creates a new file descriptor).
    ///
    /// The clone starts with no carried or unsent bytes.
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            #[cfg(unix)]
            BusStreamInner::Unix(stream) => Ok(Self::from_unix(stream.try_clone()?)),
            #[cfg(unix)]
            BusStreamInner::Serial(file) => Ok(Self::from_serial(file.try_clone()?)),
        }
    }

    /// A tty in non-canonical mode reports an expired VTIME as a zero-length read.
    fn zero_read_is_timeout(&self) -> bool {
        match &self.inner {
            #[cfg(unix)]
            BusStreamInner::Unix(_) => false,
            #[cfg(unix)]
            BusStreamInner::Serial(_) => true,
        }
    }

    /// Write `frame[offset..]` until it is all out or `deadline` passes.
    /// Returns the new offset.
    fn write_until(&mut self, frame: &[u8], mut offset: usize, deadline: Instant) -> Result<usize> {
        while offset < frame.len() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            self.set_write_timeout(Some((deadline - now).max(MIN_OS_TIMEOUT)))?;

            match Write::write(self, &frame[offset..]) {
                Ok(0) => return Err(TransportError::Shutdown),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_timeout(&err) => break,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        if offset == frame.len() {
            loop {
                match Write::flush(self) {
                    Ok(()) => break,
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) => return Err(TransportError::Io(err)),
                }
            }
        }
        Ok(offset)
    }
}

impl Transport for BusStream {
    fn write_bulk(&mut self, buf: &[u8], timeout: Duration) -> Result<usize> {
        let deadline = Instant::now() + timeout;

        if let Some(partial) = self.partial_write.take() {
            let resume = partial.frame.as_ref() == buf;
            let written = self.write_until(&partial.frame, partial.written, deadline)?;
            if written < partial.frame.len() {
                self.partial_write = Some(PartialWrite {
                    frame: partial.frame,
                    written,
                });
                return Ok(if resume { written } else { 0 });
            }
            if resume {
                trace!(written, len = buf.len(), "bus write resumed");
                return Ok(written);
            }
            debug!(
                tail = partial.frame.len() - partial.written,
                "flushed unsent tail of previous frame"
            );
        }

        let written = self.write_until(buf, 0, deadline)?;
        if written > 0 && written < buf.len() {
            self.partial_write = Some(PartialWrite {
                frame: Bytes::copy_from_slice(buf),
                written,
            });
        }

        trace!(written, len = buf.len(), bytes = ?&buf[..written], "bus write");
        Ok(written)
    }

    fn read_bulk(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let deadline = Instant::now() + timeout;

        let mut filled = self.carry.len().min(buf.len());
        if filled > 0 {
            buf[..filled].copy_from_slice(&self.carry.split_to(filled));
        }

        let mut closed = false;
        while filled < buf.len() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            self.set_read_timeout(Some((deadline - now).max(MIN_OS_TIMEOUT)))?;

            match Read::read(self, &mut buf[filled..]) {
                Ok(0) if self.zero_read_is_timeout() => break,
                Ok(0) if filled == 0 => return Err(TransportError::Shutdown),
                Ok(0) => {
                    closed = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_timeout(&err) => break,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        if filled == 0 {
            return Err(TransportError::Timeout);
        }

        // A short read drains the carry first, so it is empty here.
        if filled < buf.len() && !closed {
            self.carry.extend_from_slice(&buf[..filled]);
            debug!(carried = filled, "short read kept for next read");
        }

        trace!(read = filled, len = buf.len(), bytes = ?&buf[..filled], "bus read");
        Ok(filled)
    }

    fn name(&self) -> &'static str {
        match &self.inner {
            #[cfg(unix)]
            BusStreamInner::Unix(_) => "bridge-socket",
            #[cfg(unix)]
            BusStreamInner::Serial(_) => "serial",
        }
    }
}

fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

impl std::fmt::Debug for BusStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusStream")
            .field("type", &self.name())
            .finish()
    }
}
