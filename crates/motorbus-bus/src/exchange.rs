use std::time::{Duration, Instant};

use motorbus_frame::{decode, Response, RxFrame, TxFrame, RX_SIZE, TX_SIZE};
use motorbus_transport::{Transport, TransportError};
use tracing::{debug, trace, warn};

use crate::config::BusConfig;
use crate::error::{BusError, Result};
use crate::key::{ExchangeKey, FinishKey, ResponseMatcher};
use crate::pending::{PendingFrame, PendingQueue};

/// Frame accounting for one bus.
///
/// Until [`Bus::drain_pending`] is called,
/// `frames_read == frames_returned + pending().len()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Full frames read from the transport.
    pub frames_read: u64,
    /// Frames handed to a waiting caller, live or from the queue.
    pub frames_returned: u64,
    /// Frames parked in the pending queue.
    pub frames_queued: u64,
    /// Calls answered from the pending queue.
    pub queue_hits: u64,
}

/// One shared bus: a transport plus the queue of frames nobody has claimed.
///
/// Every device façade borrows the same `Bus`, so exactly one call is in
/// flight at a time.
pub struct Bus<T: Transport> {
    transport: T,
    pending: PendingQueue,
    config: BusConfig,
    stats: BusStats,
}

impl<T: Transport> Bus<T> {
    /// Create a bus with default configuration.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, BusConfig::default())
    }

    pub fn with_config(transport: T, config: BusConfig) -> Self {
        Self {
            transport,
            pending: PendingQueue::bounded(config.max_pending),
            config,
            stats: BusStats::default(),
        }
    }

    /// Write a command frame without waiting for any reply.
    pub fn send(&mut self, frame: &TxFrame) -> Result<()> {
        let written = self
            .transport
            .write_bulk(frame.as_bytes(), self.config.write_timeout)?;
        if written != TX_SIZE {
            warn!(written, expected = TX_SIZE, header = %frame.header(), "short command write");
            return Err(BusError::TransportWrite {
                written,
                expected: TX_SIZE,
            });
        }
        trace!(header = %frame.header(), "command sent");
        Ok(())
    }

    /// Send `frame` and wait for the reply identified by `key`.
    pub fn call(&mut self, key: &ExchangeKey, frame: &TxFrame) -> Result<Response> {
        self.call_with_timeout(key, frame, self.config.call_timeout)
    }

    pub fn call_with_timeout(
        &mut self,
        key: &ExchangeKey,
        frame: &TxFrame,
        timeout: Duration,
    ) -> Result<Response> {
        self.send(frame)?;
        self.await_response(key, timeout)
    }

    /// Wait for a frame accepted by `matcher` and decode it.
    pub fn await_response<M: ResponseMatcher + ?Sized>(
        &mut self,
        matcher: &M,
        timeout: Duration,
    ) -> Result<Response> {
        let frame = self.await_frame(matcher, timeout)?;
        Ok(decode(&frame, &self.config.frame)?)
    }

    /// Wait for the completion report of a long-running command.
    pub fn wait_finish(&mut self, key: &FinishKey, timeout: Duration) -> Result<Response> {
        debug!(%key, ?timeout, "waiting for completion");
        self.await_response(key, timeout)
    }

    /// Wait for a raw frame accepted by `matcher`.
    ///
    /// The pending queue is consulted before any read. Every full frame read
    /// that `matcher` rejects is queued, and reading continues with whatever
    /// is left of `timeout`. When a read comes back short, empty or failed,
    /// the queue is checked once more before the error is reported.
    pub fn await_frame<M: ResponseMatcher + ?Sized>(
        &mut self,
        matcher: &M,
        timeout: Duration,
    ) -> Result<RxFrame> {
        let deadline = Instant::now() + timeout;

        if let Some(frame) = self.claim_pending(matcher) {
            return Ok(frame);
        }

        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(BusError::Timeout(timeout));
            }
            if self.pending.is_full() {
                warn!(
                    pending = self.pending.len(),
                    "pending queue full, refusing to read"
                );
                return Err(BusError::QueueFull(self.pending.len()));
            }

            let mut buf = [0u8; RX_SIZE];
            let failure = match self.transport.read_bulk(&mut buf, deadline - now) {
                Ok(RX_SIZE) => {
                    let frame = RxFrame::new(buf);
                    self.stats.frames_read += 1;
                    if matcher.matches(&frame) {
                        self.stats.frames_returned += 1;
                        trace!(header = %frame.header(), "response matched");
                        return Ok(frame);
                    }
                    self.pending.push(frame);
                    self.stats.frames_queued += 1;
                    debug!(
                        header = %frame.header(),
                        pending = self.pending.len(),
                        "queued unmatched frame"
                    );
                    continue;
                }
                Ok(read) => {
                    warn!(read, expected = RX_SIZE, bytes = ?&buf[..read], "short response read");
                    BusError::ShortRead {
                        read,
                        expected: RX_SIZE,
                    }
                }
                Err(TransportError::Timeout) => BusError::Timeout(timeout),
                Err(err) => BusError::Transport(err),
            };

            return match self.claim_pending(matcher) {
                Some(frame) => Ok(frame),
                None => Err(failure),
            };
        }
    }

    /// Halt every device on the bus.
    ///
    /// The broadcast stop is rewritten until the transport takes the whole
    /// frame; no reply is awaited. Short writes and write timeouts are
    /// retried, other transport failures are returned at once. Returns the
    /// number of attempts made.
    pub fn stop_all(&mut self) -> Result<usize> {
        let frame = TxFrame::stop_all();
        let mut attempts = 0usize;
        loop {
            attempts += 1;
            let failure = match self
                .transport
                .write_bulk(frame.as_bytes(), self.config.stop_write_timeout)
            {
                Ok(TX_SIZE) => {
                    debug!(attempts, "broadcast stop delivered");
                    return Ok(attempts);
                }
                Ok(written) => {
                    warn!(written, attempts, "broadcast stop incomplete, retrying");
                    BusError::TransportWrite {
                        written,
                        expected: TX_SIZE,
                    }
                }
                Err(TransportError::Timeout) => {
                    warn!(attempts, "broadcast stop timed out, retrying");
                    BusError::Transport(TransportError::Timeout)
                }
                Err(err) => return Err(BusError::Transport(err)),
            };

            if self
                .config
                .stop_attempts
                .is_some_and(|limit| attempts >= limit)
            {
                return Err(failure);
            }
        }
    }

    /// Frames read but not yet claimed by any caller.
    pub fn pending(&self) -> &PendingQueue {
        &self.pending
    }

    /// Discard every unclaimed frame, returning them oldest first.
    pub fn drain_pending(&mut self) -> Vec<PendingFrame> {
        let drained = self.pending.drain();
        if !drained.is_empty() {
            debug!(count = drained.len(), "drained pending frames");
        }
        drained
    }

    pub fn stats(&self) -> BusStats {
        self.stats
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the bus, returning the transport. Unclaimed frames are dropped.
    pub fn into_inner(self) -> T {
        self.transport
    }

    fn claim_pending<M: ResponseMatcher + ?Sized>(&mut self, matcher: &M) -> Option<RxFrame> {
        let pending = self.pending.take_first(matcher)?;
        self.stats.frames_returned += 1;
        self.stats.queue_hits += 1;
        debug!(
            header = %pending.frame.header(),
            waited = ?pending.received_at.elapsed(),
            "response claimed from pending queue"
        );
        Some(pending.frame)
    }
}

impl<T: Transport> std::fmt::Debug for Bus<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("transport", &self.transport.name())
            .field("pending", &self.pending.len())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use std::num::NonZeroUsize;
    use motorbus_frame::{mode, Header, Payload, ResponseStatus};

    const WAIT: Duration = Duration::from_millis(200);

    fn rx(bytes: [u8; RX_SIZE]) -> RxFrame {
        RxFrame::new(bytes)
    }

    fn status_query(address: u8) -> TxFrame {
        motorbus_frame::encode(Header::new(address, 0, 0), &[]).unwrap()
    }

    fn assert_conserved<T: Transport>(bus: &Bus<T>) {
        let stats = bus.stats();
        assert_eq!(
            stats.frames_read,
            stats.frames_returned + bus.pending().len() as u64
        );
    }

    #[test]
    fn unrelated_frame_is_queued_while_waiting() {
        let mut transport = ScriptedTransport::new();
        transport
            .push_frame(rx([0x20, 0x00, 0x00, 0, 0, 0, 0, 0]))
            .push_frame(rx([0x10, 0x00, 0x00, 150, 0x01, 0, 0, 7]));
        let mut bus = Bus::new(transport);

        let key = ExchangeKey::new(0x10, 0x00, ResponseStatus::STATUS);
        let response = bus.call(&key, &status_query(0x10)).unwrap();

        assert_eq!(response.header, key.header());
        match response.payload {
            Payload::Status(record) => {
                assert_eq!(record.firmware, 1.5);
                assert_eq!(record.angle, 7);
                assert_eq!(record.limit_switches, [true, false]);
            }
            other => panic!("unexpected payload {other:?}"),
        }

        assert_eq!(bus.pending().len(), 1);
        let queued = bus.pending().iter().next().unwrap();
        assert_eq!(queued.frame.header().address, 0x20);
        assert_eq!(bus.transport().written().len(), 1);
        assert_conserved(&bus);
    }

    #[test]
    fn queued_frame_answers_later_call_without_reading() {
        let mut transport = ScriptedTransport::new();
        transport
            .push_frame(rx([0x20, 0x00, 0x00, 0, 0, 0, 0, 0]))
            .push_frame(rx([0x10, 0x00, 0x00, 0, 0, 0, 0, 0]));
        let mut bus = Bus::new(transport);

        bus.call(&ExchangeKey::new(0x10, 0, 0), &status_query(0x10))
            .unwrap();
        let reads_before = bus.transport().read_calls();

        let response = bus
            .call(&ExchangeKey::new(0x20, 0, 0), &status_query(0x20))
            .unwrap();
        assert_eq!(response.header.address, 0x20);
        assert_eq!(bus.transport().read_calls(), reads_before);
        assert!(bus.pending().is_empty());
        assert_eq!(bus.stats().queue_hits, 1);
        assert_conserved(&bus);
    }

    #[test]
    fn queue_claims_exactly_one_matching_instance() {
        let mut transport = ScriptedTransport::new();
        transport
            .push_frame(rx([0x21, 0, 0, 1, 0, 0, 0, 0]))
            .push_frame(rx([0x22, 0, 0, 1, 0, 0, 0, 0]))
            .push_frame(rx([0x22, 0, 0, 2, 0, 0, 0, 0]))
            .push_frame(rx([0x23, 0, 0, 1, 0, 0, 0, 0]))
            .push_frame(rx([0x10, 0, 0, 0, 0, 0, 0, 0]));
        let mut bus = Bus::new(transport);
        bus.call(&ExchangeKey::new(0x10, 0, 0), &status_query(0x10))
            .unwrap();
        assert_eq!(bus.pending().len(), 4);

        let first = bus
            .await_frame(&ExchangeKey::new(0x22, 0, 0), WAIT)
            .unwrap();
        assert_eq!(first.payload()[0], 1);
        assert_eq!(bus.pending().len(), 3);

        let second = bus
            .await_frame(&ExchangeKey::new(0x22, 0, 0), WAIT)
            .unwrap();
        assert_eq!(second.payload()[0], 2);
        assert_eq!(bus.pending().len(), 2);
        assert_conserved(&bus);
    }

    #[test]
    fn short_read_with_empty_queue_fails_without_fabricating() {
        let mut transport = ScriptedTransport::new();
        transport.push_bytes(&[0x10, 0x00, 0x00]);
        let mut bus = Bus::new(transport);

        let err = bus
            .call(&ExchangeKey::new(0x10, 0, 0), &status_query(0x10))
            .unwrap_err();
        assert!(matches!(err, BusError::ShortRead { read: 3, expected: 8 }));
        assert!(bus.pending().is_empty());
        assert_eq!(bus.stats(), BusStats::default());
    }

    #[test]
    fn read_timeout_reports_timeout() {
        let mut bus = Bus::new(ScriptedTransport::new());
        let err = bus
            .call_with_timeout(&ExchangeKey::new(0x10, 0, 0), &status_query(0x10), WAIT)
            .unwrap_err();
        assert!(matches!(err, BusError::Timeout(t) if t == WAIT));
        assert!(err.is_transient());
    }

    #[test]
    fn closed_transport_is_a_transport_error() {
        let mut transport = ScriptedTransport::new();
        transport
            .push_frame(rx([0x20, 0, 0, 0, 0, 0, 0, 0]))
            .push_read_error(TransportError::Shutdown);
        let mut bus = Bus::new(transport);

        let err = bus
            .call(&ExchangeKey::new(0x10, 0, 0), &status_query(0x10))
            .unwrap_err();
        assert!(matches!(err, BusError::Transport(TransportError::Shutdown)));
        // The frame read before the failure is kept.
        assert_eq!(bus.pending().len(), 1);
        assert_conserved(&bus);
    }

    #[test]
    fn short_write_fails_before_any_read() {
        let mut transport = ScriptedTransport::new();
        transport
            .push_write_count(4)
            .push_frame(rx([0x10, 0, 0, 0, 0, 0, 0, 0]));
        let mut bus = Bus::new(transport);

        let err = bus
            .call(&ExchangeKey::new(0x10, 0, 0), &status_query(0x10))
            .unwrap_err();
        assert!(matches!(
            err,
            BusError::TransportWrite {
                written: 4,
                expected: 10
            }
        ));
        assert_eq!(bus.transport().read_calls(), 0);
        assert_eq!(bus.transport().reads_remaining(), 1);
    }

    #[test]
    fn expired_deadline_skips_reading() {
        let mut transport = ScriptedTransport::new();
        transport.push_frame(rx([0x10, 0, 0, 0, 0, 0, 0, 0]));
        let mut bus = Bus::new(transport);

        let err = bus
            .await_frame(&ExchangeKey::new(0x10, 0, 0), Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, BusError::Timeout(_)));
        assert_eq!(bus.transport().read_calls(), 0);
    }

    #[test]
    fn bounded_queue_refuses_to_read_when_full() {
        let mut transport = ScriptedTransport::new();
        transport
            .push_frame(rx([0x20, 0, 0, 0, 0, 0, 0, 0]))
            .push_frame(rx([0x21, 0, 0, 0, 0, 0, 0, 0]))
            .push_frame(rx([0x10, 0, 0, 0, 0, 0, 0, 0]));
        let config = BusConfig {
            max_pending: NonZeroUsize::new(2),
            ..BusConfig::default()
        };
        let mut bus = Bus::with_config(transport, config);

        let err = bus
            .call(&ExchangeKey::new(0x10, 0, 0), &status_query(0x10))
            .unwrap_err();
        assert!(matches!(err, BusError::QueueFull(2)));
        assert_eq!(bus.transport().reads_remaining(), 1);
        assert_conserved(&bus);

        // Claiming a queued frame makes room again.
        bus.await_frame(&ExchangeKey::new(0x20, 0, 0), WAIT).unwrap();
        let response = bus
            .await_response(&ExchangeKey::new(0x10, 0, 0), WAIT)
            .unwrap();
        assert_eq!(response.header.address, 0x10);
    }

    #[test]
    fn tightest_bound_still_reads_into_an_empty_queue() {
        let mut transport = ScriptedTransport::new();
        transport.push_frame(rx([0x10, 0, 0, 0, 0, 0, 0, 0]));
        let config = BusConfig {
            max_pending: NonZeroUsize::new(1),
            ..BusConfig::default()
        };
        let mut bus = Bus::with_config(transport, config);

        let response = bus
            .call(&ExchangeKey::new(0x10, 0, 0), &status_query(0x10))
            .unwrap();
        assert_eq!(response.header.address, 0x10);
        assert!(BusConfig::default().max_pending.is_none());
    }

    #[test]
    fn unknown_family_frames_are_queued_then_reported_when_claimed() {
        let mut transport = ScriptedTransport::new();
        transport
            .push_frame(rx([0x31, 0, 0, 0, 0, 0, 0, 0]))
            .push_frame(rx([0x10, 0, 0, 0, 0, 0, 0, 0]));
        let mut bus = Bus::new(transport);

        bus.call(&ExchangeKey::new(0x10, 0, 0), &status_query(0x10))
            .unwrap();
        assert_eq!(bus.pending().len(), 1);

        let err = bus
            .await_response(&ExchangeKey::new(0x31, 0, 0), WAIT)
            .unwrap_err();
        assert!(matches!(err, BusError::Protocol(_)));
        assert!(bus.pending().is_empty());
        assert_conserved(&bus);
    }

    #[test]
    fn wait_finish_skips_status_replies() {
        let mut transport = ScriptedTransport::new();
        transport
            .push_frame(rx([0x01, 0, ResponseStatus::STATUS, mode::drive::ANGLE, 0, 0, 0, 0]))
            .push_frame(rx([0x01, 0, ResponseStatus::SUCCESS, mode::drive::ANGLE, 0, 0, 0, 0]));
        let mut bus = Bus::new(transport);

        let response = bus
            .wait_finish(&FinishKey::new(0x01, 0, mode::drive::ANGLE), WAIT)
            .unwrap();
        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(bus.pending().len(), 1);
    }

    #[test]
    fn stop_all_retries_until_full_write() {
        let mut transport = ScriptedTransport::new();
        transport
            .push_write_count(0)
            .push_write_count(6)
            .push_write_error(TransportError::Timeout);
        let mut bus = Bus::new(transport);

        assert_eq!(bus.stop_all().unwrap(), 4);
        let written = bus.transport().written();
        assert_eq!(written.len(), 4);
        for frame in written {
            assert_eq!(frame.as_slice(), TxFrame::stop_all().as_bytes());
        }
        assert_eq!(bus.transport().read_calls(), 0);
    }

    #[test]
    fn stop_all_gives_up_after_attempt_limit() {
        let mut transport = ScriptedTransport::new();
        transport.push_write_count(3).push_write_count(5);
        let config = BusConfig {
            stop_attempts: Some(2),
            ..BusConfig::default()
        };
        let mut bus = Bus::with_config(transport, config);

        let err = bus.stop_all().unwrap_err();
        assert!(matches!(err, BusError::TransportWrite { written: 5, .. }));
    }

    #[test]
    fn stop_all_returns_hard_transport_failures() {
        let mut transport = ScriptedTransport::new();
        transport.push_write_error(TransportError::Shutdown);
        let mut bus = Bus::new(transport);

        let err = bus.stop_all().unwrap_err();
        assert!(matches!(err, BusError::Transport(TransportError::Shutdown)));
        assert_eq!(bus.transport().written().len(), 1);
    }

    #[test]
    fn drain_pending_empties_queue() {
        let mut transport = ScriptedTransport::new();
        transport
            .push_frame(rx([0x20, 0, 0, 0, 0, 0, 0, 0]))
            .push_frame(rx([0x10, 0, 0, 0, 0, 0, 0, 0]));
        let mut bus = Bus::new(transport);
        bus.call(&ExchangeKey::new(0x10, 0, 0), &status_query(0x10))
            .unwrap();

        let drained = bus.drain_pending();
        assert_eq!(drained.len(), 1);
        assert!(bus.pending().is_empty());
        assert_eq!(bus.stats().frames_queued, 1);
    }

    #[cfg(unix)]
    #[test]
    fn exchange_over_stream_pair() {
        use motorbus_transport::BusStream;

        let (host, mut device) = BusStream::pair().unwrap();
        let responder = std::thread::spawn(move || {
            let mut command = [0u8; TX_SIZE];
            let read = device.read_bulk(&mut command, Duration::from_secs(2)).unwrap();
            assert_eq!(read, TX_SIZE);
            // Unsolicited light telemetry first, then the reply.
            device
                .write_bulk(&[0x40, 0, 0, 1, 0, 0, 0, 0], Duration::from_secs(1))
                .unwrap();
            device
                .write_bulk(
                    &[command[0], command[1], 0, 100, 0, 0, 0, 42],
                    Duration::from_secs(1),
                )
                .unwrap();
            device
        });

        let mut bus = Bus::new(host);
        let response = bus
            .call_with_timeout(
                &ExchangeKey::new(0x12, 0, 0),
                &status_query(0x12),
                Duration::from_secs(2),
            )
            .unwrap();
        assert!(matches!(
            response.payload,
            Payload::Status(record) if record.angle == 42
        ));
        assert_eq!(bus.pending().len(), 1);

        let _device = responder.join().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn late_tail_of_short_reply_is_reassembled_for_next_call() {
        use motorbus_transport::BusStream;

        let (host, mut device) = BusStream::pair().unwrap();
        let responder = std::thread::spawn(move || {
            let mut command = [0u8; TX_SIZE];
            device.read_bulk(&mut command, Duration::from_secs(2)).unwrap();
            device.write_bulk(&[0x10, 0, 0], Duration::from_secs(1)).unwrap();
            std::thread::sleep(Duration::from_millis(300));
            device
                .write_bulk(&[100, 0, 0, 0, 5], Duration::from_secs(1))
                .unwrap();

            device.read_bulk(&mut command, Duration::from_secs(2)).unwrap();
            device
                .write_bulk(&[0x11, 0, 0, 100, 0, 0, 0, 2], Duration::from_secs(1))
                .unwrap();
            device
        });

        let mut bus = Bus::new(host);
        let err = bus
            .call_with_timeout(
                &ExchangeKey::new(0x10, 0, 0),
                &status_query(0x10),
                Duration::from_millis(150),
            )
            .unwrap_err();
        assert!(matches!(err, BusError::ShortRead { read: 3, .. }));

        let response = bus
            .call_with_timeout(
                &ExchangeKey::new(0x11, 0, 0),
                &status_query(0x11),
                Duration::from_secs(2),
            )
            .unwrap();
        assert!(matches!(
            response.payload,
            Payload::Status(record) if record.angle == 2
        ));

        assert_eq!(bus.pending().len(), 1);
        let queued = bus.pending().iter().next().unwrap();
        assert_eq!(queued.frame.as_bytes(), &[0x10, 0, 0, 100, 0, 0, 0, 5]);
        assert_eq!(bus.stats().frames_read, 2);
        assert_conserved(&bus);

        let _device = responder.join().unwrap();
    }
}
