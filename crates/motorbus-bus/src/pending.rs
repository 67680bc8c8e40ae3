use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::time::Instant;

use motorbus_frame::RxFrame;

use crate::key::ResponseMatcher;

/// A frame read from the bus that no waiting caller has claimed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingFrame {
    pub frame: RxFrame,
    pub received_at: Instant,
}

/// Frames read while waiting for something else, oldest first.
///
/// Frames leave the queue only by being claimed through
/// [`take_first`](Self::take_first) or by an explicit [`drain`](Self::drain).
/// The optional limit does not evict: the bus stops reading once it is
/// reached.
#[derive(Debug, Default)]
pub struct PendingQueue {
    frames: VecDeque<PendingFrame>,
    limit: Option<NonZeroUsize>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A queue the bus will stop filling once `limit` frames are held.
    pub fn bounded(limit: Option<NonZeroUsize>) -> Self {
        Self {
            frames: VecDeque::new(),
            limit,
        }
    }

    pub fn push(&mut self, frame: RxFrame) {
        self.frames.push_back(PendingFrame {
            frame,
            received_at: Instant::now(),
        });
    }

    /// Remove and return the oldest frame accepted by `matcher`.
    pub fn take_first<M: ResponseMatcher + ?Sized>(&mut self, matcher: &M) -> Option<PendingFrame> {
        let index = self
            .frames
            .iter()
            .position(|pending| matcher.matches(&pending.frame))?;
        self.frames.remove(index)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn limit(&self) -> Option<NonZeroUsize> {
        self.limit
    }

    pub fn is_full(&self) -> bool {
        self.limit
            .is_some_and(|limit| self.frames.len() >= limit.get())
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingFrame> {
        self.frames.iter()
    }

    /// Remove every queued frame, oldest first.
    pub fn drain(&mut self) -> Vec<PendingFrame> {
        self.frames.drain(..).collect()
    }
}
