//! Bounded frame queue between the capture thread and the playback loop
//!
//! One producer, one consumer. Both ends block with a timeout, and the queue
//! can be drained without blocking when decoding is paused or shut down.

use super::frame::Frame;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub struct FrameQueue {
    frames: Mutex<VecDeque<Frame>>,
    capacity: usize,
    /// Signalled when a frame is pushed
    frame_available: Condvar,
    /// Signalled when a frame is popped or the queue is cleared
    space_available: Condvar,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            frame_available: Condvar::new(),
            space_available: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.frames.lock().len() >= self.capacity
    }

    /// Push a frame, waiting up to `timeout` for space.
    ///
    /// Hands the frame back if the queue stayed full.
    pub fn push_timeout(&self, frame: Frame, timeout: Duration) -> Result<(), Frame> {
        let deadline = Instant::now() + timeout;
        let mut frames = self.frames.lock();

        while frames.len() >= self.capacity {
            if self
                .space_available
                .wait_until(&mut frames, deadline)
                .timed_out()
                && frames.len() >= self.capacity
            {
                return Err(frame);
            }
        }

        frames.push_back(frame);
        self.frame_available.notify_all();
        Ok(())
    }

    /// Pop the oldest frame, waiting up to `timeout` for one to arrive
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Frame> {
        let deadline = Instant::now() + timeout;
        let mut frames = self.frames.lock();

        while frames.is_empty() {
            if self
                .frame_available
                .wait_until(&mut frames, deadline)
                .timed_out()
                && frames.is_empty()
            {
                return None;
            }
        }

        let frame = frames.pop_front();
        self.space_available.notify_one();
        frame
    }

    pub fn try_pop(&self) -> Option<Frame> {
        let frame = self.frames.lock().pop_front();
        if frame.is_some() {
            self.space_available.notify_one();
        }
        frame
    }

    /// Wait until at least `min_len` frames are buffered or `timeout` elapses.
    ///
    /// Returns the queue length at the time of return.
    pub fn wait_for_len(&self, min_len: usize, timeout: Duration) -> usize {
        let min_len = min_len.min(self.capacity);
        let deadline = Instant::now() + timeout;
        let mut frames = self.frames.lock();

        while frames.len() < min_len {
            if self
                .frame_available
                .wait_until(&mut frames, deadline)
                .timed_out()
            {
                break;
            }
        }

        frames.len()
    }

    /// Drop every buffered frame without blocking, returning how many were discarded
    pub fn clear(&self) -> usize {
        let mut frames = self.frames.lock();
        let discarded = frames.len();
        frames.clear();
        self.space_available.notify_all();
        discarded
    }
}
