//! Bounded frame queue between the render thread and the recording worker.
//!
//! Pushes are non-blocking: when the queue is full the oldest resident
//! frame is dropped and counted, favoring freshness of the real-time
//! visual over completeness. The consumer polls with a timeout so its loop
//! stays responsive to stop requests even when starved of frames.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::types::GrabbedFrame;

pub struct FrameQueue {
    inner: Mutex<Inner>,
    cv: Condvar,
}

struct Inner {
    frames: VecDeque<GrabbedFrame>,
    capacity: usize,
    dropped: u64,
    accepting: bool,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                frames: VecDeque::with_capacity(capacity.min(1024)),
                capacity: capacity.max(1),
                dropped: 0,
                accepting: false,
            }),
            cv: Condvar::new(),
        }
    }

    /// Begin accepting pushed frames.
    pub fn start(&self) {
        let mut g = self.inner.lock().expect("lock poisoned");
        g.accepting = true;
    }

    /// Stop accepting pushes and wake any waiting consumer. Frames already
    /// resident remain poppable so a clean shutdown can drain them.
    pub fn stop(&self) {
        let mut g = self.inner.lock().expect("lock poisoned");
        g.accepting = false;
        self.cv.notify_all();
    }

    /// Non-blocking push. Returns false if the queue is not accepting.
    /// On overflow the oldest resident frame is dropped and counted.
    pub fn push(&self, frame: GrabbedFrame) -> bool {
        let mut g = self.inner.lock().expect("lock poisoned");
        if !g.accepting {
            return false;
        }

        if g.frames.len() >= g.capacity {
            g.frames.pop_front();
            g.dropped = g.dropped.saturating_add(1);
        }
        g.frames.push_back(frame);
        self.cv.notify_one();
        true
    }

    /// Pop the next frame, blocking up to `timeout`. Returns `None` on
    /// expiry, or immediately once the queue is stopped and empty.
    pub fn next_frame(&self, timeout: Duration) -> Option<GrabbedFrame> {
        let mut g = self.inner.lock().expect("lock poisoned");

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(frame) = g.frames.pop_front() {
                return Some(frame);
            }
            if !g.accepting {
                return None;
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }

            let remaining = deadline - now;
            let (ng, _) = self.cv.wait_timeout(g, remaining).expect("lock poisoned");
            g = ng;
        }
    }

    /// Whether any frame remains resident. Gates clean shutdown.
    pub fn has_frames(&self) -> bool {
        !self.inner.lock().expect("lock poisoned").frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("lock poisoned").frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frames lost to the drop-oldest overflow policy.
    pub fn dropped(&self) -> u64 {
        self.inner.lock().expect("lock poisoned").dropped
    }
}
