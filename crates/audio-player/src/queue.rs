//! Bounded, closable queues of interleaved `f32` samples.
//!
//! Every stage hands audio to the next one through a [`SampleQueue`]:
//! decoder or PCM sink → (resampler →) output callback.
//!
//! Producers block while the queue is full. The output callback never blocks and only
//! takes what is ready. Closing a queue wakes every waiter: producers stop, consumers
//! drain what is left and then see `None`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// How many frames [`SampleQueue::take`] should return.
#[derive(Clone, Copy, Debug)]
pub enum Take {
    /// Block until exactly this many frames are queued; `None` if closed first.
    Exact(usize),
    /// Block until at least one frame is queued, then return up to this many.
    UpTo(usize),
    /// Never block: up to this many frames, or `None` if nothing is ready.
    Ready(usize),
}

/// Queue capacity in samples for `buffer_seconds` of audio at `rate_hz`.
///
/// Non-finite or non-positive durations fall back to two seconds.
pub fn capacity_for(rate_hz: u32, channels: usize, buffer_seconds: f32) -> usize {
    let secs = if buffer_seconds.is_finite() && buffer_seconds > 0.0 {
        buffer_seconds
    } else {
        2.0
    };
    let frames = (rate_hz as f32 * secs).ceil() as usize;
    frames.saturating_mul(channels)
}

pub struct SampleQueue {
    channels: usize,
    capacity: usize,
    state: Mutex<QueueState>,
    changed: Condvar,
}

struct QueueState {
    samples: VecDeque<f32>,
    closed: bool,
    // Samples accepted over the queue's lifetime.
    pushed: u64,
}

impl SampleQueue {
    /// `capacity` is in samples and is rounded up to hold at least one frame.
    pub fn new(channels: usize, capacity: usize) -> Self {
        let channels = channels.max(1);
        Self {
            channels,
            capacity: capacity.max(channels),
            state: Mutex::new(QueueState {
                samples: VecDeque::new(),
                closed: false,
                pushed: 0,
            }),
            changed: Condvar::new(),
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn capacity_frames(&self) -> usize {
        self.capacity / self.channels
    }

    /// Whole frames accepted by [`SampleQueue::push_blocking`] so far.
    pub fn pushed_frames(&self) -> u64 {
        self.lock().pushed / self.channels as u64
    }

    /// Mark end of stream. Idempotent.
    pub fn close(&self) {
        self.lock().closed = true;
        self.changed.notify_all();
    }

    /// Append samples, waiting for room as needed.
    ///
    /// Returns `false` if the queue was closed before everything was accepted; the
    /// remainder is dropped.
    pub fn push_blocking(&self, samples: &[f32]) -> bool {
        let mut rest = samples;
        while !rest.is_empty() {
            let mut state = self.lock();
            while state.samples.len() >= self.capacity && !state.closed {
                state = self
                    .changed
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            if state.closed {
                return false;
            }

            let room = self.capacity - state.samples.len();
            let (now, later) = rest.split_at(room.min(rest.len()));
            state.samples.extend(now.iter().copied());
            state.pushed += now.len() as u64;
            rest = later;

            drop(state);
            self.changed.notify_all();
        }
        true
    }

    pub fn take(&self, how: Take) -> Option<Vec<f32>> {
        let mut state = self.lock();
        let frames = match how {
            Take::Exact(frames) => {
                let want = frames.min(self.capacity_frames()) * self.channels;
                while state.samples.len() < want && !state.closed {
                    state = self
                        .changed
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                if state.samples.len() < want {
                    return None;
                }
                want / self.channels
            }
            Take::UpTo(max_frames) => {
                while state.samples.len() < self.channels && !state.closed {
                    state = self
                        .changed
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                (state.samples.len() / self.channels).min(max_frames)
            }
            Take::Ready(max_frames) => (state.samples.len() / self.channels).min(max_frames),
        };
        if frames == 0 {
            return None;
        }

        let out: Vec<f32> = state.samples.drain(..frames * self.channels).collect();
        drop(state);
        self.changed.notify_all();
        Some(out)
    }

    /// Block until the queue is closed and every whole frame has been taken.
    pub fn wait_drained(&self) {
        let mut state = self.lock();
        while !(state.closed && state.samples.len() < self.channels) {
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`SampleQueue::wait_drained`], but gives up once `cancel` is set.
    ///
    /// Returns `true` if the queue drained, `false` if cancelled.
    pub fn wait_drained_or_cancel(&self, cancel: &AtomicBool) -> bool {
        let mut state = self.lock();
        loop {
            if cancel.load(Ordering::Relaxed) {
                return false;
            }
            if state.closed && state.samples.len() < self.channels {
                return true;
            }
            state = self
                .changed
                .wait_timeout(state, Duration::from_millis(50))
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn capacity_for_falls_back_on_bad_durations() {
        assert_eq!(capacity_for(44_100, 2, 2.0), 176_400);
        assert_eq!(capacity_for(44_100, 2, 0.0), 176_400);
        assert_eq!(capacity_for(44_100, 2, f32::NAN), 176_400);
        assert_eq!(capacity_for(48_000, 1, 0.5), 24_000);
    }

    #[test]
    fn capacity_holds_at_least_one_frame() {
        let q = SampleQueue::new(2, 0);
        assert_eq!(q.capacity_frames(), 1);
    }

    #[test]
    fn take_ready_on_empty_queue_is_none() {
        let q = SampleQueue::new(2, 16);
        assert!(q.take(Take::Ready(4)).is_none());
    }

    #[test]
    fn take_ready_returns_whole_frames_only() {
        let q = SampleQueue::new(2, 64);
        assert!(q.push_blocking(&[1.0, 2.0, 3.0, 4.0, 5.0]));
        assert_eq!(q.take(Take::Ready(8)), Some(vec![1.0, 2.0, 3.0, 4.0]));
        assert!(q.take(Take::Ready(8)).is_none());
    }

    #[test]
    fn pushed_frames_counts_accepted_whole_frames() {
        let q = Arc::new(SampleQueue::new(2, 4));
        assert!(q.push_blocking(&[1.0, 2.0, 3.0]));
        assert_eq!(q.pushed_frames(), 1);
        q.take(Take::Ready(1));
        assert_eq!(q.pushed_frames(), 1);
        assert!(q.push_blocking(&[4.0]));
        assert_eq!(q.pushed_frames(), 2);
        q.take(Take::Ready(2));

        let producer = q.clone();
        let handle = thread::spawn(move || producer.push_blocking(&[4.0; 8]));
        thread::sleep(Duration::from_millis(20));
        q.close();
        assert!(!handle.join().unwrap());
        // Only what fit before the close was accepted.
        assert_eq!(q.pushed_frames(), 4);
    }

    #[test]
    fn take_exact_waits_for_producer() {
        let q = Arc::new(SampleQueue::new(2, 64));
        let consumer = q.clone();
        let barrier = Arc::new(Barrier::new(2));
        let started = barrier.clone();

        let handle = thread::spawn(move || {
            started.wait();
            consumer.take(Take::Exact(3))
        });

        barrier.wait();
        q.push_blocking(&[0.1, 0.2, 0.3, 0.4]);
        q.push_blocking(&[0.5, 0.6]);

        assert_eq!(handle.join().unwrap().map(|v| v.len()), Some(6));
    }

    #[test]
    fn take_exact_after_close_without_enough_data_is_none() {
        let q = SampleQueue::new(2, 64);
        q.push_blocking(&[1.0, 2.0]);
        q.close();
        assert!(q.take(Take::Exact(2)).is_none());
        assert_eq!(q.take(Take::UpTo(2)), Some(vec![1.0, 2.0]));
        assert!(q.take(Take::UpTo(2)).is_none());
    }

    #[test]
    fn push_blocks_until_consumer_makes_room() {
        let q = Arc::new(SampleQueue::new(1, 2));
        let producer = q.clone();
        let handle = thread::spawn(move || producer.push_blocking(&[1.0, 2.0, 3.0, 4.0]));

        let mut seen = Vec::new();
        while seen.len() < 4 {
            if let Some(v) = q.take(Take::UpTo(2)) {
                seen.extend(v);
            }
        }
        assert!(handle.join().unwrap());
        assert_eq!(seen, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn push_returns_false_once_closed() {
        let q = Arc::new(SampleQueue::new(1, 1));
        let producer = q.clone();
        let handle = thread::spawn(move || producer.push_blocking(&[1.0, 2.0, 3.0]));
        thread::sleep(Duration::from_millis(20));
        q.close();
        assert!(!handle.join().unwrap());
    }

    #[test]
    fn wait_drained_returns_after_close_and_take() {
        let q = Arc::new(SampleQueue::new(2, 8));
        q.push_blocking(&[1.0, 2.0]);
        q.close();
        let waiter = q.clone();
        let handle = thread::spawn(move || waiter.wait_drained());
        q.take(Take::Ready(1));
        handle.join().unwrap();
        assert_eq!(q.pushed_frames(), 1);
    }

    #[test]
    fn wait_drained_or_cancel_honours_cancel() {
        let q = SampleQueue::new(2, 8);
        let cancel = AtomicBool::new(true);
        assert!(!q.wait_drained_or_cancel(&cancel));

        cancel.store(false, Ordering::Relaxed);
        q.close();
        assert!(q.wait_drained_or_cancel(&cancel));
    }
}
