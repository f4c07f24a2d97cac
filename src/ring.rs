// ABOUTME: Bounded byte ring buffers used to decouple the script runtime from host polling
// ABOUTME: StdinRing is paired with a counting semaphore (one permit per byte); StdoutRing is mutex-guarded

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// A simple counting semaphore built on a condvar, mirroring the original's
/// one-permit-per-readable-byte stdin accounting.
pub struct Semaphore {
    count: Mutex<usize>,
    cond: Condvar,
}

impl Semaphore {
    pub fn new(initial: usize) -> Self {
        Self {
            count: Mutex::new(initial),
            cond: Condvar::new(),
        }
    }

    pub fn post(&self) {
        let mut count = self.count.lock().unwrap();
        *count += 1;
        self.cond.notify_one();
    }

    pub fn post_n(&self, n: usize) {
        let mut count = self.count.lock().unwrap();
        *count += n;
        self.cond.notify_all();
    }

    /// Wait up to `timeout` for a permit; mirrors `usb_rx`'s 1ms polling wait.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let count = self.count.lock().unwrap();
        if *count > 0 {
            let mut count = count;
            *count -= 1;
            return true;
        }
        let (mut count, result) = self.cond.wait_timeout(count, timeout).unwrap();
        if !result.timed_out() && *count > 0 {
            *count -= 1;
            true
        } else {
            false
        }
    }
}

/// Fixed-capacity byte ring, single producer / single consumer, paired with a
/// [`Semaphore`] so the consumer can block until bytes are available. Used for
/// host-to-script stdin (capacity 4096 per the original).
pub struct StdinRing {
    buf: Mutex<VecDeque<u8>>,
    capacity: usize,
    sem: Semaphore,
}

impl StdinRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            sem: Semaphore::new(0),
        }
    }

    /// Write bytes in, dropping any that do not fit once the ring is full.
    pub fn write(&self, data: &[u8]) -> usize {
        let mut buf = self.buf.lock().unwrap();
        let room = self.capacity - buf.len();
        let n = data.len().min(room);
        buf.extend(&data[..n]);
        drop(buf);
        self.sem.post_n(n);
        n
    }

    /// Block up to `timeout` for one byte; returns `None` on timeout (mirrors
    /// `usb_rx` returning `-1`).
    pub fn read_byte(&self, timeout: Duration) -> Option<u8> {
        if !self.sem.wait_timeout(timeout) {
            return None;
        }
        let mut buf = self.buf.lock().unwrap();
        buf.pop_front()
    }

    pub fn readable(&self) -> usize {
        self.buf.lock().unwrap().len()
    }
}

/// Fixed-capacity byte ring, possibly-multi producer / single consumer, used
/// for script-to-host stdout (capacity 1024 per the original). Writers block
/// (rather than drop) when the ring is full, matching `mpy_stdout_tx`'s
/// spin-and-sleep backpressure.
pub struct StdoutRing {
    buf: Mutex<VecDeque<u8>>,
    capacity: usize,
    cond: Condvar,
}

impl StdoutRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            cond: Condvar::new(),
        }
    }

    /// Write all of `data`, blocking in small increments while the ring is
    /// full. Never drops bytes.
    pub fn write_blocking(&self, data: &[u8]) {
        let mut offset = 0;
        while offset < data.len() {
            let mut buf = self.buf.lock().unwrap();
            let room = self.capacity - buf.len();
            if room == 0 {
                let (guard, _) = self
                    .cond
                    .wait_timeout(buf, Duration::from_millis(2))
                    .unwrap();
                buf = guard;
                if self.capacity - buf.len() == 0 {
                    continue;
                }
            }
            let room = self.capacity - buf.len();
            let n = (data.len() - offset).min(room);
            buf.extend(&data[offset..offset + n]);
            offset += n;
        }
    }

    pub fn readable(&self) -> usize {
        self.buf.lock().unwrap().len()
    }

    /// Drain up to `max` bytes.
    pub fn drain(&self, max: usize) -> Vec<u8> {
        let mut buf = self.buf.lock().unwrap();
        let n = max.min(buf.len());
        let drained: Vec<u8> = buf.drain(..n).collect();
        self.cond.notify_all();
        drained
    }

    /// Wait until empty or `timeout` elapses (used by the script-end and
    /// idle-reset drain paths, ~1s via repeated polling in the original).
    pub fn wait_drained(&self, timeout: Duration) {
        let start = std::time::Instant::now();
        while self.readable() > 0 && start.elapsed() < timeout {
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdin_ring_write_then_read_preserves_order() {
        let ring = StdinRing::new(4096);
        ring.write(b"abc");
        assert_eq!(ring.read_byte(Duration::from_millis(10)), Some(b'a'));
        assert_eq!(ring.read_byte(Duration::from_millis(10)), Some(b'b'));
        assert_eq!(ring.read_byte(Duration::from_millis(10)), Some(b'c'));
    }

    #[test]
    fn stdin_ring_read_times_out_when_empty() {
        let ring = StdinRing::new(4096);
        assert_eq!(ring.read_byte(Duration::from_millis(5)), None);
    }

    #[test]
    fn stdin_ring_drops_bytes_beyond_capacity() {
        let ring = StdinRing::new(4);
        let written = ring.write(b"abcdef");
        assert_eq!(written, 4);
        assert_eq!(ring.readable(), 4);
    }

    #[test]
    fn stdout_ring_drain_returns_fifo_order() {
        let ring = StdoutRing::new(1024);
        ring.write_blocking(b"hello");
        assert_eq!(ring.readable(), 5);
        assert_eq!(ring.drain(8), b"hello".to_vec());
        assert_eq!(ring.readable(), 0);
    }

    #[test]
    fn stdout_ring_drain_respects_max() {
        let ring = StdoutRing::new(1024);
        ring.write_blocking(b"hello world");
        assert_eq!(ring.drain(5), b"hello".to_vec());
        assert_eq!(ring.readable(), 6);
    }
}
