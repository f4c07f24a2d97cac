// ABOUTME: Script hand-off slot and lifecycle bookkeeping between the I/O loop and the scripting runtime
// ABOUTME: on_script_end drains stdout before clearing script_running, mirroring the original's ~1s poll

use crate::ring::{Semaphore, StdoutRing};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Single-producer/single-consumer hand-off of script source text. The
/// producer is the `SCRIPT_EXEC` handler; the consumer is the scripting
/// runtime's main task via [`ScriptSlot::get_script`].
pub struct ScriptSlot {
    source: Mutex<Option<Vec<u8>>>,
    signal: Semaphore,
    pub script_running: AtomicBool,
    pub disconnect_pending: AtomicBool,
}

impl Default for ScriptSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptSlot {
    pub fn new() -> Self {
        Self {
            source: Mutex::new(None),
            signal: Semaphore::new(0),
            script_running: AtomicBool::new(false),
            disconnect_pending: AtomicBool::new(false),
        }
    }

    /// `SCRIPT_EXEC` accept path: stash the source and post the hand-off.
    pub fn accept(&self, source: Vec<u8>) {
        *self.source.lock().unwrap() = Some(source);
        self.script_running.store(true, Ordering::Relaxed);
        self.signal.post();
    }

    /// Called by the scripting runtime's main task; blocks until a script is
    /// handed off, *then* samples `attached` (live, not a value captured
    /// before the wait — attach state can toggle while this call is parked).
    pub fn get_script(&self, attached: &AtomicBool) -> Option<Vec<u8>> {
        self.signal.wait_timeout(Duration::from_secs(3600));
        if !attached.load(Ordering::Relaxed) {
            return None;
        }
        self.source.lock().unwrap().take()
    }

    pub fn on_script_start(&self) {
        self.script_running.store(true, Ordering::Relaxed);
    }

    /// Frees the script source, drains the stdout ring (waiting up to ~1s),
    /// then clears `script_running`. If a disconnect was pending, clears it
    /// along with the running flag and reports that the caller should detach.
    pub fn on_script_end(&self, stdout: &StdoutRing) -> bool {
        *self.source.lock().unwrap() = None;
        stdout.wait_drained(Duration::from_secs(1));
        self.script_running.store(false, Ordering::Relaxed);
        self.disconnect_pending.swap(false, Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.script_running.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_then_get_script_returns_source_and_sets_running() {
        let slot = ScriptSlot::new();
        let attached = AtomicBool::new(true);
        slot.accept(b"pass".to_vec());
        assert!(slot.is_running());
        let got = slot.get_script(&attached);
        assert_eq!(got, Some(b"pass".to_vec()));
    }

    #[test]
    fn get_script_returns_none_when_detached_after_wait() {
        let slot = ScriptSlot::new();
        let attached = AtomicBool::new(false);
        slot.accept(b"pass".to_vec());
        let got = slot.get_script(&attached);
        assert_eq!(got, None);
    }

    #[test]
    fn on_script_end_clears_running_after_drain() {
        let slot = ScriptSlot::new();
        let attached = AtomicBool::new(true);
        let stdout = StdoutRing::new(1024);
        slot.accept(b"pass".to_vec());
        slot.get_script(&attached);
        let disconnect = slot.on_script_end(&stdout);
        assert!(!slot.is_running());
        assert!(!disconnect);
    }

    #[test]
    fn on_script_end_reports_pending_disconnect() {
        let slot = ScriptSlot::new();
        let stdout = StdoutRing::new(1024);
        slot.accept(b"pass".to_vec());
        slot.disconnect_pending.store(true, Ordering::Relaxed);
        let disconnect = slot.on_script_end(&stdout);
        assert!(disconnect);
    }
}
