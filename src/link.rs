// ABOUTME: Shared DebugLink state: attach flags, rings, script slot, framebuffer and file-upload contexts
// ABOUTME: Owned by the I/O loop; sinks/sources are exposed as methods for other threads to call into

use crate::config::LinkConfig;
use crate::file_upload::FileUploadContext;
use crate::framebuffer::Framebuffer;
use crate::ring::{StdinRing, StdoutRing};
use crate::script::ScriptSlot;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// All state shared between the I/O loop, the scripting runtime, and any
/// thread producing stdout. Mirrors the original's process-wide globals,
/// collected into one value instead of scattered statics.
pub struct DebugLink {
    pub config: LinkConfig,
    pub attached: AtomicBool,
    pub stdin: StdinRing,
    pub stdout: StdoutRing,
    pub script: ScriptSlot,
    pub framebuffer: Mutex<Framebuffer>,
    pub file_upload: Mutex<FileUploadContext>,
    pub fb_enabled: AtomicBool,
}

impl DebugLink {
    pub fn new(config: LinkConfig) -> Self {
        let upload_root = config.upload_root.clone();
        Self {
            config,
            attached: AtomicBool::new(false),
            stdin: StdinRing::new(4096),
            stdout: StdoutRing::new(1024),
            script: ScriptSlot::new(),
            framebuffer: Mutex::new(Framebuffer::new()),
            file_upload: Mutex::new(FileUploadContext::new(upload_root)),
            fb_enabled: AtomicBool::new(true),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Relaxed)
    }

    pub fn attach(&self) {
        self.attached.store(true, Ordering::Relaxed);
    }

    /// Detach, clearing framebuffer source. Called on reset-while-idle and
    /// on `on_script_end`'s deferred disconnect path.
    pub fn detach(&self) {
        self.attached.store(false, Ordering::Relaxed);
        self.script.disconnect_pending.store(false, Ordering::Relaxed);
        *self.framebuffer.lock().unwrap() = Framebuffer::new();
    }

    /// Sink used by the embedding firmware to push a user-captured frame in.
    pub fn set_fb(&self, data: Vec<u8>, width: u32, height: u32) {
        self.framebuffer.lock().unwrap().set_fb(data, width, height);
    }

    /// Sink used by the scripting runtime's print path.
    pub fn stdout_tx(&self, data: &[u8]) {
        self.stdout.write_blocking(data);
    }

    /// Source polled by the scripting runtime's main task.
    pub fn get_script(&self) -> Option<Vec<u8>> {
        self.script.get_script(&self.attached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_link_starts_detached() {
        let link = DebugLink::new(LinkConfig::default());
        assert!(!link.is_attached());
    }

    #[test]
    fn detach_clears_framebuffer_and_disconnect_pending() {
        let link = DebugLink::new(LinkConfig::default());
        link.attach();
        link.script.disconnect_pending.store(true, Ordering::Relaxed);
        link.set_fb(vec![1, 2, 3], 1, 1);
        link.detach();
        assert!(!link.is_attached());
        assert!(!link.script.disconnect_pending.load(Ordering::Relaxed));
    }
}
