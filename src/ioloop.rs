// ABOUTME: Single worker thread multiplexing the transport, the local console, and RTS/break events
// ABOUTME: Owns the DebugLink's mutable I/O-loop-only state: parser, file-upload context, framebuffer staging

use crate::command::{HANDSHAKE_TOKENS, MOCK_REPL_LINES};
use crate::dispatcher::dispatch;
use crate::error::TransportError;
use crate::frame::FrameParser;
use crate::framebuffer::{JpegEncoder, Rotator, WriteBackDevice};
use crate::interrupt::{is_keyboard_interrupt, InterruptSink};
use crate::link::DebugLink;
use crate::transport::Transport;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Runs the device-side I/O loop until `should_stop` returns true. The
/// embedding firmware owns thread creation (spawns this on whatever priority
/// its platform needs); this is a plain blocking call.
pub struct IoLoop {
    link: Arc<DebugLink>,
    parser: FrameParser,
    last_rts_action: Option<Instant>,
}

impl IoLoop {
    pub fn new(link: Arc<DebugLink>) -> Self {
        Self {
            link,
            parser: FrameParser::new(),
            last_rts_action: None,
        }
    }

    /// Run one iteration: read available transport bytes (timeout from
    /// config), route them, and check the RTS/exception condition.
    pub fn step(
        &mut self,
        transport: &mut dyn Transport,
        interrupts: &mut dyn InterruptSink,
        wbc_device: &mut dyn WriteBackDevice,
        jpeg: &mut dyn JpegEncoder,
        rotator: &mut dyn Rotator,
    ) -> Result<(), TransportError> {
        self.handle_rts(transport, interrupts);

        let mut buf = [0u8; 256];
        let n = transport.read_timeout(&mut buf, self.link.config.read_timeout)?;
        if n == 0 {
            return Ok(());
        }
        self.route_bytes(&buf[..n], transport, interrupts, wbc_device, jpeg, rotator)
    }

    fn handle_rts(&mut self, transport: &mut dyn Transport, interrupts: &mut dyn InterruptSink) {
        if !transport.exception_pending() {
            return;
        }
        let now = Instant::now();
        if let Some(last) = self.last_rts_action {
            if now.duration_since(last) < self.link.config.rts_rate_limit {
                return;
            }
        }
        self.last_rts_action = Some(now);

        if self.link.is_attached() {
            if self.link.script.is_running() {
                self.link
                    .script
                    .disconnect_pending
                    .store(true, std::sync::atomic::Ordering::Relaxed);
                interrupts.raise_ide_interrupt();
            } else {
                self.link.detach();
            }
        }
    }

    fn route_bytes(
        &mut self,
        data: &[u8],
        transport: &mut dyn Transport,
        interrupts: &mut dyn InterruptSink,
        wbc_device: &mut dyn WriteBackDevice,
        jpeg: &mut dyn JpegEncoder,
        rotator: &mut dyn Rotator,
    ) -> Result<(), TransportError> {
        if self.link.is_attached() {
            let mut headers = Vec::new();
            for &b in data {
                if let Ok(Some(h)) = self.parser.feed(b) {
                    headers.push(h);
                }
            }
            for header in headers {
                dispatch(
                    &self.link, header, transport, interrupts, wbc_device, jpeg, rotator,
                )?;
            }
            return Ok(());
        }

        if let Some(token) = HANDSHAKE_TOKENS.iter().find(|t| data.starts_with(t.as_slice())) {
            self.link.attach();
            if self.link.script.is_running() {
                interrupts.raise_ide_interrupt();
            }
            let rest = &data[token.len()..];
            self.route_bytes(rest, transport, interrupts, wbc_device, jpeg, rotator)?;
            return Ok(());
        }

        const MOCK_PREFIX_LEN: usize = 23;
        if data.len() >= MOCK_PREFIX_LEN
            && MOCK_REPL_LINES
                .iter()
                .any(|line| data[..MOCK_PREFIX_LEN] == line[..MOCK_PREFIX_LEN])
        {
            return Ok(());
        }

        if is_keyboard_interrupt(data) && self.link.script.is_running() {
            interrupts.raise_keyboard_interrupt();
            return Ok(());
        }

        self.link.stdin.write(data);
        Ok(())
    }
}
