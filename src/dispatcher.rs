// ABOUTME: Per-command handler table implementing each command's exact request/response contract
// ABOUTME: A handler that reads a payload always drains it, even on a precondition error

use crate::command::{Command, FileErrCode, VerifyCode};
use crate::error::TransportError;
use crate::file_upload::CreateFileInfo;
use crate::frame::FrameHeader;
use crate::framebuffer::{JpegEncoder, Rotator, WriteBackDevice};
use crate::interrupt::InterruptSink;
use crate::link::DebugLink;
use crate::transport::Transport;

/// Sentinel returned by `QUERY_STATUS`.
pub const QUERY_STATUS_MAGIC: u32 = 0xFFEE_BBAA;

/// Dispatches one already-parsed frame header against `link`, reading any
/// declared payload inline from `transport` and writing any response back to
/// it. This is the single place SPEC_FULL.md's command table is realized.
pub fn dispatch(
    link: &DebugLink,
    header: FrameHeader,
    transport: &mut dyn Transport,
    interrupts: &mut dyn InterruptSink,
    wbc_device: &mut dyn WriteBackDevice,
    jpeg: &mut dyn JpegEncoder,
    rotator: &mut dyn Rotator,
) -> Result<(), TransportError> {
    use Command::*;
    match header.command {
        QueryStatus => transport.write_all(&QUERY_STATUS_MAGIC.to_le_bytes()),

        FwVersion => {
            let (major, minor, micro) = link.config.firmware_version;
            let mut resp = Vec::with_capacity(12);
            resp.extend(major.to_le_bytes());
            resp.extend(minor.to_le_bytes());
            resp.extend(micro.to_le_bytes());
            transport.write_all(&resp)
        }

        ArchStr => transport.write_all(&link.config.arch_response()),

        ScriptExec => {
            let payload = read_payload(transport, header.declared_length)?;
            if link.script.is_running() {
                interrupts.raise_ide_interrupt();
                // Give the previous script a chance to observe the interrupt
                // and finish before deciding whether to accept the new one.
                std::thread::sleep(std::time::Duration::from_millis(100));
            }
            if !link.script.is_running() {
                link.script.accept(payload);
            }
            Ok(())
        }

        ScriptStop => {
            if link.script.is_running() {
                interrupts.raise_ide_interrupt();
            }
            Ok(())
        }

        ScriptSave => Ok(()), // reserved, no-op

        ScriptRunning => {
            let running = link.script.is_running() as u32;
            transport.write_all(&running.to_le_bytes())
        }

        TxBufLen => {
            let len = link.stdout.readable() as u32;
            transport.write_all(&len.to_le_bytes())
        }

        TxBuf => {
            let drained = link.stdout.drain(header.declared_length as usize);
            transport.write_all(&drained)
        }

        QueryFileStat => {
            let code = link.file_upload.lock().unwrap().last_errcode;
            transport.write_all(&(code as u32).to_le_bytes())
        }

        CreateFile => {
            let payload = read_payload(transport, header.declared_length)?;
            let mut upload = link.file_upload.lock().unwrap();
            match CreateFileInfo::decode(&payload) {
                Ok(info) => upload.create(info),
                Err(_) => upload.last_errcode = FileErrCode::PathErr,
            }
            Ok(())
        }

        WriteFile => {
            let payload = read_payload(transport, header.declared_length)?;
            // Mandatory drain above happens regardless of what write_chunk reports.
            let _ = link.file_upload.lock().unwrap().write_chunk(&payload);
            Ok(())
        }

        VerifyFile => {
            let code: VerifyCode = link.file_upload.lock().unwrap().verify();
            transport.write_all(&(code as u32).to_le_bytes())
        }

        FrameSize => {
            let mut fb = link.framebuffer.lock().unwrap();
            let (w, h, size) = fb.frame_size(wbc_device, jpeg, rotator);
            let mut resp = Vec::with_capacity(12);
            resp.extend(w.to_le_bytes());
            resp.extend(h.to_le_bytes());
            resp.extend(size.to_le_bytes());
            transport.write_all(&resp)
        }

        FrameDump => {
            let bytes = link.framebuffer.lock().unwrap().frame_dump();
            transport.write_all(&bytes)
        }

        SysReset => {
            if link.script.is_running() {
                link.script.disconnect_pending.store(true, std::sync::atomic::Ordering::Relaxed);
                interrupts.raise_ide_interrupt();
            } else {
                // Drain trailing stdout before detaching (REDESIGN FLAGS).
                link.stdout.wait_drained(std::time::Duration::from_secs(1));
                link.detach();
            }
            Ok(())
        }

        FbEnable => {
            let payload = read_payload(transport, header.declared_length)?;
            let enable = payload.first().copied().unwrap_or(0) != 0;
            link.fb_enabled
                .store(enable, std::sync::atomic::Ordering::Relaxed);
            Ok(())
        }
    }
}

/// Read exactly `len` bytes from the transport, blocking as needed. Used by
/// every handler with a non-empty request payload.
fn read_payload(transport: &mut dyn Transport, len: u32) -> Result<Vec<u8>, TransportError> {
    let mut buf = vec![0u8; len as usize];
    let mut filled = 0;
    while filled < buf.len() {
        let n = transport.read_timeout(&mut buf[filled..], std::time::Duration::from_secs(5))?;
        if n == 0 {
            return Err(TransportError::Timeout);
        }
        filled += n;
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkConfig;
    use crate::frame::FrameParser;
    use crate::framebuffer::RawFrame;
    use crate::interrupt::test_support::RecordingInterruptSink;
    use crate::transport::test_support::MemTransport;
    use std::time::Duration;

    struct NullDevice;
    impl WriteBackDevice for NullDevice {
        fn dump_frame(&mut self, _timeout: Duration) -> Option<RawFrame> {
            None
        }
        fn release_frame(&mut self) {}
    }
    struct NullEncoder;
    impl JpegEncoder for NullEncoder {
        fn encode(&mut self, _frame: &RawFrame, _quality: u8) -> Option<Vec<u8>> {
            None
        }
    }
    struct NullRotator;
    impl Rotator for NullRotator {
        fn rotate(&mut self, _flags: crate::framebuffer::RotationFlags, _frame: &RawFrame) -> Option<RawFrame> {
            None
        }
    }

    fn dispatch_one(link: &DebugLink, frame_bytes: &[u8]) -> MemTransport {
        let mut parser = FrameParser::new();
        let mut header = None;
        for &b in frame_bytes {
            if let Ok(Some(h)) = parser.feed(b) {
                header = Some(h);
                break;
            }
        }
        let header = header.expect("frame header parses");
        let mut transport = MemTransport::new(&frame_bytes[6..]);
        let mut interrupts = RecordingInterruptSink::default();
        dispatch(
            link,
            header,
            &mut transport,
            &mut interrupts,
            &mut NullDevice,
            &mut NullEncoder,
            &mut NullRotator,
        )
        .unwrap();
        transport
    }

    #[test]
    fn query_status_returns_magic_value() {
        let link = DebugLink::new(LinkConfig::default());
        let t = dispatch_one(&link, &[0x30, 0x80, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(t.outbound, vec![0xAA, 0xBB, 0xEE, 0xFF]);
    }

    #[test]
    fn fw_version_reports_configured_triplet() {
        let link = DebugLink::new(LinkConfig::default().with_firmware_version(1, 2, 3));
        let t = dispatch_one(&link, &[0x30, 0x88, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(t.outbound.len(), 12);
        assert_eq!(u32::from_le_bytes(t.outbound[0..4].try_into().unwrap()), 1);
    }

    #[test]
    fn script_exec_then_script_running_reports_true() {
        let link = DebugLink::new(LinkConfig::default());
        let mut frame = vec![0x30, 0x05, 0x04, 0x00, 0x00, 0x00];
        frame.extend(b"pass");
        dispatch_one(&link, &frame);
        assert!(link.script.is_running());
        let t = dispatch_one(&link, &[0x30, 0x82, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(t.outbound, 1u32.to_le_bytes());
    }

    #[test]
    fn tx_buf_len_and_tx_buf_report_stdout_contents() {
        let link = DebugLink::new(LinkConfig::default());
        link.stdout_tx(b"hello");
        let t = dispatch_one(&link, &[0x30, 0x83, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(t.outbound, 5u32.to_le_bytes());

        let mut frame = vec![0x30, 0x84, 0x00, 0x00, 0x00, 0x00];
        frame[2..6].copy_from_slice(&8u32.to_le_bytes());
        let t = dispatch_one(&link, &frame);
        assert_eq!(t.outbound, b"hello");
    }

    #[test]
    fn script_exec_while_running_waits_then_accepts_if_finished_in_time() {
        let link = DebugLink::new(LinkConfig::default());
        link.attach();
        link.script.accept(b"old".to_vec());
        let link_clone = std::sync::Arc::new(link);
        let watcher_link = link_clone.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            watcher_link.script.on_script_end(&watcher_link.stdout);
        });
        let mut frame = vec![0x30, 0x05, 0x03, 0x00, 0x00, 0x00];
        frame.extend(b"new");
        dispatch_one(&link_clone, &frame);
        assert_eq!(link_clone.get_script(), Some(b"new".to_vec()));
    }

    #[test]
    fn script_exec_while_still_running_after_wait_drops_new_script() {
        let link = DebugLink::new(LinkConfig::default());
        link.script.accept(b"old".to_vec());
        let mut frame = vec![0x30, 0x05, 0x03, 0x00, 0x00, 0x00];
        frame.extend(b"new");
        let t = dispatch_one(&link, &frame);
        assert!(t.outbound.is_empty());
        assert!(link.script.is_running());
    }

    #[test]
    fn writefile_before_createfile_sets_write_err_and_still_drains() {
        let link = DebugLink::new(LinkConfig::default());
        let mut frame = vec![0x30, 0x07, 0x03, 0x00, 0x00, 0x00];
        frame.extend(b"abc");
        dispatch_one(&link, &frame);
        assert!(matches!(
            link.file_upload.lock().unwrap().last_errcode,
            FileErrCode::WriteErr
        ));
    }
}
