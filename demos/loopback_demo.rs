// Demonstrates wiring a `DebugLink` against in-memory collaborators: no real
// USB transport or hardware write-back, just the frame parser and dispatcher
// driven over a synthetic byte stream.

use ide_dbg::command::FileErrCode;
use ide_dbg::config::LinkConfig;
use ide_dbg::dispatcher::dispatch;
use ide_dbg::frame::FrameParser;
use ide_dbg::framebuffer::{JpegEncoder, RawFrame, Rotator, WriteBackDevice};
use ide_dbg::interrupt::InterruptSink;
use ide_dbg::link::DebugLink;
use ide_dbg::transport::Transport;
use std::collections::VecDeque;
use std::error::Error;
use std::time::Duration;

struct StdoutTransport {
    inbound: VecDeque<u8>,
}

impl Transport for StdoutTransport {
    fn read_timeout(
        &mut self,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> Result<usize, ide_dbg::error::TransportError> {
        let n = buf.len().min(self.inbound.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.inbound.pop_front().unwrap();
        }
        Ok(n)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), ide_dbg::error::TransportError> {
        println!("host <- {data:02X?}");
        Ok(())
    }

    fn exception_pending(&mut self) -> bool {
        false
    }
}

struct NoopDevice;
impl WriteBackDevice for NoopDevice {
    fn dump_frame(&mut self, _timeout: Duration) -> Option<RawFrame> {
        None
    }
    fn release_frame(&mut self) {}
}
struct NoopEncoder;
impl JpegEncoder for NoopEncoder {
    fn encode(&mut self, _frame: &RawFrame, _quality: u8) -> Option<Vec<u8>> {
        None
    }
}
struct NoopRotator;
impl Rotator for NoopRotator {
    fn rotate(
        &mut self,
        _flags: ide_dbg::framebuffer::RotationFlags,
        _frame: &RawFrame,
    ) -> Option<RawFrame> {
        None
    }
}
struct PrintingInterrupts;
impl InterruptSink for PrintingInterrupts {
    fn raise_keyboard_interrupt(&mut self) {
        println!("(runtime) keyboard interrupt raised");
    }
    fn raise_ide_interrupt(&mut self) {
        println!("(runtime) ide interrupt raised");
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let link = DebugLink::new(LinkConfig::new("/dev/null").with_firmware_version(4, 1, 0));
    link.attach();

    let mut transport = StdoutTransport {
        inbound: VecDeque::new(),
    };
    let mut parser = FrameParser::new();
    let mut interrupts = PrintingInterrupts;

    // QUERY_STATUS
    let query_status = [0x30, 0x80, 0x00, 0x00, 0x00, 0x00];
    for &b in &query_status {
        if let Ok(Some(header)) = parser.feed(b) {
            dispatch(
                &link,
                header,
                &mut transport,
                &mut interrupts,
                &mut NoopDevice,
                &mut NoopEncoder,
                &mut NoopRotator,
            )?;
        }
    }

    println!(
        "last file errcode: {:?}",
        link.file_upload.lock().unwrap().last_errcode == FileErrCode::None
    );
    Ok(())
}
