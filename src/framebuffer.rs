// ABOUTME: Frame source staging (user-set vs. hardware write-back), JPEG cache, optional rotation
// ABOUTME: Two-phase host retrieval: FRAME_SIZE latches the source, the paired FRAME_DUMP reads it

use bitflags::bitflags;
use std::time::Duration;

bitflags! {
    /// Rotation/mirror flags, bit-for-bit matching the hardware DMA channel's
    /// rotation constants. Mirror bits are combined with bitwise-OR (the
    /// original's logical-OR test collapsed the mask to 0/1; fixed here per
    /// DESIGN.md's REDESIGN FLAGS).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RotationFlags: u8 {
        const ROT_0      = 0b0000_0001;
        const ROT_90     = 0b0000_0010;
        const ROT_180    = 0b0000_0100;
        const ROT_270    = 0b0000_1000;
        const MIRROR_H   = 0b0001_0000;
        const MIRROR_V   = 0b0010_0000;
        const MIRROR_BOTH = Self::MIRROR_H.bits() | Self::MIRROR_V.bits();
    }
}

/// A raw frame, owned or borrowed depending on its source.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Hook into the hardware video write-back pipeline. Dump/release are
/// distinct calls because the hardware frame is on loan until released.
pub trait WriteBackDevice: Send {
    fn dump_frame(&mut self, timeout: Duration) -> Option<RawFrame>;
    fn release_frame(&mut self);
}

/// Hook into the JPEG encoder.
pub trait JpegEncoder: Send {
    fn encode(&mut self, frame: &RawFrame, quality: u8) -> Option<Vec<u8>>;
}

/// Hook into the rotation DMA channel.
pub trait Rotator: Send {
    fn rotate(&mut self, flags: RotationFlags, frame: &RawFrame) -> Option<RawFrame>;
}

/// Pool for scratch rotation buffers, modeled after the original's
/// video-buffer-management API (`vb_mgmt_get_block`/`put_block`).
pub trait VideoBufferPool: Send {
    fn get_block(&mut self, size: usize) -> Vec<u8>;
    fn put_block(&mut self, block: Vec<u8>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSource {
    None,
    User,
    Wbc,
}

struct WbcState {
    quality: u8,
    rotation: RotationFlags,
    jpeg_buf: Vec<u8>,
    jpeg_len: usize,
    /// Dimensions of the frame behind the currently cached JPEG; survive
    /// across calls so a repeat `FRAME_SIZE` without an intervening
    /// `FRAME_DUMP` still reports correct, nonzero dimensions.
    width: u32,
    height: u32,
}

/// Framebuffer staging shared between the user-set sink and the dispatcher's
/// `FRAME_SIZE`/`FRAME_DUMP` handlers.
pub struct Framebuffer {
    source: FrameSource,
    user: Option<RawFrame>,
    wbc: Option<WbcState>,
    latched: FrameSource,
    latched_meta: (u32, u32, u32),
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framebuffer {
    pub fn new() -> Self {
        Self {
            source: FrameSource::None,
            user: None,
            wbc: None,
            latched: FrameSource::None,
            latched_meta: (0, 0, 0),
        }
    }

    /// User-set sink: drop the frame if the slot is still occupied by a
    /// prior, unconsumed frame (oldest-wins once queued).
    pub fn set_fb(&mut self, data: Vec<u8>, width: u32, height: u32) {
        if self.user.is_some() {
            return;
        }
        self.user = Some(RawFrame {
            data,
            width,
            height,
        });
        self.source = FrameSource::User;
    }

    /// Configure (or tear down, with `quality == 0`) the write-back source.
    pub fn set_vo_wbc(&mut self, quality: u8, rotation: RotationFlags) {
        if quality == 0 {
            self.wbc = None;
            if self.source == FrameSource::Wbc {
                self.source = FrameSource::None;
            }
            return;
        }
        self.wbc = Some(WbcState {
            quality,
            rotation,
            jpeg_buf: Vec::new(),
            jpeg_len: 0,
            width: 0,
            height: 0,
        });
        self.source = FrameSource::Wbc;
    }

    /// `FRAME_SIZE`: latch the current source and return `{w, h, size}`.
    pub fn frame_size(
        &mut self,
        device: &mut dyn WriteBackDevice,
        encoder: &mut dyn JpegEncoder,
        rotator: &mut dyn Rotator,
    ) -> (u32, u32, u32) {
        self.latched = self.source;
        match self.latched {
            FrameSource::None => {
                self.latched_meta = (0, 0, 0);
            }
            FrameSource::User => {
                if let Some(frame) = &self.user {
                    self.latched_meta = (frame.width, frame.height, frame.data.len() as u32);
                } else {
                    self.latched_meta = (0, 0, 0);
                }
            }
            FrameSource::Wbc => {
                self.latched_meta = self.stage_wbc_frame(device, encoder, rotator);
            }
        }
        self.latched_meta
    }

    fn stage_wbc_frame(
        &mut self,
        device: &mut dyn WriteBackDevice,
        encoder: &mut dyn JpegEncoder,
        rotator: &mut dyn Rotator,
    ) -> (u32, u32, u32) {
        let Some(wbc) = &mut self.wbc else {
            return (0, 0, 0);
        };
        if wbc.jpeg_len != 0 {
            return (wbc.width, wbc.height, wbc.jpeg_len as u32);
        }
        let Some(frame) = device.dump_frame(Duration::from_millis(50)) else {
            return (0, 0, 0);
        };
        let rotated = if wbc.rotation.bits() != 0 {
            rotator.rotate(wbc.rotation, &frame)
        } else {
            None
        };
        let to_encode = rotated.as_ref().unwrap_or(&frame);
        let meta = (to_encode.width, to_encode.height);
        let encoded = encoder.encode(to_encode, wbc.quality);
        device.release_frame();
        let Some(encoded) = encoded else {
            return (0, 0, 0);
        };
        let size = encoded.len();
        // jpeg_cap/jpeg_buf grows monotonically, never shrinks.
        if encoded.len() > wbc.jpeg_buf.len() {
            wbc.jpeg_buf = encoded;
        } else {
            wbc.jpeg_buf[..encoded.len()].copy_from_slice(&encoded);
        }
        wbc.jpeg_len = size;
        wbc.width = meta.0;
        wbc.height = meta.1;
        (meta.0, meta.1, size as u32)
    }

    /// `FRAME_DUMP`: return the bytes staged by the preceding `FRAME_SIZE`,
    /// and reset the JPEG cache / free the user slot as appropriate.
    pub fn frame_dump(&mut self) -> Vec<u8> {
        match self.latched {
            FrameSource::None => Vec::new(),
            FrameSource::User => self.user.take().map(|f| f.data).unwrap_or_default(),
            FrameSource::Wbc => {
                if let Some(wbc) = &mut self.wbc {
                    let bytes = wbc.jpeg_buf[..wbc.jpeg_len].to_vec();
                    wbc.jpeg_len = 0;
                    bytes
                } else {
                    Vec::new()
                }
            }
        }
    }
}
