// ABOUTME: Fluent configuration for the debug link, mirroring the teacher's builder-style configs
// ABOUTME: Replaces the original's hardcoded #define constants (device path, upload root, board identity)

use std::time::Duration;

/// Configuration for a `DebugLink` instance.
///
/// # Example
///
/// ```rust
/// use ide_dbg::LinkConfig;
/// use std::time::Duration;
///
/// let config = LinkConfig::new("/dev/ttyUSB0")
///     .with_upload_root("/sdcard")
///     .with_rts_rate_limit(Duration::from_secs(1));
/// ```
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Path to the USB CDC character device.
    pub device_path: String,

    /// Root directory under which `CREATEFILE` names are resolved.
    pub upload_root: String,

    /// Architecture identifier reported by `ARCH_STR`.
    pub arch_str: String,

    /// Board type identifier reported by `ARCH_STR`.
    pub board_type: String,

    /// Unique device identifier reported by `ARCH_STR`.
    pub device_uid: String,

    /// Minimum spacing between acted-upon RTS/break events (default: 1s).
    pub rts_rate_limit: Duration,

    /// Read timeout on the transport device (default: 1s).
    pub read_timeout: Duration,

    /// Firmware version reported by `FW_VERSION`.
    pub firmware_version: (u32, u32, u32),
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            device_path: "/dev/ttyUSB0".to_string(),
            upload_root: "/sdcard".to_string(),
            arch_str: "UNKNOWN".to_string(),
            board_type: "UNKNOWN".to_string(),
            device_uid: "000000000000".to_string(),
            rts_rate_limit: Duration::from_secs(1),
            read_timeout: Duration::from_secs(1),
            firmware_version: (0, 0, 0),
        }
    }
}

impl LinkConfig {
    /// Create a configuration pointed at the given transport device path.
    pub fn new(device_path: impl Into<String>) -> Self {
        Self {
            device_path: device_path.into(),
            ..Self::default()
        }
    }

    pub fn with_upload_root(mut self, root: impl Into<String>) -> Self {
        self.upload_root = root.into();
        self
    }

    pub fn with_arch(mut self, arch: impl Into<String>, board: impl Into<String>) -> Self {
        self.arch_str = arch.into();
        self.board_type = board.into();
        self
    }

    pub fn with_device_uid(mut self, uid: impl Into<String>) -> Self {
        self.device_uid = uid.into();
        self
    }

    pub fn with_rts_rate_limit(mut self, limit: Duration) -> Self {
        self.rts_rate_limit = limit;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_firmware_version(mut self, major: u32, minor: u32, micro: u32) -> Self {
        self.firmware_version = (major, minor, micro);
        self
    }

    /// Render the `ARCH_STR` response: a zero-padded 64-byte ASCII buffer.
    pub fn arch_response(&self) -> [u8; 64] {
        let s = format!(
            "{} [{}:{}]",
            self.arch_str, self.board_type, self.device_uid
        );
        let mut buf = [0u8; 64];
        let bytes = s.as_bytes();
        let n = bytes.len().min(64);
        buf[..n].copy_from_slice(&bytes[..n]);
        buf
    }
}
