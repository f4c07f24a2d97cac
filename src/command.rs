// ABOUTME: Wire command codes, handshake tokens and other literal byte constants
// ABOUTME: Command values below 0x80 are request/control commands, 0x80+ are poll/query commands

use num_enum::TryFromPrimitive;

/// One IDE-protocol command byte.
///
/// Code values are reconstructed from the literal hex scenarios rather than
/// transcribed from an upstream header (none was available); see `DESIGN.md`
/// for the anchor values and the convention used to fill in the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum Command {
    /// Begin a file upload (payload = `CreateFileInfo`).
    CreateFile = 0x01,
    /// Persist the last-uploaded script to non-volatile storage (reserved).
    ScriptSave = 0x02,
    /// Reset the device-side attach state.
    SysReset = 0x03,
    /// Enable or disable framebuffer preview staging (payload byte 0 = bool).
    FbEnable = 0x04,
    /// Start executing an uploaded script (payload = script source).
    ScriptExec = 0x05,
    /// Interrupt the running script.
    ScriptStop = 0x06,
    /// Append a chunk to the open upload (payload = chunk bytes).
    WriteFile = 0x07,
    /// Close and SHA-256 verify the open upload.
    VerifyFile = 0x08,

    /// Liveness probe; always returns `0xFFEEBBAA`.
    QueryStatus = 0x80,
    /// Returns `{major, minor, micro}` as three little-endian u32s.
    FwVersion = 0x88,
    /// Returns a zero-padded 64-byte architecture/board/UID string.
    ArchStr = 0x81,
    /// Returns whether a script is currently running.
    ScriptRunning = 0x82,
    /// Returns the readable byte count of the stdout ring.
    TxBufLen = 0x83,
    /// Drains up to N bytes from the stdout ring.
    TxBuf = 0x84,
    /// Returns the last file-upload error code.
    QueryFileStat = 0x85,
    /// Latches the current frame source and returns its `{w, h, size}`.
    FrameSize = 0x86,
    /// Returns the bytes staged by the preceding `FrameSize`.
    FrameDump = 0x87,
}

/// File-upload status codes returned by `QueryFileStat` and set internally by
/// the file-upload engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
pub enum FileErrCode {
    None = 0,
    OpenErr = 1,
    PathErr = 2,
    WriteErr = 3,
}

/// Result codes returned by `VerifyFile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
pub enum VerifyCode {
    None = 0,
    NotOpen = 1,
    Sha2Err = 2,
}

/// Six-byte sync sequences sent by known host tools to move the link from
/// REPL-routing into attached (protocol) mode.
pub const HANDSHAKE_TOKENS: &[[u8; 6]] = &[
    [0x30, 0x8D, 0x04, 0x00, 0x00, 0x00], // CanMV IDE
    [0x30, 0x80, 0x0C, 0x00, 0x00, 0x00], // OpenMV IDE
    [0x30, 0x87, 0x04, 0x00, 0x00, 0x00],
];

/// REPL lines emitted by some host tools as part of connection setup; these
/// are device-local noise and are dropped rather than echoed into the
/// scripting runtime's stdin.
pub const MOCK_REPL_LINES: &[&[u8]] = &[
    b"from machine import UART\r",
    b"repl = UART.repl_uart()\r",
    b"repl.init(1500000, 8, None, 1, read_buf_len=2048, ide=True)\r",
];

/// Sync byte that opens every frame.
pub const FRAME_SYNC: u8 = 0x30;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_status_matches_scenario_anchor() {
        assert_eq!(Command::QueryStatus as u8, 0x80);
    }

    #[test]
    fn fw_version_matches_scenario_anchor() {
        assert_eq!(Command::FwVersion as u8, 0x88);
    }

    #[test]
    fn script_exec_and_stop_match_scenario_anchors() {
        assert_eq!(Command::ScriptExec as u8, 0x05);
        assert_eq!(Command::ScriptStop as u8, 0x06);
    }

    #[test]
    fn unknown_byte_does_not_parse() {
        assert!(Command::try_from(0xFE).is_err());
    }
}
