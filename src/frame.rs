// ABOUTME: Streaming frame parser implementing the HEAD/CMD/LEN/DISPATCH state machine
// ABOUTME: Header-only parsing; payload bytes are read inline by the dispatcher, not buffered here

use crate::command::{Command, FRAME_SYNC};
use crate::error::CodecError;

/// A decoded frame header: the command byte and declared payload length.
/// Handlers that need the payload read it themselves off the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub command: Command,
    pub declared_length: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Head,
    Cmd,
    Len { have: usize, bytes: [u8; 4] },
}

/// Incremental parser over header bytes. The original's RECV state (used to
/// span a chunk boundary mid-length-field) is folded into [`Phase::Len`]'s
/// partial accumulator here.
pub struct FrameParser {
    phase: Phase,
    cmd: u8,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    pub fn new() -> Self {
        Self {
            phase: Phase::Head,
            cmd: 0,
        }
    }

    /// Feed one byte at a time. Returns `Some(header)` the instant a full
    /// 6-byte header has been assembled, resetting back to `HEAD` afterward.
    /// Unknown command bytes are reported and the parser still returns to
    /// `HEAD`, matching the original's ignore-and-continue behavior.
    pub fn feed(&mut self, byte: u8) -> Result<Option<FrameHeader>, CodecError> {
        match self.phase {
            Phase::Head => {
                if byte == FRAME_SYNC {
                    self.phase = Phase::Cmd;
                }
                Ok(None)
            }
            Phase::Cmd => {
                self.cmd = byte;
                self.phase = Phase::Len {
                    have: 0,
                    bytes: [0; 4],
                };
                Ok(None)
            }
            Phase::Len { mut have, mut bytes } => {
                bytes[have] = byte;
                have += 1;
                if have < 4 {
                    self.phase = Phase::Len { have, bytes };
                    return Ok(None);
                }
                self.phase = Phase::Head;
                let declared_length = u32::from_le_bytes(bytes);
                match Command::try_from(self.cmd) {
                    Ok(command) => Ok(Some(FrameHeader {
                        command,
                        declared_length,
                    })),
                    Err(_) => {
                        tracing::warn!(cmd = format!("0x{:02X}", self.cmd), "unknown command");
                        Err(CodecError::UnknownCommand(self.cmd))
                    }
                }
            }
        }
    }

    /// Feed a whole buffer, invoking `on_header` for each parsed frame. Bytes
    /// consumed by a handler's inline payload read are not passed through
    /// this parser at all; callers interleave `feed` calls with their own
    /// transport reads once `on_header` fires.
    pub fn feed_all(&mut self, data: &[u8], mut on_header: impl FnMut(FrameHeader)) {
        for &byte in data {
            match self.feed(byte) {
                Ok(Some(header)) => on_header(header),
                Ok(None) => {}
                Err(_) => {} // unknown command already logged; parser is back at HEAD
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(bytes: &[u8]) -> Option<FrameHeader> {
        let mut parser = FrameParser::new();
        let mut found = None;
        for &b in bytes {
            if let Ok(Some(h)) = parser.feed(b) {
                found = Some(h);
            }
        }
        found
    }

    #[test]
    fn parses_query_status_header() {
        let header = parse_one(&[0x30, 0x80, 0x00, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(header.command, Command::QueryStatus);
        assert_eq!(header.declared_length, 0);
    }

    #[test]
    fn parses_script_exec_with_declared_length() {
        let header = parse_one(&[0x30, 0x05, 0x04, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(header.command, Command::ScriptExec);
        assert_eq!(header.declared_length, 4);
    }

    #[test]
    fn skips_garbage_before_sync_byte() {
        let header = parse_one(&[0xFF, 0xFF, 0x30, 0x82, 0x00, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(header.command, Command::ScriptRunning);
    }

    #[test]
    fn unknown_command_returns_to_head_and_resyncs() {
        let mut parser = FrameParser::new();
        let mut headers = vec![];
        let stream = [
            0x30, 0xFE, 0x00, 0x00, 0x00, 0x00, // unknown cmd
            0x30, 0x80, 0x00, 0x00, 0x00, 0x00, // valid frame follows
        ];
        for &b in &stream {
            if let Ok(Some(h)) = parser.feed(b) {
                headers.push(h);
            }
        }
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].command, Command::QueryStatus);
    }

    #[test]
    fn length_field_spans_chunk_boundary() {
        let mut parser = FrameParser::new();
        assert!(parser.feed(0x30).unwrap().is_none());
        assert!(parser.feed(0x05).unwrap().is_none());
        assert!(parser.feed(0x04).unwrap().is_none());
        assert!(parser.feed(0x00).unwrap().is_none());
        // chunk boundary here
        assert!(parser.feed(0x00).unwrap().is_none());
        let header = parser.feed(0x00).unwrap().unwrap();
        assert_eq!(header.command, Command::ScriptExec);
        assert_eq!(header.declared_length, 4);
    }
}
