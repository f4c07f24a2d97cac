// ABOUTME: Crate-wide error types for the debug link, one enum per subsystem
// ABOUTME: All subsystem errors convert into the top-level `LinkError` via `#[from]`

use std::io;
use thiserror::Error;

/// Errors arising while decoding frames off the transport.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame header truncated, need {needed} more bytes")]
    Incomplete { needed: usize },

    #[error("unknown command byte 0x{0:02X}")]
    UnknownCommand(u8),

    #[error("declared payload length {0} exceeds the maximum frame size")]
    PayloadTooLarge(u32),
}

/// Errors from the raw-fd byte transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("transport device is not open")]
    NotOpen,

    #[error("read timed out")]
    Timeout,
}

/// Errors from the file-upload engine. These never abort a frame; handlers map
/// them to the wire-level `FileErrCode` and keep the protocol moving.
#[derive(Debug, Error)]
pub enum FileUploadError {
    #[error("no file is open for writing")]
    NotOpen,

    #[error("file I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("write of {given} bytes exceeds the negotiated chunk size {chunk_size}")]
    ChunkTooLarge { given: u32, chunk_size: u32 },

    #[error("hash mismatch on verify")]
    HashMismatch,
}

/// Top-level error type returned by fallible public entry points.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    FileUpload(#[from] FileUploadError),

    #[error("transport device failed to open: {0}")]
    Init(io::Error),
}

/// Convenience alias mirrored on the crate's public error type.
pub type Result<T> = std::result::Result<T, LinkError>;
