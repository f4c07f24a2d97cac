// ABOUTME: CREATEFILE -> WRITEFILE* -> VERIFYFILE state machine with streaming SHA-256 verify
// ABOUTME: WRITEFILE always drains its declared payload, even on a precondition error (see DESIGN.md)

use crate::command::{FileErrCode, VerifyCode};
use crate::error::FileUploadError;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;

/// The on-wire `CREATEFILE` payload: chunk size, target name, and the
/// expected SHA-256 of the finished upload.
#[derive(Debug, Clone)]
pub struct CreateFileInfo {
    pub chunk_size: u32,
    pub name: String,
    pub sha256: [u8; 32],
}

impl CreateFileInfo {
    /// Decode the fixed-layout `{u32 chunk_size, name[..], u8 sha256[32]}`
    /// record. `name` occupies every byte between the 4-byte chunk_size
    /// prefix and the trailing 32-byte digest, NUL-terminated within that
    /// span.
    pub fn decode(buf: &[u8]) -> Result<Self, FileUploadError> {
        if buf.len() < 4 + 32 {
            return Err(FileUploadError::Io(std::io::Error::from(
                std::io::ErrorKind::UnexpectedEof,
            )));
        }
        let chunk_size = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        let name_bytes = &buf[4..buf.len() - 32];
        let nul = name_bytes.iter().position(|&b| b == 0).unwrap_or(name_bytes.len());
        let name = String::from_utf8_lossy(&name_bytes[..nul]).into_owned();
        let mut sha256 = [0u8; 32];
        sha256.copy_from_slice(&buf[buf.len() - 32..]);
        Ok(Self {
            chunk_size,
            name,
            sha256,
        })
    }
}

/// The file-upload engine's persistent state across `CREATEFILE`,
/// `WRITEFILE`, and `VERIFYFILE` calls.
pub struct FileUploadContext {
    root: PathBuf,
    open: Option<(File, PathBuf, CreateFileInfo)>,
    pub last_errcode: FileErrCode,
}

impl FileUploadContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            open: None,
            last_errcode: FileErrCode::None,
        }
    }

    /// `CREATEFILE`: close/free any prior context, then truncate-create the
    /// new target under the configured root.
    pub fn create(&mut self, info: CreateFileInfo) {
        self.open = None;
        let path = self.root.join(&info.name);
        match File::create(&path) {
            Ok(file) => {
                self.open = Some((file, path, info));
                self.last_errcode = FileErrCode::None;
            }
            Err(_) => {
                self.last_errcode = FileErrCode::OpenErr;
            }
        }
    }

    /// `WRITEFILE`: append `data` to the open file. Bytes are the caller's
    /// responsibility to have already drained from the transport regardless
    /// of the result returned here (REDESIGN FLAGS: unconditional drain).
    pub fn write_chunk(&mut self, data: &[u8]) -> Result<(), FileUploadError> {
        let Some((file, _, info)) = &mut self.open else {
            self.last_errcode = FileErrCode::WriteErr;
            return Err(FileUploadError::NotOpen);
        };
        if data.len() as u32 > info.chunk_size {
            self.last_errcode = FileErrCode::WriteErr;
            return Err(FileUploadError::ChunkTooLarge {
                given: data.len() as u32,
                chunk_size: info.chunk_size,
            });
        }
        if file.write_all(data).is_err() {
            self.last_errcode = FileErrCode::WriteErr;
            return Err(FileUploadError::Io(std::io::Error::from(
                std::io::ErrorKind::Other,
            )));
        }
        Ok(())
    }

    /// `VERIFYFILE`: close the file, reopen it read-only, stream its
    /// contents through SHA-256, and compare to the digest supplied at
    /// `CREATEFILE` time. Always returns the context to idle.
    pub fn verify(&mut self) -> VerifyCode {
        let Some((_, path, info)) = self.open.take() else {
            return VerifyCode::NotOpen;
        };
        let mut file = match File::open(&path) {
            Ok(f) => f,
            Err(_) => return VerifyCode::NotOpen,
        };
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 8192];
        loop {
            match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => hasher.update(&buf[..n]),
                Err(_) => return VerifyCode::NotOpen,
            }
        }
        let digest: [u8; 32] = hasher.finalize().into();
        if digest == info.sha256 {
            VerifyCode::None
        } else {
            VerifyCode::Sha2Err
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }
}
