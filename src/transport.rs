// ABOUTME: Blocking byte transport over a raw character-device file descriptor
// ABOUTME: Writes are chunked at <=1KiB per syscall; reads use select(2) with a timeout

use crate::error::TransportError;
use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

/// Maximum bytes written to the transport in a single `write(2)` call.
pub const MAX_WRITE_CHUNK: usize = 1024;

/// A duplex byte transport. Implemented over a raw fd in [`FdTransport`]; a
/// trait so tests and `demos/` can substitute an in-memory pipe.
pub trait Transport: Send {
    /// Block up to `timeout` waiting for readable bytes, then read into `buf`.
    /// Returns `Ok(0)` on timeout (mirrors a `select()` expiry), `Ok(n)` on
    /// `n` bytes read.
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError>;

    /// Write all of `data`, chunked at [`MAX_WRITE_CHUNK`] bytes per call.
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Whether the transport's exception set is currently signaled (RTS/break).
    fn exception_pending(&mut self) -> bool;
}

/// A `Transport` backed by a POSIX character device opened read-write.
pub struct FdTransport {
    fd: RawFd,
}

impl FdTransport {
    /// Open `path` read-write, as the original does for `/dev/ttyUSB`.
    pub fn open(path: &str) -> Result<Self, TransportError> {
        let c_path = std::ffi::CString::new(path)
            .map_err(|_| TransportError::Io(io::Error::from(io::ErrorKind::InvalidInput)))?;
        let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDWR | libc::O_NOCTTY) };
        if fd < 0 {
            return Err(TransportError::Io(io::Error::last_os_error()));
        }
        Ok(Self { fd })
    }

    /// Wrap an already-open fd (used by tests and `demos/`).
    pub fn from_raw_fd(fd: RawFd) -> Self {
        Self { fd }
    }

    fn select_readable(&self, timeout: Duration) -> Result<bool, TransportError> {
        let mut read_fds: libc::fd_set = unsafe { std::mem::zeroed() };
        unsafe {
            libc::FD_ZERO(&mut read_fds);
            libc::FD_SET(self.fd, &mut read_fds);
        }
        let mut tv = libc::timeval {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_usec: timeout.subsec_micros() as libc::suseconds_t,
        };
        let ready = unsafe {
            libc::select(
                self.fd + 1,
                &mut read_fds,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                &mut tv,
            )
        };
        if ready < 0 {
            return Err(TransportError::Io(io::Error::last_os_error()));
        }
        Ok(ready > 0)
    }
}

impl Transport for FdTransport {
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        if !self.select_readable(timeout)? {
            return Ok(0);
        }
        let n = unsafe { libc::read(self.fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n < 0 {
            return Err(TransportError::Io(io::Error::last_os_error()));
        }
        Ok(n as usize)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        for chunk in data.chunks(MAX_WRITE_CHUNK) {
            let mut written = 0;
            while written < chunk.len() {
                let n = unsafe {
                    libc::write(
                        self.fd,
                        chunk[written..].as_ptr() as *const libc::c_void,
                        chunk.len() - written,
                    )
                };
                if n < 0 {
                    return Err(TransportError::Io(io::Error::last_os_error()));
                }
                written += n as usize;
            }
        }
        Ok(())
    }

    fn exception_pending(&mut self) -> bool {
        let mut exc_fds: libc::fd_set = unsafe { std::mem::zeroed() };
        unsafe {
            libc::FD_ZERO(&mut exc_fds);
            libc::FD_SET(self.fd, &mut exc_fds);
        }
        let mut tv = libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        let ready = unsafe {
            libc::select(
                self.fd + 1,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                &mut exc_fds,
                &mut tv,
            )
        };
        ready > 0
    }
}

impl Drop for FdTransport {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

/// In-memory transport for exercising dispatcher logic without a real fd.
/// Exposed (not only under `#[cfg(test)] mod tests`) so other modules' tests
/// can depend on it too.
#[cfg(test)]
pub mod test_support {
    use super::*;

    pub struct MemTransport {
        pub inbound: std::collections::VecDeque<u8>,
        pub outbound: Vec<u8>,
    }

    impl MemTransport {
        pub fn new(inbound: &[u8]) -> Self {
            Self {
                inbound: inbound.iter().copied().collect(),
                outbound: Vec::new(),
            }
        }
    }

    impl Transport for MemTransport {
        fn read_timeout(
            &mut self,
            buf: &mut [u8],
            _timeout: Duration,
        ) -> Result<usize, TransportError> {
            let n = buf.len().min(self.inbound.len());
            for slot in buf.iter_mut().take(n) {
                *slot = self.inbound.pop_front().unwrap();
            }
            Ok(n)
        }

        fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
            self.outbound.extend_from_slice(data);
            Ok(())
        }

        fn exception_pending(&mut self) -> bool {
            false
        }
    }

    #[test]
    fn mem_transport_read_drains_inbound_in_order() {
        let mut t = MemTransport::new(b"abc");
        let mut buf = [0u8; 2];
        let n = t.read_timeout(&mut buf, Duration::from_millis(0)).unwrap();
        assert_eq!(n, 2);
        assert_eq!(&buf[..2], b"ab");
    }

    #[test]
    fn mem_transport_write_all_accumulates_outbound() {
        let mut t = MemTransport::new(b"");
        t.write_all(b"hello").unwrap();
        t.write_all(b" world").unwrap();
        assert_eq!(t.outbound, b"hello world");
    }
}
