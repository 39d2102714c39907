//! Bluetooth transport socket I/O: thin wrappers around `read(2)`/
//! `write(2)` on the raw L2CAP/RFCOMM/SCO socket fd that retry on
//! `EINTR` and classify the "peer closed" errors spec §7 calls out
//! (`ECONNRESET`/`ENOTCONN` on write, `0`-length on read) so every
//! worker doesn't have to re-derive that logic.

use std::io;
use std::os::unix::io::RawFd;

use crate::error::{Result, WorkerError};

/// Read up to `buf.len()` bytes from `fd`, retrying on `EINTR`.
/// Returns `Ok(0)` on EOF (peer closed its write side).
pub fn read(fd: RawFd, buf: &mut [u8]) -> Result<usize> {
    loop {
        let ret = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if ret >= 0 {
            return Ok(ret as usize);
        }
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            continue;
        }
        return Err(WorkerError::Io(err));
    }
}

/// Write all of `buf` to `fd`, retrying on `EINTR`. A `ECONNRESET`/
/// `ENOTCONN` failure -- the peer tore down the connection -- is
/// reported as [`WorkerError::PeerClosed`] so the caller can exit its
/// worker loop per spec §7; other errors are returned as-is and the
/// caller decides whether to log-and-continue.
pub fn write_all(fd: RawFd, buf: &[u8]) -> Result<()> {
    let mut written = 0usize;
    while written < buf.len() {
        let ret = unsafe {
            libc::write(
                fd,
                buf.as_ptr().add(written) as *const libc::c_void,
                buf.len() - written,
            )
        };
        if ret >= 0 {
            written += ret as usize;
            continue;
        }
        let err = io::Error::last_os_error();
        match err.kind() {
            io::ErrorKind::Interrupted => continue,
            _ if is_peer_closed(&err) => return Err(WorkerError::PeerClosed),
            _ => return Err(WorkerError::Io(err)),
        }
    }
    Ok(())
}

/// Matches spec §7's "peer closed" disposition for BT socket writes:
/// `ECONNRESET` or `ENOTCONN`.
pub fn is_peer_closed(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::ECONNRESET) | Some(libc::ENOTCONN)
    )
}

pub fn set_nonblocking(fd: RawFd, nonblocking: bool) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    let new_flags = if nonblocking {
        flags | libc::O_NONBLOCK
    } else {
        flags & !libc::O_NONBLOCK
    };
    let ret = unsafe { libc::fcntl(fd, libc::F_SETFL, new_flags) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

pub fn close(fd: RawFd) {
    if fd >= 0 {
        unsafe {
            libc::close(fd);
        }
    }
}
