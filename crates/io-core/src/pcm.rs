//! PCM pipe I/O (spec §4.1, component C1): blocking open/read/write of
//! 16-bit little-endian PCM over the named pipe `transport::Pcm`
//! describes, plus the lifecycle (open, reopen, close-on-EOF/EPIPE)
//! the rest of the core's workers drive through.

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::RawFd;
use std::time::Duration;

use transport::Pcm;

use crate::error::{Result, WorkerError};

const WRITE_OPEN_RETRIES: u32 = 5;
const WRITE_OPEN_RETRY_DELAY: Duration = Duration::from_millis(10);

fn path_cstring(pcm: &Pcm) -> io::Result<CString> {
    CString::new(pcm.path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pipe path contains NUL"))
}

/// Open `pcm` for reading if not already open. Blocks until a writer
/// attaches to the FIFO (the kernel's usual open-on-FIFO semantics);
/// this is one of the worker's sanctioned suspension points (spec §5b).
pub fn open_for_read(pcm: &Pcm) -> io::Result<RawFd> {
    let existing = pcm.fd();
    if existing != -1 {
        return Ok(existing);
    }

    let path = path_cstring(pcm)?;
    let fd = unsafe { libc::open(path.as_ptr(), libc::O_RDONLY) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    pcm.set_fd(fd);
    Ok(fd)
}

/// Open `pcm` for writing if not already open. The FIFO may not have a
/// reader attached yet (the ALSA-side consumer hasn't opened its end),
/// so this retries a non-blocking open a handful of times before
/// giving up, per spec §4.1, then clears `O_NONBLOCK` on success so
/// subsequent writes block normally.
pub fn open_for_write(pcm: &Pcm) -> io::Result<RawFd> {
    let existing = pcm.fd();
    if existing != -1 {
        return Ok(existing);
    }

    let path = path_cstring(pcm)?;
    let mut last_err = io::Error::new(io::ErrorKind::NotFound, "pcm pipe never opened");

    for attempt in 0..WRITE_OPEN_RETRIES {
        let fd = unsafe { libc::open(path.as_ptr(), libc::O_WRONLY | libc::O_NONBLOCK) };
        if fd >= 0 {
            clear_nonblocking(fd)?;
            pcm.set_fd(fd);
            return Ok(fd);
        }
        last_err = io::Error::last_os_error();
        if attempt + 1 < WRITE_OPEN_RETRIES {
            std::thread::sleep(WRITE_OPEN_RETRY_DELAY);
        }
    }
    Err(last_err)
}

fn clear_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    let ret = unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Read exactly `samples.len()` 16-bit LE PCM samples from `pcm`,
/// retrying on `EINTR`. Returns the number of samples read: equal to
/// `samples.len()` on a full read, `0` on EOF (the writer closed its
/// end -- the release callback fires and the fd is cleared), or an
/// I/O error otherwise. Atomic: a short, non-EOF read never happens
/// here because the loop keeps retrying until the buffer is full.
pub fn read(pcm: &Pcm, samples: &mut [i16]) -> Result<usize> {
    let fd = pcm.fd();
    if fd < 0 {
        return Err(WorkerError::InvalidState("pcm not open for read"));
    }

    let want = samples.len() * 2;
    let mut buf = vec![0u8; want];
    let mut filled = 0usize;

    while filled < want {
        let ret = unsafe {
            libc::read(
                fd,
                buf.as_mut_ptr().add(filled) as *mut libc::c_void,
                want - filled,
            )
        };
        if ret > 0 {
            filled += ret as usize;
            continue;
        }
        if ret == 0 {
            pcm.release();
            return Ok(0);
        }
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            continue;
        }
        return Err(WorkerError::Io(err));
    }

    for (i, sample) in samples.iter_mut().enumerate() {
        *sample = i16::from_le_bytes([buf[2 * i], buf[2 * i + 1]]);
    }
    Ok(samples.len())
}

/// Write `samples.len()` 16-bit LE PCM samples to `pcm`, retrying on
/// `EINTR`. On a broken pipe (`EPIPE`), releases the PCM (closing and
/// clearing its fd) and returns `Ok(0)` per spec §4.1/§7; other errors
/// propagate. Atomic on success.
pub fn write(pcm: &Pcm, samples: &[i16]) -> Result<usize> {
    let fd = pcm.fd();
    if fd < 0 {
        return Err(WorkerError::InvalidState("pcm not open for write"));
    }

    let mut buf = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        buf.extend_from_slice(&sample.to_le_bytes());
    }

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
            io::ErrorKind::BrokenPipe => {
                pcm.release();
                return Ok(0);
            }
            _ => return Err(WorkerError::Io(err)),
        }
    }
    Ok(samples.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn make_fifo() -> (tempfile_path::TempFifo, Arc<Pcm>) {
        let fifo = tempfile_path::TempFifo::new();
        let pcm = Pcm::new(fifo.path.clone());
        (fifo, pcm)
    }

    /// Minimal `mkfifo` helper; avoids pulling in a `tempfile` dependency
    /// just for these tests.
    mod tempfile_path {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;
        use std::path::PathBuf;

        pub struct TempFifo {
            pub path: PathBuf,
        }

        impl TempFifo {
            pub fn new() -> Self {
                let path = std::env::temp_dir().join(format!(
                    "io-core-pcm-test-{}-{}",
                    std::process::id(),
                    super::fresh_id()
                ));
                let cpath = CString::new(path.as_os_str().as_bytes()).unwrap();
                let ret = unsafe { libc::mkfifo(cpath.as_ptr(), 0o600) };
                assert_eq!(ret, 0, "mkfifo failed: {}", std::io::Error::last_os_error());
                Self { path }
            }
        }

        impl Drop for TempFifo {
            fn drop(&mut self) {
                let _ = std::fs::remove_file(&self.path);
            }
        }
    }

    #[test]
    fn write_then_read_round_trips_samples() {
        let (_fifo, pcm) = make_fifo();
        let pcm_w = pcm.clone();
        let path = pcm.path.clone();

        let writer = std::thread::spawn(move || {
            open_for_write(&pcm_w).unwrap();
            write(&pcm_w, &[1, 2, 3, 4]).unwrap();
        });

        let reader_pcm = Pcm::new(path);
        open_for_read(&reader_pcm).unwrap();
        let mut out = [0i16; 4];
        let n = read(&reader_pcm, &mut out).unwrap();
        writer.join().unwrap();

        assert_eq!(n, 4);
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn read_returns_zero_and_releases_on_eof() {
        let (_fifo, pcm) = make_fifo();
        let path = pcm.path.clone();

        let writer_path = path.clone();
        let writer = std::thread::spawn(move || {
            let p = Pcm::new(writer_path);
            open_for_write(&p).unwrap();
            // Drop closes the write end immediately, producing EOF.
        });

        let reader_pcm = Pcm::new(path);
        open_for_read(&reader_pcm).unwrap();
        writer.join().unwrap();

        let mut out = [0i16; 4];
        let n = read(&reader_pcm, &mut out).unwrap();
        assert_eq!(n, 0);
        assert_eq!(reader_pcm.fd(), -1);
    }

    fn fresh_id() -> u64 {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        COUNTER.fetch_add(1, Ordering::Relaxed)
    }
}
