//! Multi-FD wait (spec §5's suspension point (a)): each worker blocks
//! on a small, fixed set of file descriptors -- its event signal, the
//! Bluetooth socket, and up to two PCM pipes -- using `poll(2)` rather
//! than a dedicated async runtime, matching the teacher's preference
//! for directly-driven, no-hidden-scheduler I/O.

use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

/// Up to 4 fds watched for readability in one `poll(2)` call: event,
/// BT/RFCOMM/SCO socket, and up to two PCM pipes (SCO needs both
/// speaker and mic).
pub const MAX_WATCHED_FDS: usize = 4;

/// One fd's readiness after a `wait` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    pub readable: bool,
    pub hup: bool,
}

/// Wait for any of `fds` (skipping any equal to `-1`, meaning "not
/// currently open") to become readable, or `timeout` to elapse.
/// Retries on `EINTR`. Returns one [`Readiness`] per input fd, in the
/// same order.
pub fn wait(
    fds: &[RawFd],
    timeout: Option<Duration>,
) -> io::Result<[Readiness; MAX_WATCHED_FDS]> {
    assert!(fds.len() <= MAX_WATCHED_FDS);

    let mut pollfds = [libc::pollfd {
        fd: -1,
        events: 0,
        revents: 0,
    }; MAX_WATCHED_FDS];
    for (i, &fd) in fds.iter().enumerate() {
        pollfds[i].fd = fd;
        pollfds[i].events = libc::POLLIN;
    }

    let timeout_ms = match timeout {
        Some(d) => d.as_millis().min(i32::MAX as u128) as i32,
        None => -1,
    };

    loop {
        let ret = unsafe { libc::poll(pollfds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        break;
    }

    let mut out = [Readiness::default(); MAX_WATCHED_FDS];
    for (i, pfd) in pollfds.iter().enumerate().take(fds.len()) {
        if fds[i] < 0 {
            continue;
        }
        out[i] = Readiness {
            readable: pfd.revents & libc::POLLIN != 0,
            hup: pfd.revents & (libc::POLLHUP | libc::POLLERR) != 0,
        };
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::io::AsRawFd;

    #[test]
    fn reports_readability_on_a_pipe() {
        let (mut read_end, mut write_end) = {
            let mut fds = [0i32; 2];
            assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
            use std::os::unix::io::FromRawFd;
            unsafe {
                (
                    std::fs::File::from_raw_fd(fds[0]),
                    std::fs::File::from_raw_fd(fds[1]),
                )
            }
        };
        use std::io::Write;
        write_end.write_all(b"x").unwrap();

        let fds = [read_end.as_raw_fd(), -1, -1, -1];
        let readiness = wait(&fds, Some(Duration::from_millis(100))).unwrap();
        assert!(readiness[0].readable);
        assert!(!readiness[1].readable);

        drop(write_end);
        let mut buf = [0u8; 1];
        use std::io::Read;
        read_end.read_exact(&mut buf).unwrap();
    }

    #[test]
    fn times_out_when_nothing_ready() {
        let fds = [-1, -1, -1, -1];
        let readiness = wait(&fds, Some(Duration::from_millis(10))).unwrap();
        assert!(readiness.iter().all(|r| !r.readable));
    }
}
