//! The "event fd" in the transport's data model (spec §3): a counting
//! signal the control plane raises to wake a blocked worker -- to push
//! volume changes, ask it to resync its pacing, or tell it to shut
//! down -- without the worker ever polling on a timer.

use std::io;
use std::os::unix::io::RawFd;

/// Linux `eventfd(2)` wrapper, used as a counting semaphore a worker
/// can `poll` alongside its BT and PCM fds.
pub struct EventSignal {
    fd: RawFd,
}

impl EventSignal {
    /// Create a new, non-blocking eventfd starting at count 0.
    pub fn new() -> io::Result<Self> {
        let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { fd })
    }

    pub fn raw_fd(&self) -> RawFd {
        self.fd
    }

    /// Increment the counter by one, waking anyone polling this fd.
    pub fn signal(&self) {
        let one: u64 = 1;
        let ret = unsafe {
            libc::write(
                self.fd,
                &one as *const u64 as *const libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        // A full eventfd counter (EAGAIN) just means a pending wakeup
        // is already queued; nothing further to do.
        debug_assert!(ret == 8 || io::Error::last_os_error().kind() == io::ErrorKind::WouldBlock);
    }

    /// Drain the counter back to zero. Call after `poll` reports this
    /// fd readable, before re-checking worker state.
    pub fn drain(&self) {
        let mut buf: u64 = 0;
        loop {
            let ret = unsafe {
                libc::read(
                    self.fd,
                    &mut buf as *mut u64 as *mut libc::c_void,
                    std::mem::size_of::<u64>(),
                )
            };
            if ret >= 0 {
                return;
            }
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            // WouldBlock: counter was already zero, nothing to drain.
            return;
        }
    }
}

impl Drop for EventSignal {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

unsafe impl Send for EventSignal {}
unsafe impl Sync for EventSignal {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::{wait, Readiness};
    use std::time::Duration;

    #[test]
    fn signal_wakes_poll_and_drain_clears_it() {
        let ev = EventSignal::new().unwrap();
        let fds = [ev.raw_fd(), -1, -1, -1];

        let before = wait(&fds, Some(Duration::from_millis(10))).unwrap();
        assert_eq!(before[0], Readiness::default());

        ev.signal();
        let after = wait(&fds, Some(Duration::from_millis(100))).unwrap();
        assert!(after[0].readable);

        ev.drain();
        let post_drain = wait(&fds, Some(Duration::from_millis(10))).unwrap();
        assert!(!post_drain[0].readable);
    }

    #[test]
    fn signal_is_idempotent_as_a_counter() {
        let ev = EventSignal::new().unwrap();
        ev.signal();
        ev.signal();
        ev.signal();
        let fds = [ev.raw_fd(), -1, -1, -1];
        let readiness = wait(&fds, Some(Duration::from_millis(100))).unwrap();
        assert!(readiness[0].readable);
        ev.drain();
        let post = wait(&fds, Some(Duration::from_millis(10))).unwrap();
        assert!(!post[0].readable);
    }
}
