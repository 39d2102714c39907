//! Process-wide signal masking (spec §9 design note).
//!
//! The engine requires `SIGPIPE` to be ignored before any PCM pipe
//! writes happen, so a broken pipe surfaces as `EPIPE` on the failing
//! `write(2)` rather than terminating the process. Per spec.md's design
//! notes this is a *host* responsibility, not something a worker should
//! do on every write call -- this function exists so the binary that
//! embeds this core can call it once, at startup, the same way the
//! teacher's top-level binary installs its panic handler.

/// Ignore `SIGPIPE` process-wide. Idempotent; safe to call more than
/// once. Must be called before the first PCM/BT socket write.
pub fn ignore_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }
}
