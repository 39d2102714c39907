//! Shared `Transport`/`Pcm` state for the Bluetooth audio I/O engine.
//!
//! This crate holds the data model the control plane and the per-transport
//! worker threads both touch. The control plane mutates fields behind a
//! lock; workers read most fields advisorily without locking and write
//! only to the narrow whitelist of fields a worker itself owns (see the
//! module-level note on `Transport` below).

pub mod addr;
pub mod config;
pub mod error;

use parking_lot::Mutex;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU16, AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Weak};

/// Create a non-blocking, counting eventfd. Used for the transport's
/// event descriptor; inlined rather than pulled from `io-core` to
/// avoid a dependency cycle (`io-core` depends on `transport`, not the
/// other way around).
fn create_event_fd() -> RawFd {
    let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
    assert!(
        fd >= 0,
        "eventfd creation failed: {}",
        std::io::Error::last_os_error()
    );
    fd
}

pub use addr::BdAddr;
pub use config::Configuration;
pub use error::{Result, TransportError};

/// Which Bluetooth profile owns this transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    A2dpSource,
    A2dpSink,
    HfpAg,
    HfpHf,
    HspAg,
    HspHf,
}

impl Profile {
    pub const fn is_a2dp(self) -> bool {
        matches!(self, Profile::A2dpSource | Profile::A2dpSink)
    }

    pub const fn is_hfp_like(self) -> bool {
        !self.is_a2dp()
    }
}

/// Negotiated codec identity. Mirrors the Bluetooth SIG media codec IDs
/// used in the AVDTP/A2DP and HFP codec-negotiation procedures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CodecId {
    Sbc = 0x00,
    Mpeg12Audio = 0x01,
    Mpeg24Aac = 0x02,
    Cvsd = 0x80,
    Msbc = 0x81,
}

/// The four lifecycle states a transport moves through, matching the
/// A2DP/AVDTP stream-state machine the teacher's `SessionState` modeled,
/// generalized to cover the SCO/RFCOMM transports too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
    Idle = 0,
    Pending = 1,
    Active = 2,
    Aborted = 3,
}

impl State {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => State::Pending,
            2 => State::Active,
            3 => State::Aborted,
            _ => State::Idle,
        }
    }
}

/// Fields the control plane owns and mutates under `Transport::inner`.
/// Workers only read these, and only advisorily (no lock taken on the
/// hot path) -- see spec §5.
///
/// Covers all three transport shapes spec.md §3 describes (A2DP,
/// HFP/RFCOMM, HFP/SCO) as one flat bag rather than an enum with
/// payloads: a given profile only ever reads the subset that applies
/// to it, and the flat layout is what lets a worker take a single
/// lock/read instead of matching a variant before every field access.
#[derive(Debug, Clone)]
pub struct TransportInner {
    pub codec: CodecId,
    pub codec_config: Vec<u8>,
    pub pcm_path: Option<std::path::PathBuf>,
    /// A2DP: channel 1 (left, or the only channel when mono) volume, 0..=127.
    pub volume_ch1: u8,
    /// A2DP: channel 2 (right) volume, 0..=127. Unused for mono streams.
    pub volume_ch2: u8,
    pub muted_ch1: bool,
    pub muted_ch2: bool,
    /// HFP AG: HF features bitmask negotiated over `AT+BRSF` (component C9).
    pub hf_features: u16,
    /// HFP SCO: microphone gain reported by `AT+VGM`, 0..=15.
    pub mic_gain: u8,
    /// HFP SCO: speaker gain reported by `AT+VGS`, 0..=15.
    pub speaker_gain: u8,
}

impl Default for TransportInner {
    fn default() -> Self {
        Self {
            codec: CodecId::Sbc,
            codec_config: Vec::new(),
            pcm_path: None,
            volume_ch1: 127,
            volume_ch2: 127,
            muted_ch1: false,
            muted_ch2: false,
            hf_features: 0,
            mic_gain: 15,
            speaker_gain: 15,
        }
    }
}

/// One Bluetooth audio transport: an A2DP media stream, an HFP/HSP
/// RFCOMM control channel, or an HFP/HSP SCO voice channel.
///
/// Field ownership (spec §5 "shared mutable state"):
/// - `inner` is written by the control plane under its mutex; workers
///   read it without locking.
/// - `bt_fd`, `frame_counter` and `paired_sco_fd` are written *by the
///   worker itself*; the control plane only reads them (e.g. to decide
///   whether a transport is still alive).
pub struct Transport {
    pub profile: Profile,
    pub addr: BdAddr,
    /// Negotiated read MTU. Plain control-plane data for A2DP/RFCOMM,
    /// but the SCO worker (component C8) overwrites this itself once
    /// it auto-detects the CVSD wire MTU from the first packet
    /// (spec §4.8) -- hence an atomic rather than a plain field.
    read_mtu: AtomicU16,
    write_mtu: AtomicU16,
    state: AtomicU8,
    /// The counting "event FD" spec.md's data model calls out: created
    /// once per transport and never reassigned, so it's safe to hand
    /// its raw fd to a worker's poll set without synchronization.
    event_fd: RawFd,
    bt_fd: AtomicI32,
    /// Io-sync frame counter: frames transferred since stream start,
    /// written only by the worker thread that owns this transport.
    frame_counter: AtomicU32,
    /// For HFP: the SCO transport paired with an RFCOMM control
    /// transport (or vice versa), so a worker can find its sibling fd
    /// without a second lock acquisition.
    paired_sco_fd: AtomicI32,
    /// Back-reference to the paired HFP transport (RFCOMM <-> SCO), set by
    /// the control plane, which owns both ends. A `Weak` avoids the cyclic
    /// `Arc` ownership spec.md §9's design notes flag as an Open Question.
    paired: Mutex<Option<Weak<Transport>>>,
    /// A2DP: the single PCM endpoint. HFP/Sco: the speaker (playback)
    /// endpoint. Set by the control plane when a client attaches.
    pcm: Mutex<Option<Arc<Pcm>>>,
    /// HFP/Sco only: the microphone (capture) endpoint.
    pcm_mic: Mutex<Option<Arc<Pcm>>>,
    released: AtomicBool,
    pub inner: Mutex<TransportInner>,
    release_cb: Mutex<Option<Box<dyn FnMut() + Send>>>,
}

impl Transport {
    pub fn new(profile: Profile, addr: BdAddr, read_mtu: u16, write_mtu: u16) -> Arc<Self> {
        Arc::new(Self {
            profile,
            addr,
            read_mtu: AtomicU16::new(read_mtu),
            write_mtu: AtomicU16::new(write_mtu),
            state: AtomicU8::new(State::Idle as u8),
            event_fd: create_event_fd(),
            bt_fd: AtomicI32::new(-1),
            frame_counter: AtomicU32::new(0),
            paired_sco_fd: AtomicI32::new(-1),
            paired: Mutex::new(None),
            pcm: Mutex::new(None),
            pcm_mic: Mutex::new(None),
            released: AtomicBool::new(false),
            inner: Mutex::new(TransportInner::default()),
            release_cb: Mutex::new(None),
        })
    }

    pub fn state(&self) -> State {
        State::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: State) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Worker-owned: the raw Bluetooth socket fd, or -1 if not (yet)
    /// connected. Only the worker thread for this transport calls
    /// `set_bt_fd`; the control plane only reads it.
    pub fn bt_fd(&self) -> i32 {
        self.bt_fd.load(Ordering::Acquire)
    }

    pub fn set_bt_fd(&self, fd: i32) {
        self.bt_fd.store(fd, Ordering::Release);
    }

    pub fn read_mtu(&self) -> u16 {
        self.read_mtu.load(Ordering::Acquire)
    }

    pub fn write_mtu(&self) -> u16 {
        self.write_mtu.load(Ordering::Acquire)
    }

    /// Worker-owned: the SCO worker (component C8) calls this once it
    /// auto-detects the CVSD wire MTU from the first packet's length
    /// (spec §4.8), setting both directions to the observed value.
    pub fn set_mtu(&self, read_mtu: u16, write_mtu: u16) {
        self.read_mtu.store(read_mtu, Ordering::Release);
        self.write_mtu.store(write_mtu, Ordering::Release);
    }

    pub fn frame_counter(&self) -> u32 {
        self.frame_counter.load(Ordering::Relaxed)
    }

    pub fn advance_frame_counter(&self, frames: u32) -> u32 {
        self.frame_counter.fetch_add(frames, Ordering::Relaxed) + frames
    }

    pub fn reset_frame_counter(&self) {
        self.frame_counter.store(0, Ordering::Relaxed);
    }

    pub fn paired_sco_fd(&self) -> i32 {
        self.paired_sco_fd.load(Ordering::Acquire)
    }

    pub fn set_paired_sco_fd(&self, fd: i32) {
        self.paired_sco_fd.store(fd, Ordering::Release);
    }

    /// Control-plane setter: record the paired HFP transport (RFCOMM's
    /// SCO sibling, or vice versa).
    pub fn set_paired(&self, other: &Arc<Transport>) {
        *self.paired.lock() = Some(Arc::downgrade(other));
    }

    /// Upgrade the paired-transport back-reference, or `None` if the
    /// control plane never paired this transport or the sibling was
    /// already dropped.
    pub fn paired(&self) -> Option<Arc<Transport>> {
        self.paired.lock().as_ref().and_then(Weak::upgrade)
    }

    /// Control-plane setter: hand this transport its PCM endpoint (A2DP's
    /// only pipe, or HFP/Sco's speaker/playback pipe).
    pub fn set_pcm(&self, pcm: Option<Arc<Pcm>>) {
        *self.pcm.lock() = pcm;
    }

    pub fn pcm(&self) -> Option<Arc<Pcm>> {
        self.pcm.lock().clone()
    }

    /// Control-plane setter: HFP/Sco's microphone (capture) pipe.
    pub fn set_pcm_mic(&self, pcm: Option<Arc<Pcm>>) {
        *self.pcm_mic.lock() = pcm;
    }

    pub fn pcm_mic(&self) -> Option<Arc<Pcm>> {
        self.pcm_mic.lock().clone()
    }

    /// Register the callback to invoke when this transport is released.
    /// Matches spec.md's "release callback"; fires at most once.
    pub fn set_release_callback<F: FnMut() + Send + 'static>(&self, cb: F) {
        *self.release_cb.lock() = Some(Box::new(cb));
    }

    /// Release the transport, invoking the release callback exactly
    /// once even if called from multiple error paths concurrently
    /// (the Open Question this engine decided in favor of a guarded
    /// no-op rather than a panic on double release).
    pub fn release(&self) -> Result<()> {
        if self
            .released
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("transport {} already released, ignoring", self.addr);
            return Ok(());
        }

        self.set_state(State::Idle);
        self.set_bt_fd(-1);
        self.set_paired_sco_fd(-1);
        self.reset_frame_counter();

        if let Some(pcm) = self.pcm.lock().take() {
            pcm.release();
        }
        if let Some(pcm) = self.pcm_mic.lock().take() {
            pcm.release();
        }

        if let Some(cb) = self.release_cb.lock().as_mut() {
            cb();
        }
        Ok(())
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// The raw event descriptor a worker polls alongside its BT/PCM
    /// fds (spec §3 "event FD"). Stable for the transport's lifetime.
    pub fn event_fd(&self) -> RawFd {
        self.event_fd
    }

    /// Control-plane call: increment the event counter, waking any
    /// worker currently blocked in `poll` on this transport's event fd.
    pub fn signal_event(&self) {
        let one: u64 = 1;
        let ret = unsafe {
            libc::write(
                self.event_fd,
                &one as *const u64 as *const libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        debug_assert!(
            ret == 8 || std::io::Error::last_os_error().kind() == std::io::ErrorKind::WouldBlock
        );
    }

    /// Worker call: drain the event counter back to zero after `poll`
    /// reports this fd readable.
    pub fn drain_event(&self) {
        let mut buf: u64 = 0;
        loop {
            let ret = unsafe {
                libc::read(
                    self.event_fd,
                    &mut buf as *mut u64 as *mut libc::c_void,
                    std::mem::size_of::<u64>(),
                )
            };
            if ret >= 0 {
                return;
            }
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return;
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.event_fd);
        }
    }
}

/// PCM named-pipe endpoint handed to the control plane in exchange for a
/// transport acquisition, per spec §3/§4.1.
pub struct Pcm {
    pub path: std::path::PathBuf,
    fd: AtomicI32,
    released: AtomicBool,
    release_cb: Mutex<Option<Box<dyn FnMut() + Send>>>,
}

impl Pcm {
    pub fn new(path: std::path::PathBuf) -> Arc<Self> {
        Arc::new(Self {
            path,
            fd: AtomicI32::new(-1),
            released: AtomicBool::new(false),
            release_cb: Mutex::new(None),
        })
    }

    pub fn fd(&self) -> i32 {
        self.fd.load(Ordering::Acquire)
    }

    pub fn set_fd(&self, fd: i32) {
        self.fd.store(fd, Ordering::Release);
    }

    pub fn set_release_callback<F: FnMut() + Send + 'static>(&self, cb: F) {
        *self.release_cb.lock() = Some(Box::new(cb));
    }

    pub fn release(&self) {
        if self
            .released
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("pcm {:?} already released, ignoring", self.path);
            return;
        }
        self.set_fd(-1);
        if let Some(cb) = self.release_cb.lock().as_mut() {
            cb();
        }
    }
}

/// Io-sync snapshot: the mapping between a transport's frame stream and
/// wall-clock time, used by the rate pacer (C2) and exposed to the
/// control plane for drift reporting (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoSync {
    pub ts0: std::time::Duration,
    pub frames: u32,
    pub sampling_rate: u32,
}

impl IoSync {
    pub fn new(sampling_rate: u32) -> Self {
        Self {
            ts0: std::time::Duration::ZERO,
            frames: 0,
            sampling_rate,
        }
    }

    pub fn reset(&mut self, now: std::time::Duration) {
        self.ts0 = now;
        self.frames = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_fires_callback_exactly_once() {
        let t = Transport::new(Profile::A2dpSource, BdAddr::ANY, 672, 672);
        let count = Arc::new(AtomicU32::new(0));
        let count2 = count.clone();
        t.set_release_callback(move || {
            count2.fetch_add(1, Ordering::SeqCst);
        });

        t.release().unwrap();
        t.release().unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn release_resets_worker_owned_fields() {
        let t = Transport::new(Profile::A2dpSink, BdAddr::ANY, 672, 672);
        t.set_bt_fd(7);
        t.advance_frame_counter(128);
        t.set_state(State::Active);

        t.release().unwrap();

        assert_eq!(t.bt_fd(), -1);
        assert_eq!(t.frame_counter(), 0);
        assert_eq!(t.state(), State::Idle);
    }

    #[test]
    fn profile_classification() {
        assert!(Profile::A2dpSource.is_a2dp());
        assert!(Profile::HfpAg.is_hfp_like());
    }

    #[test]
    fn paired_transport_resolves_through_weak_ref() {
        let rfcomm = Transport::new(Profile::HfpAg, BdAddr::ANY, 64, 64);
        let sco = Transport::new(Profile::HfpAg, BdAddr::ANY, 48, 48);

        rfcomm.set_paired(&sco);
        sco.set_paired(&rfcomm);

        assert!(Arc::ptr_eq(&rfcomm.paired().unwrap(), &sco));
        assert!(Arc::ptr_eq(&sco.paired().unwrap(), &rfcomm));
    }

    #[test]
    fn event_fd_is_stable_and_signalable() {
        let t = Transport::new(Profile::A2dpSource, BdAddr::ANY, 672, 672);
        let fd = t.event_fd();
        assert!(fd >= 0);
        t.signal_event();
        t.drain_event();
        assert_eq!(t.event_fd(), fd);
    }

    #[test]
    fn release_clears_pcm_endpoints() {
        let t = Transport::new(Profile::A2dpSink, BdAddr::ANY, 672, 672);
        let pcm = Pcm::new(std::path::PathBuf::from("/tmp/test.pcm"));
        pcm.set_fd(9);
        t.set_pcm(Some(pcm.clone()));

        t.release().unwrap();

        assert_eq!(pcm.fd(), -1);
        assert!(t.pcm().is_none());
    }
}
