//! Rate pacer (spec §4.2, component C2)
//!
//! Keeps transmission from running more than a fixed window ahead of the
//! audio clock: each time a worker is about to push a chunk of encoded
//! audio, it asks the pacer how long to sleep first so the wall-clock
//! rate of bytes-out tracks the wall-clock rate of a hypothetical
//! playback device, rather than bursting as fast as the BT socket allows.

use std::time::{Duration, Instant};

/// Maximum amount of time a transport is allowed to run ahead of the
/// audio clock before the pacer holds it back.
pub const MAX_LEAD: Duration = Duration::from_millis(10);

/// Tracks the mapping between frames sent and wall-clock time for one
/// transport, and tells the caller how long to sleep before the next
/// send so it does not outrun `MAX_LEAD`.
pub struct Pacer {
    sampling_rate: u32,
    start: Instant,
    frames_sent: u64,
}

impl Pacer {
    pub fn new(sampling_rate: u32) -> Self {
        Self {
            sampling_rate,
            start: Instant::now(),
            frames_sent: 0,
        }
    }

    /// Reset the pacer's clock origin, e.g. after a stream resume.
    pub fn reset(&mut self) {
        self.start = Instant::now();
        self.frames_sent = 0;
    }

    /// Time that `frames_sent` worth of audio represents.
    fn audio_time(&self) -> Duration {
        Duration::from_secs_f64(self.frames_sent as f64 / self.sampling_rate as f64)
    }

    /// How far ahead of the audio clock this transport currently is.
    /// A positive value means the transport has sent more audio than
    /// wall-clock time has elapsed for.
    pub fn lead(&self) -> Duration {
        self.audio_time().saturating_sub(self.start.elapsed())
    }

    /// Record that `frames` more frames were sent, and return how long
    /// the caller should sleep before sending again to avoid exceeding
    /// `MAX_LEAD`.
    pub fn time_sync(&mut self, frames: u32) -> Duration {
        self.frames_sent += frames as u64;
        let lead = self.lead();
        lead.saturating_sub(MAX_LEAD)
    }

    pub fn sampling_rate(&self) -> u32 {
        self.sampling_rate
    }
}

/// The playback duration `frames` worth of audio represents, in
/// microseconds (spec §4.2 step 5): `1_000_000 * sec + 1_000_000 /
/// sampling * remainder`. Used by the RTP framer to advance its
/// timestamp by the amount of audio time each emitted packet covers,
/// independent of the pacer's own sleep/wake bookkeeping.
pub fn micros_for_frames(frames: u32, sampling_rate: u32) -> u32 {
    if sampling_rate == 0 {
        return 0;
    }
    let frames = frames as u64;
    let rate = sampling_rate as u64;
    let secs = frames / rate;
    let remainder = frames % rate;
    (1_000_000u64 * secs + (1_000_000u64 * remainder) / rate) as u32
}

#[cfg(test)]
mod micros_tests {
    use super::micros_for_frames;

    #[test]
    fn one_second_of_frames_is_one_million_micros() {
        assert_eq!(micros_for_frames(44100, 44100), 1_000_000);
    }

    #[test]
    fn zero_frames_is_zero_micros() {
        assert_eq!(micros_for_frames(0, 44100), 0);
    }

    #[test]
    fn fractional_frames_round_down() {
        // 1 frame at 48000 Hz = 20.833... us, truncated to 20.
        assert_eq!(micros_for_frames(1, 48000), 20);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_sleep_needed_when_behind_clock() {
        let mut pacer = Pacer::new(44100);
        std::thread::sleep(Duration::from_millis(5));
        let sleep = pacer.time_sync(128);
        assert_eq!(sleep, Duration::ZERO);
    }

    #[test]
    fn large_batch_produces_sleep_request() {
        let mut pacer = Pacer::new(44100);
        // 44100 frames = 1 second of audio sent instantaneously.
        let sleep = pacer.time_sync(44100);
        assert!(sleep > Duration::from_millis(900));
    }

    #[test]
    fn reset_clears_accumulated_lead() {
        let mut pacer = Pacer::new(44100);
        pacer.time_sync(44100);
        pacer.reset();
        assert_eq!(pacer.lead(), Duration::ZERO);
    }
}
