//! Per-channel dB-mapped volume and mute scaling (spec §4.3, component C3)

/// AVRCP/HFP volume range is 0..=127 (7 bits). 0 maps to -infinity dB
/// (silence), 127 to 0 dB (unity gain); everything in between is spread
/// linearly in dB, matching the perceptual mapping hardware mixers use
/// rather than a linear amplitude mapping (which would make most of the
/// range sound like "loud" to the ear).
const MAX_VOLUME: u8 = 127;
/// The dB floor spec.md's scale formula fixes at volume=0:
/// `10^((-64 + 64*volume/127)/20)`.
const MIN_DB: f32 = -64.0;

/// A linear gain factor derived from a 0..=127 volume and mute flag,
/// ready to multiply directly against PCM samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeScale(f32);

impl VolumeScale {
    pub fn apply_i16(&self, sample: i16) -> i16 {
        let scaled = sample as f32 * self.0;
        scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
    }

    pub fn apply_buf_i16(&self, buf: &mut [i16]) {
        for s in buf.iter_mut() {
            *s = self.apply_i16(*s);
        }
    }

    pub fn as_f32(&self) -> f32 {
        self.0
    }
}

/// Volume state for one transport: a 0..=127 level plus an independent
/// mute flag, matching the `Transport` fields the control plane mutates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Volume {
    level: u8,
    muted: bool,
}

impl Default for Volume {
    fn default() -> Self {
        Self {
            level: MAX_VOLUME,
            muted: false,
        }
    }
}

impl Volume {
    pub fn new(level: u8, muted: bool) -> Self {
        Self {
            level: level.min(MAX_VOLUME),
            muted,
        }
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Convert to a linear gain factor. Muted always produces exact
    /// silence (0.0); volume 0 unmuted is the formula's dB floor
    /// (`10^(-64/20) ≈ 0.00063`), not silence -- only the mute flag is.
    pub fn scale(&self) -> VolumeScale {
        if self.muted {
            return VolumeScale(0.0);
        }
        if self.level >= MAX_VOLUME {
            return VolumeScale(1.0);
        }
        let fraction = self.level as f32 / MAX_VOLUME as f32;
        let db = MIN_DB * (1.0 - fraction);
        VolumeScale(10f32.powf(db / 20.0))
    }
}

/// Independent volume/mute state for both A2DP channels (spec §4.3).
/// Channel 1 is the only channel for mono streams; channel 2 only
/// matters when `channels == 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelVolume {
    pub ch1: Volume,
    pub ch2: Volume,
}

impl ChannelVolume {
    pub fn new(ch1: Volume, ch2: Volume) -> Self {
        Self { ch1, ch2 }
    }

    /// Scale an interleaved PCM buffer in place: even-indexed samples get
    /// channel 1's gain, odd-indexed samples get channel 2's (ignored for
    /// mono, where every sample is channel 1).
    pub fn apply_interleaved_i16(&self, buf: &mut [i16], channels: u8) {
        if channels <= 1 {
            self.ch1.scale().apply_buf_i16(buf);
            return;
        }
        let scale1 = self.ch1.scale();
        let scale2 = self.ch2.scale();
        for (i, sample) in buf.iter_mut().enumerate() {
            *sample = if i % 2 == 0 {
                scale1.apply_i16(*sample)
            } else {
                scale2.apply_i16(*sample)
            };
        }
    }
}

impl Default for ChannelVolume {
    fn default() -> Self {
        Self {
            ch1: Volume::default(),
            ch2: Volume::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_volume_is_unity_gain() {
        let v = Volume::new(127, false);
        assert_eq!(v.scale().as_f32(), 1.0);
    }

    #[test]
    fn muted_is_silent_regardless_of_level() {
        let v = Volume::new(127, true);
        assert_eq!(v.scale().as_f32(), 0.0);
    }

    #[test]
    fn zero_level_unmuted_is_the_db_floor_not_silence() {
        // spec.md's formula only special-cases `muted`; volume 0 is
        // 10^((-64+0)/20), a very quiet but nonzero gain.
        let v = Volume::new(0, false);
        let g = v.scale().as_f32();
        assert!(g > 0.0 && g < 0.001);
    }

    #[test]
    fn mid_volume_is_between_silence_and_unity() {
        let v = Volume::new(64, false);
        let g = v.scale().as_f32();
        assert!(g > 0.0 && g < 1.0);
    }

    #[test]
    fn gain_clamps_sample_range() {
        let v = Volume::new(127, false);
        let scale = v.scale();
        assert_eq!(scale.apply_i16(i16::MAX), i16::MAX);
        assert_eq!(scale.apply_i16(i16::MIN), i16::MIN);
    }

    #[test]
    fn stereo_applies_independent_gain_per_channel() {
        let cv = ChannelVolume::new(Volume::new(127, false), Volume::new(127, true));
        let mut buf = [1000i16, 1000, 1000, 1000];
        cv.apply_interleaved_i16(&mut buf, 2);
        // Channel 1 (even indices) passes through at unity gain.
        assert_eq!(buf[0], 1000);
        assert_eq!(buf[2], 1000);
        // Channel 2 (odd indices) is muted.
        assert_eq!(buf[1], 0);
        assert_eq!(buf[3], 0);
    }

    #[test]
    fn mono_ignores_channel_two() {
        let cv = ChannelVolume::new(Volume::new(127, false), Volume::new(0, true));
        let mut buf = [1000i16, 1000];
        cv.apply_interleaved_i16(&mut buf, 1);
        assert_eq!(buf, [1000, 1000]);
    }
}
