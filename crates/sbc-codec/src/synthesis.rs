//! Polyphase synthesis filterbank for the SBC decoder
//!
//! The inverse of `analysis::AnalysisFilter`: reconstructs PCM samples
//! from subband samples using the same prototype filter and cosine
//! modulation tables the encoder's analysis filter uses, run through
//! the transposed transform. No synthesis-direction prototype tables
//! existed to carry over, so this is derived directly from the
//! analysis math rather than copied from a reference implementation.

use crate::config::{SbcConfig, Subbands};
use crate::tables::{COS_TABLE_4, COS_TABLE_8, PROTO_4_40, PROTO_8_80};

const MAX_SUBBANDS: usize = 8;
const MAX_BLOCKS: usize = 16;
const MAX_CHANNELS: usize = 2;
const FILTER_DEPTH: usize = 10;

/// Synthesis filter state: maintains the same kind of rolling history
/// the analysis filter does, but fed with reconstructed subband
/// samples instead of raw PCM.
pub struct SynthesisFilter {
    v: [[i32; MAX_SUBBANDS * FILTER_DEPTH]; MAX_CHANNELS],
    #[allow(dead_code)]
    subbands: Subbands,
}

impl SynthesisFilter {
    pub fn new(subbands: Subbands) -> Self {
        Self {
            v: [[0; MAX_SUBBANDS * FILTER_DEPTH]; MAX_CHANNELS],
            subbands,
        }
    }

    pub fn reset(&mut self) {
        for ch in &mut self.v {
            for sample in ch.iter_mut() {
                *sample = 0;
            }
        }
    }

    /// Reconstruct PCM samples for one frame from decoded subband
    /// samples, producing interleaved `[L, R, L, R, ...]` output when
    /// `config.channels() == 2`.
    pub fn process(
        &mut self,
        subbands: &[[[i32; MAX_SUBBANDS]; MAX_BLOCKS]; MAX_CHANNELS],
        config: &SbcConfig,
        pcm_out: &mut [i16],
    ) -> usize {
        let num_subbands = config.subbands.count();
        let num_blocks = config.block_length.count();
        let num_channels = config.channels() as usize;

        let samples_needed = num_blocks * num_subbands * num_channels;
        assert!(pcm_out.len() >= samples_needed, "pcm_out too small");

        for blk in 0..num_blocks {
            for ch in 0..num_channels {
                let pcm_block = self.reconstruct_block(ch, &subbands[ch][blk], num_subbands);

                for sb in 0..num_subbands {
                    let idx = (blk * num_subbands + sb) * num_channels + ch;
                    pcm_out[idx] = pcm_block[sb].clamp(i16::MIN as i32, i16::MAX as i32) as i16;
                }
            }
        }

        samples_needed
    }

    /// Inverse cosine-modulation + prototype-filter pass for one block
    /// of one channel, mirroring `AnalysisFilter::compute_subbands` in
    /// reverse.
    fn reconstruct_block(
        &mut self,
        channel: usize,
        sb_samples: &[i32; MAX_SUBBANDS],
        subbands: usize,
    ) -> [i32; MAX_SUBBANDS] {
        // Transpose of the analysis cosine matrix: map subband samples
        // back to the 2*subbands "z" domain.
        let mut z = [0i64; MAX_SUBBANDS * 2];
        for i in 0..(subbands * 2) {
            let mut sum = 0i64;
            for k in 0..subbands {
                let cos_idx = i % subbands;
                let cos_val = if subbands == 8 {
                    COS_TABLE_8[k][cos_idx] as i64
                } else {
                    COS_TABLE_4[k][cos_idx] as i64
                };
                sum += (sb_samples[k] as i64 * cos_val) >> 14;
            }
            z[i] = sum >> 8;
        }

        // Shift the new z-domain block into the rolling history, then
        // window by the same prototype filter the analysis side used.
        let history_len = subbands * FILTER_DEPTH;
        for i in (subbands * 2..history_len).rev() {
            self.v[channel][i] = self.v[channel][i - subbands * 2];
        }
        for i in 0..(subbands * 2).min(history_len) {
            self.v[channel][i] = z[i] as i32;
        }

        let mut out = [0i32; MAX_SUBBANDS];
        for i in 0..subbands {
            let mut acc = 0i64;
            for j in 0..FILTER_DEPTH {
                let v_idx = j * subbands + i;
                if v_idx >= history_len {
                    continue;
                }
                let proto_idx = j * subbands + i;
                let proto_val = if subbands == 8 {
                    PROTO_8_80[proto_idx.min(PROTO_8_80.len() - 1)] as i64
                } else {
                    PROTO_4_40[proto_idx.min(PROTO_4_40.len() - 1)] as i64
                };
                acc += (self.v[channel][v_idx] as i64 * proto_val) >> 15;
            }
            out[i] = acc as i32;
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::*;

    #[test]
    fn silence_in_produces_silence_out() {
        let config = SbcConfig::default();
        let mut filter = SynthesisFilter::new(config.subbands);
        let subbands = [[[0i32; MAX_SUBBANDS]; MAX_BLOCKS]; MAX_CHANNELS];

        let mut pcm = [0i16; 128 * 2];
        filter.process(&subbands, &config, &mut pcm);

        assert!(pcm.iter().all(|&s| s == 0));
    }

    #[test]
    fn reset_clears_history() {
        let config = SbcConfig::default();
        let mut filter = SynthesisFilter::new(config.subbands);
        filter.v[0][0] = 1234;
        filter.reset();
        assert!(filter.v[0].iter().all(|&s| s == 0));
    }

    #[test]
    fn produces_expected_sample_count() {
        let config = SbcConfig::default();
        let mut filter = SynthesisFilter::new(config.subbands);
        let subbands = [[[10i32; MAX_SUBBANDS]; MAX_BLOCKS]; MAX_CHANNELS];

        let mut pcm = [0i16; 128 * 2];
        let written = filter.process(&subbands, &config, &mut pcm);
        assert_eq!(written, 128 * 2);
    }
}
