//! SBC frame decoding (sink-side of component C5)
//!
//! Parses the wire format `frame::FramePacker` produces, regenerates
//! the bit allocation from the transmitted scale factors with the same
//! `BitAllocator` the encoder uses (bit allocation is a pure function
//! of scale factors and configuration, so encoder and decoder always
//! agree without transmitting the allocation itself), and runs the
//! result back through the synthesis filterbank.

use crate::bitalloc::BitAllocator;
use crate::config::{
    AllocationMethod, BlockLength, ChannelMode, SamplingFrequency, SbcConfig, Subbands,
};
use crate::quantizer::Quantizer;
use crate::synthesis::SynthesisFilter;
use crate::SbcError;

const MAX_SUBBANDS: usize = 8;
const MAX_BLOCKS: usize = 16;
const MAX_CHANNELS: usize = 2;

const SBC_SYNCWORD: u8 = 0x9C;

/// A decoded frame's header fields, parsed off the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame {
    pub config: SbcConfig,
    pub samples_written: usize,
}

struct BitReader<'a> {
    data: &'a [u8],
    byte_pos: usize,
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    fn read_bits(&mut self, num_bits: u8) -> Result<u32, SbcError> {
        let mut value: u32 = 0;
        let mut remaining = num_bits;

        while remaining > 0 {
            if self.byte_pos >= self.data.len() {
                return Err(SbcError::InputTooSmall);
            }
            let byte = self.data[self.byte_pos];
            let bits_left_in_byte = 8 - self.bit_pos;
            let take = remaining.min(bits_left_in_byte);

            let shift = bits_left_in_byte - take;
            let mask = ((1u16 << take) - 1) as u8;
            let bits = (byte >> shift) & mask;

            value = (value << take) | bits as u32;

            self.bit_pos += take;
            if self.bit_pos == 8 {
                self.bit_pos = 0;
                self.byte_pos += 1;
            }
            remaining -= take;
        }

        Ok(value)
    }
}

/// SBC decoder: mirrors `SbcEncoder`'s shape (pre-allocated state, no
/// heap allocation, reset clears filter history).
pub struct SbcDecoder {
    allocator: BitAllocator,
    quantizer: Quantizer,
    synthesis: SynthesisFilter,
}

impl SbcDecoder {
    pub fn new(subbands: Subbands) -> Self {
        Self {
            allocator: BitAllocator::new(),
            quantizer: Quantizer::new(),
            synthesis: SynthesisFilter::new(subbands),
        }
    }

    pub fn reset(&mut self) {
        self.synthesis.reset();
    }

    /// Parse the 4-byte header and return the configuration it encodes.
    fn parse_header(data: &[u8]) -> Result<SbcConfig, SbcError> {
        if data.len() < 4 {
            return Err(SbcError::InputTooSmall);
        }
        if data[0] != SBC_SYNCWORD {
            return Err(SbcError::InvalidConfig);
        }

        let byte1 = data[1];
        let sampling_frequency = match byte1 >> 6 {
            0 => SamplingFrequency::Freq16000,
            1 => SamplingFrequency::Freq32000,
            2 => SamplingFrequency::Freq44100,
            _ => SamplingFrequency::Freq48000,
        };
        let block_length = match (byte1 >> 4) & 0x03 {
            0 => BlockLength::Blocks4,
            1 => BlockLength::Blocks8,
            2 => BlockLength::Blocks12,
            _ => BlockLength::Blocks16,
        };
        let channel_mode = match (byte1 >> 2) & 0x03 {
            0 => ChannelMode::Mono,
            1 => ChannelMode::DualChannel,
            2 => ChannelMode::Stereo,
            _ => ChannelMode::JointStereo,
        };
        let allocation_method = if (byte1 >> 1) & 1 == 0 {
            AllocationMethod::Snr
        } else {
            AllocationMethod::Loudness
        };
        let subbands = if byte1 & 1 == 0 {
            Subbands::Sub4
        } else {
            Subbands::Sub8
        };

        let bitpool = data[2];

        let config = SbcConfig::new(
            sampling_frequency,
            channel_mode,
            block_length,
            subbands,
            allocation_method,
            bitpool,
        );
        if !config.is_valid() {
            return Err(SbcError::InvalidConfig);
        }
        Ok(config)
    }

    /// Decode one SBC frame into interleaved PCM samples.
    ///
    /// Returns the number of i16 samples written to `pcm_out`.
    pub fn decode_frame(&mut self, data: &[u8], pcm_out: &mut [i16]) -> Result<DecodedFrame, SbcError> {
        let config = Self::parse_header(data)?;
        self.decode_frame_inner(data, config, pcm_out)
    }

    /// Decode one frame whose true block count can't be recovered from
    /// the header's 2-bit block-length field -- mSBC's fixed 15-block
    /// geometry has no pattern of its own there (see
    /// [`crate::BlockLength::Blocks15`]) -- so the caller, who already
    /// knows it's decoding mSBC, supplies it directly instead of
    /// trusting what `parse_header` derives from the wire byte.
    pub fn decode_frame_fixed_blocks(
        &mut self,
        data: &[u8],
        block_length: crate::config::BlockLength,
        pcm_out: &mut [i16],
    ) -> Result<DecodedFrame, SbcError> {
        let mut config = Self::parse_header(data)?;
        config.block_length = block_length;
        self.decode_frame_inner(data, config, pcm_out)
    }

    fn decode_frame_inner(
        &mut self,
        data: &[u8],
        config: SbcConfig,
        pcm_out: &mut [i16],
    ) -> Result<DecodedFrame, SbcError> {
        let num_subbands = config.subbands.count();
        let num_blocks = config.block_length.count();
        let num_channels = config.channels() as usize;

        let mut reader = BitReader::new(&data[4..]);

        let join_flags = if config.channel_mode == ChannelMode::JointStereo {
            reader.read_bits(num_subbands as u8)? as u8
        } else {
            0
        };

        let mut scale_factors = [[0u8; MAX_SUBBANDS]; MAX_CHANNELS];
        for ch in 0..num_channels {
            for sb in 0..num_subbands {
                scale_factors[ch][sb] = reader.read_bits(4)? as u8;
            }
        }

        let bits = self.allocator.allocate(&scale_factors, &config, join_flags);

        let mut quantized = [[[0u16; MAX_SUBBANDS]; MAX_BLOCKS]; MAX_CHANNELS];
        for blk in 0..num_blocks {
            for ch in 0..num_channels {
                for sb in 0..num_subbands {
                    let bit_count = bits[ch][sb];
                    if bit_count > 0 {
                        quantized[ch][blk][sb] = reader.read_bits(bit_count)? as u16;
                    }
                }
            }
        }

        let subbands = self
            .quantizer
            .dequantize(&quantized, &bits, &scale_factors, &config);
        let subbands = self
            .quantizer
            .joint_stereo_unprocess(subbands, join_flags, &config);

        let samples_written = self.synthesis.process(&subbands, &config, pcm_out);

        Ok(DecodedFrame {
            config,
            samples_written,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SbcEncoder;

    #[test]
    fn decodes_header_from_encoded_silence() {
        let config = SbcConfig::default();
        let mut encoder = SbcEncoder::new(config);

        let samples_needed = encoder.samples_per_frame() * config.channels() as usize;
        let pcm = std::vec![0i16; samples_needed];
        let mut encoded = [0u8; crate::MAX_SBC_FRAME_SIZE];
        let size = encoder.encode_frame(&pcm, &mut encoded).unwrap();

        let mut decoder = SbcDecoder::new(config.subbands);
        let mut pcm_out = [0i16; 256];
        let result = decoder.decode_frame(&encoded[..size], &mut pcm_out).unwrap();

        assert_eq!(result.config.bitpool, config.bitpool);
        assert_eq!(result.samples_written, samples_needed);
    }

    #[test]
    fn rejects_bad_syncword() {
        let mut decoder = SbcDecoder::new(Subbands::Sub8);
        let data = [0u8; 16];
        let mut pcm_out = [0i16; 256];
        assert_eq!(
            decoder.decode_frame(&data, &mut pcm_out),
            Err(SbcError::InvalidConfig)
        );
    }

    #[test]
    fn rejects_truncated_frame() {
        let mut decoder = SbcDecoder::new(Subbands::Sub8);
        let data = [SBC_SYNCWORD, 0xFF];
        let mut pcm_out = [0i16; 256];
        assert_eq!(
            decoder.decode_frame(&data, &mut pcm_out),
            Err(SbcError::InputTooSmall)
        );
    }
}
