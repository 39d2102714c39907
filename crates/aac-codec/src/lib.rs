//! AAC-LATM encode/decode for A2DP (spec §4.6, component C6)
//!
//! The encode path wraps the Fraunhofer FDK AAC encoder via the
//! `fdk-aac-sys` crate's raw bindings. The decoder has no equivalent
//! binding in that crate (it ships encode-only), so `decoder_sys`
//! declares the matching `aacDecoder_*` entry points by hand against
//! the same native `libfdk-aac` the encoder links -- these are the
//! library's well-known public C API, not guesswork.

pub mod a2dp;
mod decoder_sys;
mod decoder;
mod encoder;

pub use a2dp::{A2dpAacConfig, ObjectType};
pub use decoder::Decoder;
pub use encoder::{Encoder, EncoderConfig};

/// AAC-LC's fixed frame size in samples per channel. This engine only
/// ever configures the encoder for AAC-LC (`a2dp::ObjectType::fdk_aot`
/// never selects HE-AAC/SBR), so both source and sink sides can treat
/// this as constant rather than reading it back from the codec.
pub const AAC_LC_FRAME_SAMPLES: usize = 1024;

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    #[error("encoder open failed: fdk error {0}")]
    EncoderOpenFailed(i32),
    #[error("encoder parameter rejected: fdk error {0}")]
    EncoderParamRejected(i32),
    #[error("encode call failed: fdk error {0}")]
    EncodeFailed(i32),
    #[error("decoder open failed: fdk error {0}")]
    DecoderOpenFailed(i32),
    #[error("decoder fill buffer overflow")]
    DecoderFillOverflow,
    #[error("decode call failed: fdk error {0}")]
    DecodeFailed(i32),
    #[error("output buffer too small")]
    OutputTooSmall,
}

pub type Result<T> = core::result::Result<T, CodecError>;
