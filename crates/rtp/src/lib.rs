//! RTP framing for A2DP media transport (spec §4.4, component C4)
//!
//! A2DP carries media over a restricted profile of RTP (RFC 3550):
//! fixed 12-byte header, no RTCP, a single payload type per stream. This
//! crate frames/parses that header plus the SBC and AAC payload headers
//! layered on top of it.

mod aac;
mod header;
mod sbc;

pub use aac::{AacDepacketizer, AacFragment, AacPacketizer};
pub use header::{RtpHeader, PAYLOAD_TYPE_DYNAMIC};
pub use sbc::SbcPayloadHeader;

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RtpError {
    #[error("buffer too small")]
    BufferTooSmall,
    #[error("unsupported RTP version")]
    UnsupportedVersion,
    #[error("frame count field exceeds 15")]
    FrameCountOverflow,
}

pub type Result<T> = core::result::Result<T, RtpError>;
