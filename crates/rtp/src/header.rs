//! 12-byte RTP header, generalized from the teacher's `MediaHeader`
//! (`bt-classic/src/avdtp.rs`) to also support parsing (`from_bytes`)
//! and a variable CSRC list, which the original encode-only version
//! never needed.

use crate::{Result, RtpError};

pub const RTP_VERSION: u8 = 2;

/// A2DP media packets use dynamic payload type 96 by convention.
pub const PAYLOAD_TYPE_DYNAMIC: u8 = 96;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    pub version: u8,
    pub padding: bool,
    pub extension: bool,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
}

impl Default for RtpHeader {
    fn default() -> Self {
        Self {
            version: RTP_VERSION,
            padding: false,
            extension: false,
            marker: false,
            payload_type: PAYLOAD_TYPE_DYNAMIC,
            sequence_number: 0,
            timestamp: 0,
            ssrc: 0,
        }
    }
}

impl RtpHeader {
    pub const LEN: usize = 12;

    pub fn to_bytes(&self, out: &mut [u8]) -> Result<usize> {
        if out.len() < Self::LEN {
            return Err(RtpError::BufferTooSmall);
        }

        out[0] = (self.version << 6)
            | ((self.padding as u8) << 5)
            | ((self.extension as u8) << 4);
        // CSRC count is always 0 for the A2DP/HFP profile this engine speaks.
        out[1] = ((self.marker as u8) << 7) | (self.payload_type & 0x7F);
        out[2..4].copy_from_slice(&self.sequence_number.to_be_bytes());
        out[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        out[8..12].copy_from_slice(&self.ssrc.to_be_bytes());

        Ok(Self::LEN)
    }

    /// Parse a header from the front of `data`, returning the header and
    /// the number of bytes consumed (header length plus any CSRC list).
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < Self::LEN {
            return Err(RtpError::BufferTooSmall);
        }

        let version = data[0] >> 6;
        if version != RTP_VERSION {
            return Err(RtpError::UnsupportedVersion);
        }
        let padding = (data[0] >> 5) & 1 != 0;
        let extension = (data[0] >> 4) & 1 != 0;
        let cc = (data[0] & 0x0F) as usize;

        let marker = (data[1] >> 7) & 1 != 0;
        let payload_type = data[1] & 0x7F;

        let sequence_number = u16::from_be_bytes([data[2], data[3]]);
        let timestamp = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let ssrc = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

        let consumed = Self::LEN + cc * 4;
        if data.len() < consumed {
            return Err(RtpError::BufferTooSmall);
        }

        Ok((
            Self {
                version,
                padding,
                extension,
                marker,
                payload_type,
                sequence_number,
                timestamp,
                ssrc,
            },
            consumed,
        ))
    }

    /// Advance sequence number and timestamp for the next packet, as
    /// the teacher's `A2dpSource::next_sequence`/`advance_timestamp`
    /// did, wrapping on overflow per RFC 3550.
    pub fn advance(&mut self, frames: u32) {
        self.sequence_number = self.sequence_number.wrapping_add(1);
        self.timestamp = self.timestamp.wrapping_add(frames);
    }
}
