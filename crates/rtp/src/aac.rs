//! AAC-LATM fragmentation over RTP (spec §4.4/§9, component C4/C6)
//!
//! A2DP's AAC payload carries one LATM frame per RTP packet when it
//! fits; when it doesn't, the frame is split across consecutive RTP
//! packets. This engine follows the MARK-bit convention spec.md's
//! Open Question settled on: the marker bit is set on every fragment
//! *except* the last one, so a depacketizer reassembles a frame by
//! concatenating packets until it sees marker=0.

use std::vec::Vec;

/// One fragment of an AAC-LATM frame ready to go out as an RTP payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AacFragment<'a> {
    pub data: &'a [u8],
    /// Set on every fragment but the last.
    pub marker: bool,
}

/// Splits a single AAC-LATM frame into one or more RTP-payload-sized
/// fragments.
pub struct AacPacketizer {
    mtu: usize,
}

impl AacPacketizer {
    pub fn new(mtu: usize) -> Self {
        Self { mtu }
    }

    pub fn fragment<'a>(&self, frame: &'a [u8]) -> Vec<AacFragment<'a>> {
        if frame.is_empty() {
            return Vec::new();
        }
        if frame.len() <= self.mtu {
            return vec![AacFragment {
                data: frame,
                marker: false,
            }];
        }

        let mut fragments = Vec::new();
        let mut offset = 0;
        while offset < frame.len() {
            let end = (offset + self.mtu).min(frame.len());
            let is_last = end == frame.len();
            fragments.push(AacFragment {
                data: &frame[offset..end],
                marker: !is_last,
            });
            offset = end;
        }
        fragments
    }
}

/// Reassembles AAC-LATM frames from a stream of (payload, marker) RTP
/// packets.
#[derive(Default)]
pub struct AacDepacketizer {
    buffer: Vec<u8>,
    reassembling: bool,
}

impl AacDepacketizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one RTP packet's payload. Returns `Some(frame)` once a full
    /// LATM frame (marker=0 fragment, or an unfragmented packet) has
    /// been assembled.
    pub fn push(&mut self, payload: &[u8], marker: bool) -> Option<Vec<u8>> {
        self.buffer.extend_from_slice(payload);
        self.reassembling = true;

        if marker {
            // More fragments to come.
            return None;
        }

        self.reassembling = false;
        Some(std::mem::take(&mut self.buffer))
    }

    /// Discard any partially-assembled frame, e.g. after a detected
    /// sequence-number gap.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.reassembling = false;
    }

    pub fn is_reassembling(&self) -> bool {
        self.reassembling
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_frame_is_not_fragmented() {
        let packetizer = AacPacketizer::new(100);
        let frame = [1u8, 2, 3, 4];
        let fragments = packetizer.fragment(&frame);
        assert_eq!(fragments.len(), 1);
        assert!(!fragments[0].marker);
    }

    #[test]
    fn large_frame_splits_with_marker_on_all_but_last() {
        let packetizer = AacPacketizer::new(4);
        let frame = [0u8; 10];
        let fragments = packetizer.fragment(&frame);
        assert_eq!(fragments.len(), 3);
        assert!(fragments[0].marker);
        assert!(fragments[1].marker);
        assert!(!fragments[2].marker);
    }

    #[test]
    fn depacketizer_reassembles_fragments() {
        let packetizer = AacPacketizer::new(4);
        let frame = (0u8..10).collect::<Vec<_>>();
        let fragments = packetizer.fragment(&frame);

        let mut depacketizer = AacDepacketizer::new();
        let mut result = None;
        for frag in &fragments {
            result = depacketizer.push(frag.data, frag.marker);
        }

        assert_eq!(result, Some(frame));
        assert!(!depacketizer.is_reassembling());
    }

    #[test]
    fn reset_discards_partial_frame() {
        let mut depacketizer = AacDepacketizer::new();
        depacketizer.push(&[1, 2, 3], true);
        assert!(depacketizer.is_reassembling());
        depacketizer.reset();
        assert!(!depacketizer.is_reassembling());
    }
}
