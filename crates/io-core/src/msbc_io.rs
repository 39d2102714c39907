//! mSBC streaming framer (spec §4.7, component C7): the buffering and
//! byte-level resync logic layered on top of `sbc_codec::msbc`'s
//! single-frame encode/decode, matching spec.md's `Sbc-state` data
//! model -- a dual-direction ring of PCM-in/encoded-out/decode-in
//! buffers plus the "first frame sent" prebuffer latch.

use sbc_codec::{MsbcDecoder, MsbcEncoder, MSBC_FRAME_LEN, MSBC_SAMPLES_PER_FRAME};

/// H2 header length (2 bytes) plus the 57-byte mSBC payload; this is
/// the unit the decode-side resync scanner looks for, independent of
/// the encoder's extra trailing padding byte.
const DECODE_FRAME_LEN: usize = 2 + MSBC_FRAME_LEN;

/// Streaming mSBC codec state for one SCO transport's voice path.
/// Owned exclusively by the SCO worker (component C8); not `Send`
/// across workers.
pub struct MsbcIo {
    encoder: MsbcEncoder,
    decoder: MsbcDecoder,
    pcm_in: Vec<i16>,
    encoded_out: Vec<u8>,
    decode_in: Vec<u8>,
    /// Latch guarding the pre-buffer: cleared on reset, set after the
    /// first chunk is handed to the BT socket (spec §4.7 "Prebuffer").
    first_frame_sent: bool,
}

impl MsbcIo {
    pub fn new() -> Self {
        Self {
            encoder: MsbcEncoder::new(),
            decoder: MsbcDecoder::new(),
            pcm_in: Vec::with_capacity(4 * MSBC_SAMPLES_PER_FRAME),
            encoded_out: Vec::with_capacity(4 * (2 + MSBC_FRAME_LEN)),
            decode_in: Vec::with_capacity(2 * (2 + MSBC_FRAME_LEN)),
            first_frame_sent: false,
        }
    }

    /// Reset all buffering and codec state, e.g. when the SCO link is
    /// released and reacquired.
    pub fn reset(&mut self) {
        self.encoder.reset();
        self.decoder.reset();
        self.pcm_in.clear();
        self.encoded_out.clear();
        self.decode_in.clear();
        self.first_frame_sent = false;
    }

    /// Append freshly-read speaker PCM and opportunistically encode
    /// every complete 120-sample block it now holds.
    pub fn push_pcm(&mut self, samples: &[i16]) {
        self.pcm_in.extend_from_slice(samples);
        self.encode_pending();
    }

    fn encode_pending(&mut self) {
        while self.pcm_in.len() >= MSBC_SAMPLES_PER_FRAME {
            let mut packet = [0u8; 2 + MSBC_FRAME_LEN + 1];
            match self.encoder.encode_frame(&self.pcm_in[..MSBC_SAMPLES_PER_FRAME], &mut packet) {
                Ok(n) => self.encoded_out.extend_from_slice(&packet[..n]),
                Err(e) => log::warn!("mSBC encode error, dropping block: {e:?}"),
            }
            self.pcm_in.drain(..MSBC_SAMPLES_PER_FRAME);
        }
    }

    /// Number of encoded bytes currently queued for the BT socket.
    pub fn encoded_len(&self) -> usize {
        self.encoded_out.len()
    }

    /// Whether enough encoded audio is queued to send the next
    /// `wire_quantum`-byte chunk, honoring the pre-buffer latch on the
    /// very first send (spec §4.7 "Prebuffer").
    pub fn chunk_ready(&self, wire_quantum: usize, prebuffer_frames: usize) -> bool {
        if wire_quantum == 0 {
            return false;
        }
        let threshold = if self.first_frame_sent {
            wire_quantum
        } else {
            wire_quantum * prebuffer_frames.max(1)
        };
        self.encoded_out.len() >= threshold
    }

    /// Take the next `wire_quantum`-sized chunk to write to the BT
    /// socket, per spec §4.7's "Wire chunking" (SCO writes always move
    /// `sco_wire_quantum`-byte segments regardless of MTU or SBC frame
    /// boundaries).
    pub fn take_chunk(&mut self, wire_quantum: usize) -> Option<Vec<u8>> {
        if self.encoded_out.len() < wire_quantum || wire_quantum == 0 {
            return None;
        }
        let chunk = self.encoded_out.drain(..wire_quantum).collect();
        self.first_frame_sent = true;
        Some(chunk)
    }

    /// Feed raw bytes read off the SCO socket and decode every
    /// complete, H2-synchronized mSBC frame found, appending decoded
    /// PCM to `out`. Implements spec §4.7's "Decode sync": advance
    /// byte-by-byte until `buf[0] == 0x01 && buf[2] == 0xAD`, decode,
    /// and on failure drop the whole buffer rather than resyncing
    /// within it (a corrupted stream is assumed to need a full
    /// resync, not a single-byte nudge).
    pub fn push_encoded(&mut self, bytes: &[u8], out: &mut Vec<i16>) {
        self.decode_in.extend_from_slice(bytes);

        loop {
            if self.decode_in.len() < DECODE_FRAME_LEN {
                break;
            }
            if self.decode_in[0] == 0x01 && self.decode_in[2] == 0xAD {
                let mut pcm = [0i16; MSBC_SAMPLES_PER_FRAME];
                match self
                    .decoder
                    .decode_packet(&self.decode_in[..DECODE_FRAME_LEN], &mut pcm)
                {
                    Ok((written, gap)) => {
                        if gap {
                            log::warn!("mSBC H2 sequence gap detected");
                        }
                        out.extend_from_slice(&pcm[..written]);
                        self.decode_in.drain(..DECODE_FRAME_LEN);
                    }
                    Err(e) => {
                        log::warn!("mSBC decode error, resetting decode buffer: {e:?}");
                        self.decode_in.clear();
                    }
                }
            } else {
                self.decode_in.remove(0);
            }
        }
    }
}

impl Default for MsbcIo {
    fn default() -> Self {
        Self::new()
    }
}
