//! Safe wrapper over the hand-declared `aacDecoder_*` bindings.

use crate::decoder_sys as sys;
use crate::{CodecError, Result};
use std::ptr;

/// A2DP sink-side AAC-LATM decoder. The RTP depacketizer (the `rtp`
/// crate's `AacDepacketizer`) hands this whole LATM frames with the
/// CSRC/RTP header already stripped; this wrapper feeds them to the
/// decoder's internal bit-reservoir and pulls PCM out one frame at a
/// time.
pub struct Decoder {
    handle: sys::HANDLE_AACDECODER,
    pcm_buf: Vec<i16>,
}

unsafe impl Send for Decoder {}

impl Decoder {
    pub fn new(channels: u8) -> Result<Self> {
        let handle = unsafe { sys::aacDecoder_Open(sys::TT_MP4_LATM_MCP1, 1) };
        if handle.is_null() {
            return Err(CodecError::DecoderOpenFailed(-1));
        }

        let decoder = Self {
            handle,
            // 2048 samples/channel is comfortably above AAC-LC's 1024
            // samples-per-frame maximum, stereo.
            pcm_buf: vec![0i16; 2048],
        };

        unsafe {
            sys::aacDecoder_SetParam(
                handle,
                sys::AAC_PCM_MIN_OUTPUT_CHANNELS,
                channels as i32,
            );
            sys::aacDecoder_SetParam(
                handle,
                sys::AAC_PCM_MAX_OUTPUT_CHANNELS,
                channels as i32,
            );
        }

        Ok(decoder)
    }

    /// Decode one LATM audioMuxElement (with CSRCs already stripped by
    /// the RTP layer) into interleaved PCM. Returns the number of
    /// samples (all channels) written to the front of the decoder's
    /// internal PCM buffer.
    pub fn decode(&mut self, latm_frame: &[u8]) -> Result<&[i16]> {
        let mut in_ptr = latm_frame.as_ptr() as *mut u8;
        let in_size = latm_frame.len() as std::os::raw::c_uint;
        let mut bytes_valid = in_size;

        let fill_err = unsafe {
            sys::aacDecoder_Fill(
                self.handle,
                &mut in_ptr as *mut _,
                &in_size as *const _,
                &mut bytes_valid as *mut _,
            )
        };
        if fill_err != sys::AAC_DEC_OK {
            return Err(CodecError::DecoderFillOverflow);
        }

        let flags = 0u32;
        let decode_err = unsafe {
            sys::aacDecoder_DecodeFrame(
                self.handle,
                self.pcm_buf.as_mut_ptr(),
                self.pcm_buf.len() as i32,
                flags,
            )
        };
        // A transport sync or bit-starvation error means this frame
        // produced no usable output; caller drops it and continues with
        // the next RTP packet (spec §7 "codec failure" disposition).
        if decode_err == sys::AAC_DEC_TRANSPORT_SYNC_ERROR
            || decode_err == sys::AAC_DEC_NOT_ENOUGH_BITS
        {
            return Ok(&[]);
        }
        if decode_err != sys::AAC_DEC_OK {
            return Err(CodecError::DecodeFailed(decode_err as i32));
        }

        // The decoder doesn't report sample count directly from
        // `DecodeFrame`; AAC-LC's fixed 1024 samples/channel frame size
        // is the only one this engine configures the encoder for (see
        // `Encoder`/spec.md §4.6), so the consumer reads
        // `frame_size * channels` samples as instructed by spec.md.
        Ok(&self.pcm_buf)
    }
}

impl Drop for Decoder {
    fn drop(&mut self) {
        unsafe {
            sys::aacDecoder_Close(self.handle);
        }
        self.handle = ptr::null_mut();
    }
}
