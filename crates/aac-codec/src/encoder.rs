//! Safe wrapper over `fdk-aac-sys`'s encoder bindings.

use crate::{CodecError, Result};
use fdk_aac_sys as sys;
use std::ptr;

/// A2DP AAC streams use the LATM (loas) transport, 2-byte-per-frame
/// length prefix omitted (matching the RTP framing in the `rtp` crate
/// rather than the MP4/ADTS containers fdk-aac also supports).
pub struct Encoder {
    handle: sys::HANDLE_AACENCODER,
    out_buf: Vec<u8>,
}

unsafe impl Send for Encoder {}

pub struct EncoderConfig {
    pub sample_rate: u32,
    pub channels: u8,
    pub bitrate: u32,
    pub vbr_mode: bool,
    pub afterburner: bool,
    /// fdk-aac `AACENC_PARAM_AACENC_AOT` value, taken from the A2DP
    /// configuration blob's object type field (`a2dp::ObjectType::fdk_aot`).
    pub audio_object_type: u32,
}

impl Encoder {
    pub fn new(config: &EncoderConfig) -> Result<Self> {
        let mut handle: sys::HANDLE_AACENCODER = ptr::null_mut();

        // AOT_AAC_LC = 2, module mask 0 selects all available modules.
        let err = unsafe { sys::aacEncOpen(&mut handle, 0, config.channels as u32) };
        if err != sys::AACENC_ERROR_AACENC_OK {
            return Err(CodecError::EncoderOpenFailed(err as i32));
        }

        let mut encoder = Self {
            handle,
            out_buf: vec![0u8; 1536],
        };

        encoder.set_param(sys::AACENC_PARAM_AACENC_AOT, config.audio_object_type)?;
        encoder.set_param(sys::AACENC_PARAM_AACENC_SAMPLERATE, config.sample_rate)?;
        encoder.set_param(sys::AACENC_PARAM_AACENC_CHANNELMODE, config.channels as u32)?;
        encoder.set_param(sys::AACENC_PARAM_AACENC_TRANSMUX, 2)?; // LATM, no length prefix
        encoder.set_param(sys::AACENC_PARAM_AACENC_AFTERBURNER, config.afterburner as u32)?;

        if config.vbr_mode {
            encoder.set_param(sys::AACENC_PARAM_AACENC_BITRATEMODE, 4)?;
        } else {
            encoder.set_param(sys::AACENC_PARAM_AACENC_BITRATE, config.bitrate)?;
        }

        let err = unsafe { sys::aacEncEncode(handle, ptr::null(), ptr::null(), ptr::null(), ptr::null_mut()) };
        if err != sys::AACENC_ERROR_AACENC_OK && err != sys::AACENC_ERROR_AACENC_ENCODE_EOF {
            return Err(CodecError::EncoderOpenFailed(err as i32));
        }

        Ok(encoder)
    }

    fn set_param(&mut self, param: sys::AACENC_PARAM, value: u32) -> Result<()> {
        let err = unsafe { sys::aacEncoder_SetParam(self.handle, param, value) };
        if err != sys::AACENC_ERROR_AACENC_OK {
            return Err(CodecError::EncoderParamRejected(err as i32));
        }
        Ok(())
    }

    /// Encode one block of interleaved PCM into a LATM frame, returning
    /// the slice of `self`'s internal buffer holding the result.
    pub fn encode(&mut self, pcm: &[i16]) -> Result<&[u8]> {
        let in_buf = pcm.as_ptr() as *mut std::ffi::c_void;
        let in_buf_size = (pcm.len() * std::mem::size_of::<i16>()) as i32;
        let in_buf_el_size = std::mem::size_of::<i16>() as i32;
        let mut in_identifier = sys::AACENC_BufferIdentifier_IN_AUDIO_DATA as i32;

        let in_desc = sys::AACENC_BufDesc {
            numBufs: 1,
            bufs: &mut { in_buf } as *mut _,
            bufferIdentifiers: &mut in_identifier,
            bufSizes: &mut { in_buf_size } as *mut _,
            bufElSizes: &mut { in_buf_el_size } as *mut _,
        };

        let out_ptr = self.out_buf.as_mut_ptr() as *mut std::ffi::c_void;
        let out_size = self.out_buf.len() as i32;
        let out_el_size = 1i32;
        let mut out_identifier = sys::AACENC_BufferIdentifier_OUT_BITSTREAM_DATA as i32;

        let out_desc = sys::AACENC_BufDesc {
            numBufs: 1,
            bufs: &mut { out_ptr } as *mut _,
            bufferIdentifiers: &mut out_identifier,
            bufSizes: &mut { out_size } as *mut _,
            bufElSizes: &mut { out_el_size } as *mut _,
        };

        let in_args = sys::AACENC_InArgs {
            numInSamples: pcm.len() as i32,
            numAncBytes: 0,
        };
        let mut out_args = sys::AACENC_OutArgs::default();

        let err = unsafe {
            sys::aacEncEncode(self.handle, &in_desc, &out_desc, &in_args, &mut out_args)
        };
        if err != sys::AACENC_ERROR_AACENC_OK {
            return Err(CodecError::EncodeFailed(err as i32));
        }

        Ok(&self.out_buf[..out_args.numOutBytes as usize])
    }
}

impl Drop for Encoder {
    fn drop(&mut self) {
        unsafe {
            sys::aacEncClose(&mut self.handle);
        }
    }
}
