//! Hand-written FFI bindings to `libfdk-aac`'s decoder entry points.
//!
//! `fdk-aac-sys` only binds the encoder half of the library (see the
//! crate-level doc comment). The decoder functions below are the same
//! library's well-known public C API (`aacdecoder_lib.h`); since
//! `fdk-aac-sys`'s build script already links `libfdk-aac` into this
//! binary, declaring the decoder symbols by hand is enough to call them
//! -- no extra native dependency is introduced.

use std::os::raw::{c_int, c_uint};

#[allow(non_camel_case_types)]
pub type HANDLE_AACDECODER = *mut std::os::raw::c_void;

pub type TransportType = c_int;
/// Raw access unit, no framing -- used for configuring LATM out-of-band.
pub const TT_MP4_RAW: TransportType = 0;
/// LOAS/LATM with a 1-byte MuxConfigPresent cycle, matching the encoder's
/// `AACENC_PARAM_AACENC_TRANSMUX = 2` choice in `encoder.rs`.
pub const TT_MP4_LATM_MCP1: TransportType = 6;

pub type AacDecoderError = c_uint;
pub const AAC_DEC_OK: AacDecoderError = 0x0000;
pub const AAC_DEC_TRANSPORT_SYNC_ERROR: AacDecoderError = 0x1001;
pub const AAC_DEC_NOT_ENOUGH_BITS: AacDecoderError = 0x1002;

pub type AacDecParam = c_int;
pub const AAC_PCM_MIN_OUTPUT_CHANNELS: AacDecParam = 0x0011;
pub const AAC_PCM_MAX_OUTPUT_CHANNELS: AacDecParam = 0x0012;

extern "C" {
    pub fn aacDecoder_Open(transport_fmt: TransportType, nr_of_layers: c_uint) -> HANDLE_AACDECODER;

    pub fn aacDecoder_ConfigRaw(
        handle: HANDLE_AACDECODER,
        conf: *mut *mut u8,
        length: *const c_uint,
    ) -> AacDecoderError;

    pub fn aacDecoder_SetParam(
        handle: HANDLE_AACDECODER,
        param: AacDecParam,
        value: c_int,
    ) -> AacDecoderError;

    pub fn aacDecoder_Fill(
        handle: HANDLE_AACDECODER,
        buffer: *mut *mut u8,
        buffer_size: *const c_uint,
        bytes_valid: *mut c_uint,
    ) -> AacDecoderError;

    pub fn aacDecoder_DecodeFrame(
        handle: HANDLE_AACDECODER,
        time_data: *mut i16,
        time_data_size: c_int,
        flags: c_uint,
    ) -> AacDecoderError;

    pub fn aacDecoder_Close(handle: HANDLE_AACDECODER);
}
