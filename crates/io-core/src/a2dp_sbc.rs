//! A2DP source/sink worker loops around the SBC codec (spec §4.5,
//! component C5).

use std::sync::Arc;
use std::time::Duration;

use audio_pipeline::{ChannelVolume, Pacer, Volume};
use rtp::{RtpHeader, SbcPayloadHeader};
use sbc_codec::{A2dpSbcConfig, SbcDecoder, SbcEncoder};
use transport::{Configuration, State, Transport};

use crate::bt_io;
use crate::error::{Result, WorkerError};
use crate::pcm as pcm_io;
use crate::poll;

const RTP_HEADER_LEN: usize = RtpHeader::LEN;
const IDLE_POLL: Duration = Duration::from_millis(500);

fn load_sbc_config(transport: &Transport) -> Result<A2dpSbcConfig> {
    let inner = transport.inner.lock();
    sbc_codec::a2dp::parse(&inner.codec_config)
        .ok_or(WorkerError::InvalidState("invalid SBC codec configuration"))
}

fn channel_volume(transport: &Transport) -> ChannelVolume {
    let inner = transport.inner.lock();
    ChannelVolume::new(
        Volume::new(inner.volume_ch1, inner.muted_ch1),
        Volume::new(inner.volume_ch2, inner.muted_ch2),
    )
}

/// Reads raw PCM from the transport's pipe, volume-scales it, encodes
/// it to SBC, and transmits RTP packets over the BT socket.
pub fn source_loop(transport: &Arc<Transport>, config: &Configuration) -> Result<()> {
    let bt_fd = transport.bt_fd();
    if bt_fd < 0 {
        return Err(WorkerError::InvalidState("bt fd not set"));
    }
    let mtu = transport.write_mtu() as usize;
    if mtu == 0 || mtu <= RTP_HEADER_LEN + SbcPayloadHeader::LEN {
        return Err(WorkerError::InvalidState("write mtu too small"));
    }

    let a2dp_config = load_sbc_config(transport)?;
    let mut encoder = SbcEncoder::new(a2dp_config.config);
    let channels = a2dp_config.config.channels() as usize;
    let samples_per_block = encoder.samples_per_frame() * channels;
    let frame_len = encoder.frame_size();

    let payload_capacity = mtu - RTP_HEADER_LEN - SbcPayloadHeader::LEN;
    let blocks_per_packet = (payload_capacity / frame_len.max(1)).max(1);
    let input_capacity = samples_per_block * blocks_per_packet;

    let mut pcm_buf: Vec<i16> = Vec::with_capacity(input_capacity);
    let mut payload = vec![0u8; payload_capacity];
    let mut packet = vec![0u8; mtu];

    let mut pacer = Pacer::new(a2dp_config.config.sampling_frequency.hz());
    let mut rtp = RtpHeader::default();
    let mut anchored = false;

    loop {
        if transport.state() == State::Aborted {
            return Ok(());
        }

        let pcm = match transport.pcm() {
            Some(p) => p,
            None => {
                poll::wait(&[transport.event_fd(), -1, -1, -1], Some(IDLE_POLL))
                    .map_err(WorkerError::Io)?;
                transport.drain_event();
                continue;
            }
        };

        if pcm.fd() < 0 {
            pcm_io::open_for_read(&pcm).map_err(WorkerError::Io)?;
            anchored = false;
            transport.reset_frame_counter();
            pacer.reset();
        }

        let fds = [transport.event_fd(), pcm.fd(), -1, -1];
        let readiness = poll::wait(&fds, None).map_err(WorkerError::Io)?;

        if readiness[0].readable {
            transport.drain_event();
            transport.reset_frame_counter();
            pacer.reset();
            anchored = false;
            continue;
        }
        if !readiness[1].readable {
            continue;
        }

        let want = input_capacity - pcm_buf.len();
        if want > 0 {
            let mut scratch = vec![0i16; want];
            let n = pcm_io::read(&pcm, &mut scratch)?;
            if n > 0 {
                if !config.a2dp_volume_passthrough {
                    channel_volume(transport).apply_interleaved_i16(&mut scratch[..n], channels as u8);
                }
                pcm_buf.extend_from_slice(&scratch[..n]);

                if !anchored {
                    pacer.reset();
                    anchored = true;
                }
            }
            // n == 0 means the PCM pipe EOF'd and released itself; fall
            // through and try to encode whatever is already buffered.
        }

        let mut payload_pos = 0usize;
        let mut frame_count = 0u8;
        let mut frames_packed = 0u32;

        while pcm_buf.len() >= samples_per_block
            && payload_pos + frame_len <= payload.len()
            && frame_count < 0x0F
        {
            match encoder.encode_frame(&pcm_buf[..samples_per_block], &mut payload[payload_pos..payload_pos + frame_len]) {
                Ok(written) => {
                    payload_pos += written;
                    frame_count += 1;
                    frames_packed += encoder.samples_per_frame() as u32;
                }
                Err(e) => {
                    log::warn!("SBC encode error, dropping block: {e:?}");
                }
            }
            pcm_buf.drain(..samples_per_block);
        }

        if frame_count == 0 {
            continue;
        }

        rtp.to_bytes(&mut packet[..RTP_HEADER_LEN])
            .map_err(WorkerError::from)?;
        let payload_header = SbcPayloadHeader::unfragmented(frame_count).map_err(WorkerError::from)?;
        packet[RTP_HEADER_LEN] = payload_header.to_byte().map_err(WorkerError::from)?;
        packet[RTP_HEADER_LEN + 1..RTP_HEADER_LEN + 1 + payload_pos]
            .copy_from_slice(&payload[..payload_pos]);

        let total_len = RTP_HEADER_LEN + 1 + payload_pos;
        match bt_io::write_all(bt_fd, &packet[..total_len]) {
            Ok(()) => {}
            Err(WorkerError::PeerClosed) => return Err(WorkerError::PeerClosed),
            Err(e) => {
                log::warn!("BT write failed, continuing: {e}");
                continue;
            }
        }

        rtp.advance(frames_packed);
        transport.advance_frame_counter(frames_packed);
        let sleep = pacer.time_sync(frames_packed);
        if !sleep.is_zero() {
            std::thread::sleep(sleep);
        }
    }
}

/// Receives RTP/SBC packets over the BT socket and writes decoded PCM
/// to the transport's pipe.
pub fn sink_loop(transport: &Arc<Transport>, _config: &Configuration) -> Result<()> {
    let bt_fd = transport.bt_fd();
    if bt_fd < 0 {
        return Err(WorkerError::InvalidState("bt fd not set"));
    }
    let mtu = transport.read_mtu() as usize;
    if mtu == 0 {
        return Err(WorkerError::InvalidState("read mtu is zero"));
    }

    let a2dp_config = load_sbc_config(transport)?;
    let mut decoder = SbcDecoder::new(a2dp_config.config.subbands);
    let frame_len = a2dp_config.config.frame_size();
    let samples_per_frame = a2dp_config.config.samples_per_frame() * a2dp_config.config.channels() as usize;

    let mut bt_buf = vec![0u8; mtu];
    let mut pcm_out = vec![0i16; samples_per_frame];

    loop {
        if transport.state() == State::Aborted {
            return Ok(());
        }

        let fds = [transport.event_fd(), bt_fd, -1, -1];
        let readiness = poll::wait(&fds, None).map_err(WorkerError::Io)?;

        if readiness[0].readable {
            transport.drain_event();
            transport.reset_frame_counter();
            if transport.state() == State::Aborted {
                return Ok(());
            }
        }
        if !readiness[1].readable {
            continue;
        }

        let n = bt_io::read(bt_fd, &mut bt_buf)?;
        if n == 0 {
            return Err(WorkerError::PeerClosed);
        }

        let (header, consumed) = match rtp::RtpHeader::from_bytes(&bt_buf[..n]) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("dropping malformed RTP packet: {e}");
                continue;
            }
        };
        if header.payload_type != rtp::PAYLOAD_TYPE_DYNAMIC {
            log::warn!("dropping RTP packet with unexpected payload type {}", header.payload_type);
            continue;
        }
        if consumed >= n {
            continue;
        }

        let payload_header = SbcPayloadHeader::from_byte(bt_buf[consumed]);
        let mut offset = consumed + 1;
        let pcm = transport.pcm();
        let pcm = match pcm {
            Some(p) => p,
            None => continue,
        };
        if pcm.fd() < 0 {
            if pcm_io::open_for_write(&pcm).is_err() {
                continue;
            }
        }

        for _ in 0..payload_header.frame_count {
            if offset + 4 > n {
                log::warn!("SBC frame count exceeds available input, stopping this packet");
                break;
            }
            let remaining = &bt_buf[offset..n];
            match decoder.decode_frame(remaining, &mut pcm_out) {
                Ok(decoded) => {
                    pcm_io::write(&pcm, &pcm_out[..decoded.samples_written])?;
                    transport.advance_frame_counter(decoded.samples_written as u32 / a2dp_config.config.channels() as u32);
                    offset += frame_len;
                }
                Err(e) => {
                    log::warn!("SBC decode error, dropping frame: {e:?}");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbc_codec::ChannelMode;
    use transport::{BdAddr, Profile};

    fn sbc_config_blob(channel_mode: ChannelMode, freq_bits: u8) -> Vec<u8> {
        let cm_bits = match channel_mode {
            ChannelMode::Mono => 0x1,
            ChannelMode::DualChannel => 0x2,
            ChannelMode::Stereo => 0x4,
            ChannelMode::JointStereo => 0x8,
        };
        vec![(cm_bits << 4) | freq_bits, 0x20 | 0x1 | 0x1, 2, 53]
    }

    #[test]
    fn source_loop_rejects_unset_bt_fd() {
        let transport = Transport::new(Profile::A2dpSource, BdAddr::ANY, 672, 672);
        let config = Configuration::default();
        let result = source_loop(&transport, &config);
        assert!(matches!(result, Err(WorkerError::InvalidState(_))));
    }

    #[test]
    fn source_loop_rejects_tiny_mtu() {
        let transport = Transport::new(Profile::A2dpSource, BdAddr::ANY, 8, 8);
        transport.set_bt_fd(3);
        let config = Configuration::default();
        let result = source_loop(&transport, &config);
        assert!(matches!(result, Err(WorkerError::InvalidState(_))));
    }

    #[test]
    fn load_sbc_config_rejects_missing_blob() {
        let transport = Transport::new(Profile::A2dpSource, BdAddr::ANY, 672, 672);
        assert!(load_sbc_config(&transport).is_err());
    }

    #[test]
    fn load_sbc_config_parses_a_valid_blob() {
        let transport = Transport::new(Profile::A2dpSource, BdAddr::ANY, 672, 672);
        transport.inner.lock().codec_config = sbc_config_blob(ChannelMode::JointStereo, 0x2);
        let parsed = load_sbc_config(&transport).unwrap();
        assert_eq!(parsed.config.channel_mode, ChannelMode::JointStereo);
    }
}
