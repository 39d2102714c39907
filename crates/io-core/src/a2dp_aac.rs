//! A2DP source/sink worker loops around the AAC-LATM codec (spec §4.6,
//! component C6). Structurally identical to `a2dp_sbc`'s loops -- same
//! poll/read/scale/encode/pace/write shape -- but the payload is a
//! single (possibly fragmented) LATM frame per RTP group instead of a
//! packed run of fixed-size SBC frames.

use std::sync::Arc;
use std::time::Duration;

use aac_codec::{A2dpAacConfig, Decoder, Encoder, EncoderConfig, AAC_LC_FRAME_SAMPLES};
use audio_pipeline::{ChannelVolume, Pacer, Volume};
use rtp::{AacDepacketizer, AacPacketizer, RtpHeader};
use transport::{Configuration, State, Transport};

use crate::bt_io;
use crate::error::{Result, WorkerError};
use crate::pcm as pcm_io;
use crate::poll;

const RTP_HEADER_LEN: usize = RtpHeader::LEN;
const IDLE_POLL: Duration = Duration::from_millis(500);

fn load_aac_config(transport: &Transport) -> Result<A2dpAacConfig> {
    let inner = transport.inner.lock();
    aac_codec::a2dp::parse(&inner.codec_config)
        .ok_or(WorkerError::InvalidState("invalid AAC codec configuration"))
}

fn channel_volume(transport: &Transport) -> ChannelVolume {
    let inner = transport.inner.lock();
    ChannelVolume::new(
        Volume::new(inner.volume_ch1, inner.muted_ch1),
        Volume::new(inner.volume_ch2, inner.muted_ch2),
    )
}

/// Reads raw PCM from the transport's pipe, volume-scales it, encodes
/// one AAC-LATM frame at a time, and transmits it over one or more RTP
/// packets (fragmenting when the frame exceeds `MTU - rtp_header_len`,
/// per spec §4.4/§4.6).
pub fn source_loop(transport: &Arc<Transport>, config: &Configuration) -> Result<()> {
    let bt_fd = transport.bt_fd();
    if bt_fd < 0 {
        return Err(WorkerError::InvalidState("bt fd not set"));
    }
    let mtu = transport.write_mtu() as usize;
    if mtu == 0 || mtu <= RTP_HEADER_LEN {
        return Err(WorkerError::InvalidState("write mtu too small"));
    }

    let a2dp_config = load_aac_config(transport)?;
    let mut encoder = Encoder::new(&EncoderConfig {
        sample_rate: a2dp_config.sample_rate,
        channels: a2dp_config.channels,
        bitrate: a2dp_config.bitrate,
        vbr_mode: a2dp_config.vbr && config.aac_vbr_mode,
        afterburner: config.aac_afterburner,
        audio_object_type: a2dp_config.object_type.fdk_aot(),
    })
    .map_err(WorkerError::from)?;

    let channels = a2dp_config.channels as usize;
    let samples_per_block = AAC_LC_FRAME_SAMPLES * channels;
    let payload_capacity = mtu - RTP_HEADER_LEN;
    let packetizer = AacPacketizer::new(payload_capacity);

    let mut pcm_buf: Vec<i16> = Vec::with_capacity(samples_per_block);
    let mut packet = vec![0u8; mtu];

    let mut pacer = Pacer::new(a2dp_config.sample_rate);
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

        let want = samples_per_block - pcm_buf.len();
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
        }

        if pcm_buf.len() < samples_per_block {
            continue;
        }

        let frame = match encoder.encode(&pcm_buf[..samples_per_block]) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("AAC encode error, dropping block: {e}");
                pcm_buf.drain(..samples_per_block);
                continue;
            }
        };

        if frame.is_empty() {
            pcm_buf.drain(..samples_per_block);
            continue;
        }

        for fragment in packetizer.fragment(frame) {
            rtp.marker = fragment.marker;
            rtp.to_bytes(&mut packet[..RTP_HEADER_LEN])
                .map_err(WorkerError::from)?;
            packet[RTP_HEADER_LEN..RTP_HEADER_LEN + fragment.data.len()]
                .copy_from_slice(fragment.data);

            let total_len = RTP_HEADER_LEN + fragment.data.len();
            match bt_io::write_all(bt_fd, &packet[..total_len]) {
                Ok(()) => {}
                Err(WorkerError::PeerClosed) => return Err(WorkerError::PeerClosed),
                Err(e) => {
                    log::warn!("BT write failed, continuing: {e}");
                    continue;
                }
            }
            rtp.advance(0);
        }
        rtp.marker = false;

        pcm_buf.drain(..samples_per_block);
        transport.advance_frame_counter(AAC_LC_FRAME_SAMPLES as u32);
        let frames_for_timestamp = AAC_LC_FRAME_SAMPLES as u32;
        rtp.timestamp = rtp.timestamp.wrapping_add(frames_for_timestamp);
        let sleep = pacer.time_sync(frames_for_timestamp);
        if !sleep.is_zero() {
            std::thread::sleep(sleep);
        }
    }
}

/// Receives (possibly fragmented) RTP/AAC-LATM packets over the BT
/// socket, reassembles whole frames, and writes decoded PCM to the
/// transport's pipe.
pub fn sink_loop(transport: &Arc<Transport>, _config: &Configuration) -> Result<()> {
    let bt_fd = transport.bt_fd();
    if bt_fd < 0 {
        return Err(WorkerError::InvalidState("bt fd not set"));
    }
    let mtu = transport.read_mtu() as usize;
    if mtu == 0 {
        return Err(WorkerError::InvalidState("read mtu is zero"));
    }

    let a2dp_config = load_aac_config(transport)?;
    let mut decoder = Decoder::new(a2dp_config.channels).map_err(WorkerError::from)?;
    let mut depacketizer = AacDepacketizer::new();

    let mut bt_buf = vec![0u8; mtu];
    let mut expected_seq: Option<u16> = None;

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

        // A sequence gap mid-reassembly means a fragment was lost;
        // discard the partial frame rather than hand the decoder a
        // corrupt LATM stream (spec §7 "protocol violation").
        if let Some(expected) = expected_seq {
            if header.sequence_number != expected && depacketizer.is_reassembling() {
                log::warn!("RTP sequence gap during AAC reassembly, discarding partial frame");
                depacketizer.reset();
            }
        }
        expected_seq = Some(header.sequence_number.wrapping_add(1));

        let frame = match depacketizer.push(&bt_buf[consumed..n], header.marker) {
            Some(f) => f,
            None => continue,
        };

        let pcm = match transport.pcm() {
            Some(p) => p,
            None => continue,
        };
        if pcm.fd() < 0 && pcm_io::open_for_write(&pcm).is_err() {
            continue;
        }

        match decoder.decode(&frame) {
            Ok(pcm_samples) => {
                if pcm_samples.is_empty() {
                    continue;
                }
                let want = AAC_LC_FRAME_SAMPLES * a2dp_config.channels as usize;
                let n_samples = want.min(pcm_samples.len());
                pcm_io::write(&pcm, &pcm_samples[..n_samples])?;
                transport.advance_frame_counter(AAC_LC_FRAME_SAMPLES as u32);
            }
            Err(e) => {
                log::warn!("AAC decode error, dropping frame: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transport::{BdAddr, Profile};

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
    fn load_aac_config_rejects_missing_blob() {
        let transport = Transport::new(Profile::A2dpSource, BdAddr::ANY, 672, 672);
        assert!(load_aac_config(&transport).is_err());
    }

    #[test]
    fn load_aac_config_parses_a_valid_blob() {
        let transport = Transport::new(Profile::A2dpSource, BdAddr::ANY, 672, 672);
        // object_type=MPEG4 LC(0x40), 48000 (0x008: byte1=0x00,byte2 hi nibble=0x8),
        // stereo (0x1<<2=0x04), vbr off, bitrate 320000 (0x04E200).
        transport.inner.lock().codec_config =
            vec![0x40, 0x00, 0x84, 0x04, 0xE2, 0x00];
        let parsed = load_aac_config(&transport).unwrap();
        assert_eq!(parsed.sample_rate, 48000);
        assert_eq!(parsed.channels, 2);
    }
}
