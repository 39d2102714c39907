//! SCO voice-path worker (spec §4.8, component C8): multiplexes the
//! Bluetooth SCO socket with the speaker/microphone PCM pipes, and
//! switches between CVSD passthrough and the mSBC framer (`msbc_io`)
//! depending on the negotiated codec.

use std::sync::Arc;
use std::time::Duration;

use audio_pipeline::Pacer;
use transport::{CodecId, Configuration, State, Transport};

use crate::bt_io;
use crate::error::{Result, WorkerError};
use crate::msbc_io::MsbcIo;
use crate::pcm as pcm_io;
use crate::poll;

const IDLE_POLL: Duration = Duration::from_millis(500);
/// 16 kHz mono mSBC speech; the sample rate the pacer times the
/// speaker-PCM read against.
const MSBC_SAMPLE_RATE: u32 = 16_000;
/// 8 kHz mono CVSD speech.
const CVSD_SAMPLE_RATE: u32 = 8_000;

/// Whether the BT SCO connection is currently acquired (radio
/// bandwidth reserved) or released, tracked locally by the worker --
/// the control plane only learns about it through `transport`'s state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScoLink {
    Released,
    Acquired,
}

pub fn worker_loop(transport: &Arc<Transport>, config: &Configuration) -> Result<()> {
    let bt_fd = transport.bt_fd();
    if bt_fd < 0 {
        return Err(WorkerError::InvalidState("sco fd not set"));
    }

    let is_msbc = matches!(transport.inner.lock().codec, CodecId::Msbc);
    let mut msbc = is_msbc.then(MsbcIo::new);
    let mut link = ScoLink::Released;
    let mut pacer = Pacer::new(if is_msbc { MSBC_SAMPLE_RATE } else { CVSD_SAMPLE_RATE });
    let mut cvsd_mtu_detected = false;

    loop {
        if transport.state() == State::Aborted {
            release_link(transport, bt_fd, &mut link);
            return Ok(());
        }

        let speaker = transport.pcm();
        let speaker_fd = speaker.as_ref().map(|p| p.fd()).unwrap_or(-1);
        let bt_poll_fd = if link == ScoLink::Acquired { bt_fd } else { -1 };

        let fds = [transport.event_fd(), bt_poll_fd, speaker_fd, -1];
        let readiness = poll::wait(&fds, Some(IDLE_POLL)).map_err(WorkerError::Io)?;

        if readiness[0].readable {
            transport.drain_event();
            if transport.state() == State::Aborted {
                release_link(transport, bt_fd, &mut link);
                return Ok(());
            }
            reconcile_link(transport, bt_fd, &mut link, &mut msbc, &mut pacer)?;
            continue;
        }

        if link != ScoLink::Acquired {
            continue;
        }

        if readiness[1].readable {
            handle_bt_readable(transport, bt_fd, is_msbc, &mut msbc, &mut cvsd_mtu_detected)?;
        }

        if readiness[2].readable {
            if let Some(speaker) = transport.pcm() {
                handle_speaker_readable(
                    transport,
                    bt_fd,
                    &speaker,
                    config,
                    is_msbc,
                    &mut msbc,
                    &mut pacer,
                )?;
            }
        }
    }
}

/// Best-effort opens of the speaker/mic pipes, then acquires or
/// releases the BT SCO connection based on whether either pipe is now
/// open, per spec §4.8's event handling.
fn reconcile_link(
    transport: &Arc<Transport>,
    bt_fd: i32,
    link: &mut ScoLink,
    msbc: &mut Option<MsbcIo>,
    pacer: &mut Pacer,
) -> Result<()> {
    if let Some(speaker) = transport.pcm() {
        if speaker.fd() < 0 {
            let _ = pcm_io::open_for_read(&speaker);
        }
    }
    if let Some(mic) = transport.pcm_mic() {
        if mic.fd() < 0 {
            let _ = pcm_io::open_for_write(&mic);
        }
    }

    let speaker_open = transport.pcm().map(|p| p.fd() >= 0).unwrap_or(false);
    let mic_open = transport.pcm_mic().map(|p| p.fd() >= 0).unwrap_or(false);

    if !speaker_open && !mic_open {
        release_link(transport, bt_fd, link);
        return Ok(());
    }

    if *link != ScoLink::Acquired {
        bt_io::set_nonblocking(bt_fd, true).map_err(WorkerError::Io)?;
        if let Some(state) = msbc.as_mut() {
            state.reset();
        }
        pacer.reset();
        *link = ScoLink::Acquired;
        log::debug!("SCO link acquired for transport {}", transport.addr);
    }
    Ok(())
}

fn release_link(transport: &Arc<Transport>, _bt_fd: i32, link: &mut ScoLink) {
    if *link == ScoLink::Acquired {
        log::debug!("releasing SCO link for transport {} (both pipes closed)", transport.addr);
    }
    *link = ScoLink::Released;
    transport.reset_frame_counter();
}

fn handle_bt_readable(
    transport: &Arc<Transport>,
    bt_fd: i32,
    is_msbc: bool,
    msbc: &mut Option<MsbcIo>,
    cvsd_mtu_detected: &mut bool,
) -> Result<()> {
    let mut buf = vec![0u8; transport.read_mtu().max(128) as usize];
    let n = match bt_io::read(bt_fd, &mut buf) {
        Ok(0) => return Err(WorkerError::PeerClosed),
        Ok(n) => n,
        Err(WorkerError::Io(e)) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
        Err(e) => return Err(e),
    };

    let mic = transport.pcm_mic();

    if is_msbc {
        let state = msbc.as_mut().expect("mSBC codec state allocated for mSBC transport");
        let mut pcm_out = Vec::new();
        state.push_encoded(&buf[..n], &mut pcm_out);
        if let Some(mic) = mic {
            if mic.fd() >= 0 && !pcm_out.is_empty() {
                pcm_io::write(&mic, &pcm_out)?;
            }
        }
        // mic pipe closed: decoded audio is simply discarded, per
        // spec §4.8's "or discard when mic pipe closed".
    } else {
        if !*cvsd_mtu_detected {
            transport.set_mtu(n as u16, n as u16);
            *cvsd_mtu_detected = true;
        }
        if let Some(mic) = mic {
            if mic.fd() >= 0 {
                let samples: Vec<i16> = buf[..n]
                    .chunks_exact(2)
                    .map(|c| i16::from_le_bytes([c[0], c[1]]))
                    .collect();
                pcm_io::write(&mic, &samples)?;
            }
        }
    }
    Ok(())
}

fn handle_speaker_readable(
    transport: &Arc<Transport>,
    bt_fd: i32,
    speaker: &transport::Pcm,
    config: &Configuration,
    is_msbc: bool,
    msbc: &mut Option<MsbcIo>,
    pacer: &mut Pacer,
) -> Result<()> {
    if is_msbc {
        let state = msbc.as_mut().expect("mSBC codec state allocated for mSBC transport");
        let mut samples = vec![0i16; sbc_codec::MSBC_SAMPLES_PER_FRAME];
        let n = pcm_io::read(speaker, &mut samples)?;
        if n == 0 {
            return Ok(());
        }
        state.push_pcm(&samples[..n]);

        if state.chunk_ready(config.sco_wire_quantum, config.msbc_prebuffer_frames) {
            if let Some(chunk) = state.take_chunk(config.sco_wire_quantum) {
                match bt_io::write_all(bt_fd, &chunk) {
                    Ok(()) => {}
                    Err(WorkerError::PeerClosed) => return Err(WorkerError::PeerClosed),
                    Err(e) => log::warn!("SCO write failed, continuing: {e}"),
                }
            }
        }
        transport.advance_frame_counter(n as u32);
        let sleep = pacer.time_sync(n as u32);
        if !sleep.is_zero() {
            std::thread::sleep(sleep);
        }
    } else {
        let write_mtu = transport.write_mtu().max(2) as usize;
        let want_samples = write_mtu / 2;
        let mut samples = vec![0i16; want_samples];
        let n = pcm_io::read(speaker, &mut samples)?;
        if n == 0 {
            return Ok(());
        }
        let mut bytes = Vec::with_capacity(n * 2);
        for s in &samples[..n] {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        match bt_io::write_all(bt_fd, &bytes) {
            Ok(()) => {}
            Err(WorkerError::PeerClosed) => return Err(WorkerError::PeerClosed),
            Err(e) => log::warn!("SCO write failed, continuing: {e}"),
        }
        transport.advance_frame_counter(n as u32);
        let sleep = pacer.time_sync(n as u32);
        if !sleep.is_zero() {
            std::thread::sleep(sleep);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use transport::{BdAddr, Profile};

    #[test]
    fn worker_loop_rejects_unset_fd() {
        let transport = Transport::new(Profile::HspAg, BdAddr::ANY, 48, 48);
        let config = Configuration::default();
        let result = worker_loop(&transport, &config);
        assert!(matches!(result, Err(WorkerError::InvalidState(_))));
    }

    #[test]
    fn release_link_resets_frame_counter() {
        let transport = Transport::new(Profile::HspAg, BdAddr::ANY, 48, 48);
        transport.advance_frame_counter(500);
        let mut link = ScoLink::Acquired;
        release_link(&transport, -1, &mut link);
        assert_eq!(transport.frame_counter(), 0);
        assert_eq!(link, ScoLink::Released);
    }

    #[test]
    fn reconcile_link_stays_released_with_no_pipes_attached() {
        let transport = Transport::new(Profile::HspAg, BdAddr::ANY, 48, 48);
        transport.set_bt_fd(3);
        let mut link = ScoLink::Released;
        let mut msbc = None;
        let mut pacer = Pacer::new(CVSD_SAMPLE_RATE);
        reconcile_link(&transport, 3, &mut link, &mut msbc, &mut pacer).unwrap();
        assert_eq!(link, ScoLink::Released);
    }
}
