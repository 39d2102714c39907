//! RFCOMM control-channel worker (spec §4.9, component C9): owns the
//! socket I/O and SCO-sibling bookkeeping around `hfp`'s pure AT
//! dispatcher, the same split `a2dp_sbc`/`a2dp_aac` keep between
//! "worker owns the fd" and "a codec/state-machine crate owns the
//! pure logic".

use std::sync::Arc;
use std::time::Duration;

use hfp::{dispatch, AgOutcome, AtCommand, SlcState};
use transport::{State, Transport};

use crate::bt_io;
use crate::error::{Result, WorkerError};
use crate::poll;

/// Longest single read off the RFCOMM socket per spec §4.9 ("read up
/// to 64 bytes").
const RFCOMM_READ_LEN: usize = 64;

/// Runs the AG side of one HFP/HSP service-level connection: parses AT
/// commands from the HF, dispatches them through `hfp::dispatch`, and
/// pushes unsolicited `+VGM`/`+VGS` updates when the paired SCO
/// transport's gain fields change underneath it.
pub fn worker_loop(transport: &Arc<Transport>, msbc_enabled: bool) -> Result<()> {
    let fd = transport.bt_fd();
    if fd < 0 {
        return Err(WorkerError::InvalidState("rfcomm fd not set"));
    }

    let mut state = SlcState::new(msbc_enabled);
    let mut last_mic_gain: Option<u8> = None;
    let mut last_speaker_gain: Option<u8> = None;
    let mut buf = [0u8; RFCOMM_READ_LEN];

    loop {
        if transport.state() == State::Aborted {
            return Ok(());
        }

        let fds = [transport.event_fd(), fd, -1, -1];
        let readiness = poll::wait(&fds, None).map_err(WorkerError::Io)?;

        if readiness[0].readable {
            transport.drain_event();
            if transport.state() == State::Aborted {
                return Ok(());
            }
            if let Some(sco) = transport.paired() {
                let inner = sco.inner.lock();
                if last_mic_gain != Some(inner.mic_gain) {
                    last_mic_gain = Some(inner.mic_gain);
                    write_response(fd, &AtCommand::frame_response(&format!("+VGM={}", inner.mic_gain)))?;
                }
                if last_speaker_gain != Some(inner.speaker_gain) {
                    last_speaker_gain = Some(inner.speaker_gain);
                    write_response(fd, &AtCommand::frame_response(&format!("+VGS={}", inner.speaker_gain)))?;
                }
            }
        }

        if !readiness[1].readable {
            continue;
        }

        let n = bt_io::read(fd, &mut buf)?;
        if n == 0 {
            return Err(WorkerError::PeerClosed);
        }

        let text = String::from_utf8_lossy(&buf[..n]);
        let outcome = match AtCommand::parse(&text) {
            Ok(cmd) => dispatch(&cmd, &mut state),
            Err(e) => {
                log::warn!("malformed AT command, replying ERROR: {e}");
                AgOutcome {
                    chunks: vec![AtCommand::frame_response("ERROR")],
                    ..Default::default()
                }
            }
        };

        apply_gain_updates(transport, &outcome);
        for chunk in &outcome.chunks {
            write_response(fd, chunk)?;
        }

        transport.inner.lock().hf_features = state.hf_features;
    }
}

fn apply_gain_updates(transport: &Transport, outcome: &AgOutcome) {
    let Some(sco) = transport.paired() else {
        return;
    };
    let mut inner = sco.inner.lock();
    if let Some(mic) = outcome.mic_gain {
        inner.mic_gain = mic;
    }
    if let Some(speaker) = outcome.speaker_gain {
        inner.speaker_gain = speaker;
    }
}

fn write_response(fd: i32, text: &str) -> Result<()> {
    match bt_io::write_all(fd, text.as_bytes()) {
        Ok(()) => Ok(()),
        Err(WorkerError::PeerClosed) => Err(WorkerError::PeerClosed),
        Err(e) => {
            log::warn!("RFCOMM write failed, continuing: {e}");
            Ok(())
        }
    }
}

/// Poll cadence used while idle-waiting isn't applicable here (the
/// worker always blocks in `poll::wait` with no timeout); kept for
/// symmetry with the A2DP loops' `IDLE_POLL` and documented in case a
/// future keepalive ping needs one.
#[allow(dead_code)]
const IDLE_POLL: Duration = Duration::from_millis(500);

#[cfg(test)]
mod tests {
    use super::*;
    use transport::{BdAddr, Profile};

    #[test]
    fn worker_loop_rejects_unset_fd() {
        let transport = Transport::new(Profile::HfpAg, BdAddr::ANY, 64, 64);
        let result = worker_loop(&transport, true);
        assert!(matches!(result, Err(WorkerError::InvalidState(_))));
    }

    #[test]
    fn gain_updates_apply_to_paired_sco_transport() {
        let rfcomm = Transport::new(Profile::HfpAg, BdAddr::ANY, 64, 64);
        let sco = Transport::new(Profile::HfpAg, BdAddr::ANY, 48, 48);
        rfcomm.set_paired(&sco);

        let outcome = AgOutcome {
            chunks: vec![],
            mic_gain: Some(9),
            speaker_gain: Some(11),
        };
        apply_gain_updates(&rfcomm, &outcome);

        assert_eq!(sco.inner.lock().mic_gain, 9);
        assert_eq!(sco.inner.lock().speaker_gain, 11);
    }

    #[test]
    fn gain_updates_are_noop_without_a_paired_transport() {
        let rfcomm = Transport::new(Profile::HfpAg, BdAddr::ANY, 64, 64);
        let outcome = AgOutcome {
            chunks: vec![],
            mic_gain: Some(1),
            speaker_gain: Some(1),
        };
        apply_gain_updates(&rfcomm, &outcome);
    }
}
