//! Per-transport worker loops for the Bluetooth audio I/O engine.
//!
//! Each `*_loop`/`worker_loop` function in this crate is meant to be
//! handed to `std::thread::spawn` by the control plane, one per
//! `Transport`, and run until it returns (normally only on a fatal
//! error or the transport moving to [`transport::State::Aborted`]).
//! None of these functions install a logger or mask `SIGPIPE`
//! themselves -- see [`signal::ignore_sigpipe`] and the module docs on
//! why that's a host/binary responsibility, not a library one.

pub mod a2dp_aac;
pub mod a2dp_sbc;
pub mod bt_io;
pub mod error;
pub mod event;
pub mod msbc_io;
pub mod pcm;
pub mod poll;
pub mod rfcomm;
pub mod sco;
pub mod signal;

pub use error::{Result, WorkerError};

use std::sync::Arc;

use transport::{CodecId, Configuration, Profile, Transport};

/// Dispatch one transport to the worker loop appropriate for its
/// profile and negotiated codec. This is the one place that knows how
/// spec.md's nine components (C1-C9) compose into the three pipelines
/// described in spec.md §1 -- A2DP sink, A2DP source, HFP/HSC voice --
/// so a control plane only has to pick a thread-spawn strategy, not
/// which loop function to call.
pub fn run_worker(transport: &Arc<Transport>, config: &Configuration) -> Result<()> {
    let codec = transport.inner.lock().codec;
    match (transport.profile, codec) {
        (Profile::A2dpSource, CodecId::Sbc) => a2dp_sbc::source_loop(transport, config),
        (Profile::A2dpSink, CodecId::Sbc) => a2dp_sbc::sink_loop(transport, config),
        (Profile::A2dpSource, CodecId::Mpeg24Aac) => a2dp_aac::source_loop(transport, config),
        (Profile::A2dpSink, CodecId::Mpeg24Aac) => a2dp_aac::sink_loop(transport, config),
        // A voice (SCO) transport is tagged with the same AG profile as
        // its paired RFCOMM control channel, so the negotiated SCO
        // codec -- not the profile -- is what tells the two apart: only
        // an actual Sco-branch transport ever carries CVSD/mSBC here
        // (spec §3's `Transport` variant). Check this before the
        // catch-all AG arm below.
        (_, CodecId::Cvsd) | (_, CodecId::Msbc) => sco::worker_loop(transport, config),
        (Profile::HfpAg, _) | (Profile::HspAg, _) => {
            rfcomm::worker_loop(transport, config.msbc_capable)
        }
        (Profile::HfpHf, _) | (Profile::HspHf, _) => {
            Err(WorkerError::InvalidState("HF/client role is out of this engine's AG-only scope"))
        }
        _ => Err(WorkerError::InvalidState("unsupported profile/codec combination")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transport::BdAddr;

    #[test]
    fn run_worker_rejects_hf_client_role() {
        let transport = Transport::new(Profile::HfpHf, BdAddr::ANY, 64, 64);
        let config = Configuration::default();
        let result = run_worker(&transport, &config);
        assert!(matches!(result, Err(WorkerError::InvalidState(_))));
    }

    #[test]
    fn run_worker_rejects_transport_with_no_fd() {
        let transport = Transport::new(Profile::A2dpSource, BdAddr::ANY, 672, 672);
        let config = Configuration::default();
        let result = run_worker(&transport, &config);
        assert!(matches!(result, Err(WorkerError::InvalidState(_))));
    }
}
