//! HFP/HSP control-plane logic for the Bluetooth audio I/O engine
//! (spec §4.9, component C9): AT-command parsing, feature negotiation,
//! and the AG response table. The RFCOMM worker that owns the socket
//! I/O and SCO pairing lives in `io-core`; this crate is the pure,
//! unit-testable state machine it drives.

pub mod at;
pub mod features;
pub mod responder;

pub use at::{AtCommand, AtError, AtType};
pub use features::ag_features;
pub use responder::{dispatch, AgOutcome, ScoCodec, SlcState};
