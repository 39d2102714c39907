//! Composite worker error type (spec §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("transport error: {0}")]
    Transport(#[from] transport::TransportError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid transport state at worker startup: {0}")]
    InvalidState(&'static str),
    #[error("sbc codec error: {0:?}")]
    Sbc(sbc_codec::SbcError),
    #[error("aac codec error: {0}")]
    Aac(#[from] aac_codec::CodecError),
    #[error("rtp framing error: {0}")]
    Rtp(#[from] rtp::RtpError),
    #[error("peer closed the connection")]
    PeerClosed,
}

impl From<sbc_codec::SbcError> for WorkerError {
    fn from(e: sbc_codec::SbcError) -> Self {
        WorkerError::Sbc(e)
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;
