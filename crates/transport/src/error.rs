//! Error types shared by the transport/worker layer

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport already released")]
    AlreadyReleased,

    #[error("pcm fifo not acquired")]
    PcmNotAcquired,

    #[error("codec configuration invalid: {0}")]
    InvalidCodecConfig(&'static str),

    #[error("configuration invalid: {0}")]
    InvalidConfiguration(&'static str),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = core::result::Result<T, TransportError>;
