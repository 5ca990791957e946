//! Error types for sandpit-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SandpitError {
    #[error("scratch unit error: {0}")]
    Scratch(#[source] std::io::Error),

    #[error("failed to launch interpreter: {0}")]
    Launch(#[source] std::io::Error),

    #[error("failed to wait for child: {0}")]
    Wait(#[source] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("frame too large: {0} bytes")]
    FrameTooLarge(usize),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("sandbox is busy: {queued} submissions already queued")]
    Overloaded { queued: usize },

    #[error("admission gate closed")]
    GateClosed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rmp_serde::encode::Error> for SandpitError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Self::Protocol(format!("encode: {e}"))
    }
}

impl From<rmp_serde::decode::Error> for SandpitError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Self::Protocol(format!("decode: {e}"))
    }
}
