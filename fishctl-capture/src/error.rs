//! Error types for fishctl-capture.

use crate::portal::{ResponseCode, Stage};
use thiserror::Error;

/// Fatal failures of the ScreenCast handshake
#[derive(Error, Debug)]
pub enum NegotiationError {
    #[error("{stage} rejected by the portal: {code}")]
    Rejected { stage: Stage, code: ResponseCode },

    #[error("{stage} call failed: {source}")]
    Call {
        stage: Stage,
        #[source]
        source: zbus::Error,
    },

    #[error("{stage} cancelled before the portal responded")]
    Cancelled { stage: Stage },

    #[error("portal response carried no session handle")]
    MissingSessionHandle,

    #[error("portal started the cast without any stream")]
    NoStreams,

    #[error("request token {0} is already registered")]
    DuplicateToken(String),

    #[error("negotiation already {0}")]
    InvalidState(&'static str),
}

/// A frame sample that cannot be turned into a pixel array
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame has zero width or height")]
    EmptyFrame,

    #[error("unsupported pixel format {0}")]
    UnsupportedFormat(String),

    #[error("buffer holds {actual} bytes, {expected} needed")]
    ShortBuffer { expected: usize, actual: usize },

    #[error("row stride {stride} smaller than row size {row_bytes}")]
    BadStride { stride: usize, row_bytes: usize },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Negotiation failed: {0}")]
    Negotiation(#[from] NegotiationError),

    #[error("Decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("DBus error: {0}")]
    Dbus(#[from] zbus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
