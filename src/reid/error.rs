//! Error type shared by the identity resolution engine.

use std::io;

use thiserror::Error;

use crate::reid::Identity;

pub type Result<T> = std::result::Result<T, ReidError>;

#[derive(Debug, Error)]
pub enum ReidError {
    /// Configuration rejected at session construction.
    #[error("malformed reid config: {0}")]
    MalformedConfig(String),

    /// Configuration could not be read or parsed.
    #[error("failed to load reid config: {0}")]
    Config(String),

    /// The embedder could not produce a vector for a crop.
    #[error("embedding failed for raw identity {identity}: {reason}")]
    Embedding { identity: Identity, reason: String },

    /// An embedding does not live in the same space as the stored ones.
    #[error("embedding dimension mismatch: store holds {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("tracklet store write failed: {0}")]
    StorageWrite(#[source] io::Error),

    #[error("tracklet store read failed: {0}")]
    StorageRead(#[source] io::Error),

    /// A session must start from an empty store.
    #[error("tracklet store already holds {records} records")]
    StoreNotEmpty { records: usize },

    /// An earlier store write failed; the session can no longer be trusted.
    #[error("reid session for camera {camera} failed and must be restarted")]
    SessionFailed { camera: String },

    #[error("no video session is open")]
    NoSession,
}

impl ReidError {
    /// Errors after which the session must be discarded.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::StorageWrite(_) | Self::MalformedConfig(_) | Self::SessionFailed { .. }
        )
    }
}

pub(crate) fn codec_error(err: bincode::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}
