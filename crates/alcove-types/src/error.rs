use thiserror::Error;

use crate::access::{AccessMode, OperationKind};

pub type Result<T> = std::result::Result<T, Error>;

/// Error surface of the content engine. The transport layer maps these onto
/// status codes; the split that matters is "request invalid or denied"
/// versus "transient storage failure, retry".
#[derive(Debug, Error)]
pub enum Error {
    /// Code is well-formed but no live room exists behind it. Also returned
    /// for malformed codes so probing reveals nothing about the keyspace.
    #[error("room not found")]
    RoomNotFound,

    #[error("{op:?} not permitted while room is {}", .mode.as_str())]
    AccessDenied { mode: AccessMode, op: OperationKind },

    #[error("room is full ({limit} items)")]
    RoomFull { limit: usize },

    #[error("payload exceeds {limit} byte limit")]
    PayloadTooLarge { limit: u64 },

    #[error("item not found")]
    ItemNotFound,

    #[error("room code allocation failed after {attempts} attempts")]
    AllocationFailure { attempts: u32 },

    /// Transient registry/metadata/blob failure. Retryable.
    #[error("storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

impl Error {
    /// True for failures worth retrying as-is; false for requests that will
    /// keep failing until the caller changes something.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::AllocationFailure { .. })
    }
}
