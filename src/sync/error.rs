use thiserror::Error;

use crate::remote::RemoteError;
use crate::store::StoreError;

/// Failure cause carried by a terminal [`Error`](crate::sync::ResourceSnapshot::Error)
/// snapshot.
///
/// The engine never retries on its own; every retry is a fresh
/// caller-initiated invocation.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Remote unreachable. Recoverable - the user can retry.
    #[error("network unavailable: {0}")]
    Network(String),

    /// Session or credentials invalid. Surfaced to trigger re-authentication,
    /// never retried internally.
    #[error("authentication expired")]
    AuthExpired,

    /// Unexpected remote payload shape. Hard error, logged with detail.
    #[error("malformed remote response: {0}")]
    RemoteFormat(String),

    /// Persistence failure. Fatal - propagated rather than dropped, since it
    /// threatens cache integrity.
    #[error("local store failure: {0}")]
    LocalStore(#[from] StoreError),
}

impl From<RemoteError> for SyncError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::NetworkUnavailable(detail) => SyncError::Network(detail),
            RemoteError::AuthenticationExpired => SyncError::AuthExpired,
            RemoteError::MalformedResponse(detail) => SyncError::RemoteFormat(detail),
        }
    }
}

impl SyncError {
    /// Whether the user can reasonably retry by re-invoking.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SyncError::Network(_))
    }
}
