//! Error taxonomy, one enum per layer.
//!
//! Vault and naming errors propagate with `?`; dispatch failures are
//! aggregated instead, so one bad action never aborts its siblings.

use crate::vault::VaultAction;
use thiserror::Error;

/// Codec-level failures. Undecodable basenames are not errors; decoding
/// returns `Option` and the translator quarantines instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
    /// A name segment was empty or contained the delimiter or `/`.
    #[error("invalid name segment: {0:?}")]
    InvalidName(String),
}

/// Content-store failures.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("not a folder: {0}")]
    NotAFolder(String),

    #[error("watcher error: {0}")]
    Watch(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One action that failed during dispatch. The batch keeps going; the
/// dispatcher returns every failure at the end.
#[derive(Debug)]
pub struct DispatchFailure {
    pub action: VaultAction,
    pub error: VaultError,
}

/// Top-level failures surfaced by the library facade and the binary.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("library tree not initialized; run a scan first")]
    TreeNotInitialized,

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error("dispatch batch had {} failure(s)", .0.len())]
    Dispatch(Vec<DispatchFailure>),
}
