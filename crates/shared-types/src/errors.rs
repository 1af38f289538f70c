//! # Error Types
//!
//! Defines error types shared between the store and its consumers.

use thiserror::Error;

/// Errors surfaced by the blockchain store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Backend read failed.
    #[error("Store read failed for {contract}/{key}: {reason}")]
    ReadFailed {
        contract: String,
        key: String,
        reason: String,
    },

    /// A stored value could not be decoded.
    #[error("Corrupt value under {contract}/{key}: {reason}")]
    Corrupt {
        contract: String,
        key: String,
        reason: String,
    },
}
