//! Typed error hierarchy for the attest orchestrator.
//!
//! `StoreError` covers result-store persistence and migration failures;
//! `VerifyError` covers orchestration failures surfaced to the CLI.
//!
//! Expected failure modes (a check exiting non-zero, an agent returning
//! garbage, git being unavailable) are represented as data on the result
//! types, not as errors. These enums carry the failures that genuinely
//! cannot be folded into a verdict.

use thiserror::Error;

/// Errors from the result store and the legacy-format migration.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read {path}: {source}")]
    ReadFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    WriteFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory {path}: {source}")]
    DirCreateFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt store file {path}: {source}")]
    Corrupt {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize run record for feature '{feature_id}': {source}")]
    SerializeFailed {
        feature_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to back up legacy results file to {path}: {source}")]
    BackupFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors surfaced by the verification orchestrator to its caller.
///
/// A failed verification is not an error: it is a saved result with a
/// `fail` or `needs_review` verdict. The only persistence failure that
/// propagates is losing the current feature's own record.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Feature '{id}' not found in features file")]
    FeatureNotFound { id: String },

    #[error("Failed to read features file at {path}: {source}")]
    FeaturesReadFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid features file at {path}: {source}")]
    FeaturesInvalid {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
