//! Error taxonomy for trace evaluation.
//!
//! Only `MalformedTrace` is fatal. Every other variant is isolated to the step
//! or comparison that raised it and surfaces as a skip reason or an
//! inconclusive verdict.
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum OracleError {
    #[error("malformed trace {path}: {reason}")]
    MalformedTrace { path: PathBuf, reason: String },

    #[error("missing asset {asset} (tried: {})", tried.join(", "))]
    MissingAsset { asset: String, tried: Vec<String> },

    #[error("unparsable command at step {sequence_index}: {reason}")]
    UnparsableCommand { sequence_index: u32, reason: String },

    #[error("{backend} backend failed: {reason}")]
    DetectionBackend {
        backend: &'static str,
        reason: String,
    },
}

impl OracleError {
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedTrace {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn missing(asset: impl Into<String>, tried: Vec<String>) -> Self {
        Self::MissingAsset {
            asset: asset.into(),
            tried,
        }
    }

    pub fn backend(backend: &'static str, reason: impl Into<String>) -> Self {
        Self::DetectionBackend {
            backend,
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code used in reports.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedTrace { .. } => "malformed_trace",
            Self::MissingAsset { .. } => "missing_asset",
            Self::UnparsableCommand { .. } => "unparsable_command",
            Self::DetectionBackend { .. } => "detection_backend",
        }
    }
}

/// Serializable reason attached to skipped steps and inconclusive verdicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipReason {
    pub sequence_index: u32,
    pub code: String,
    pub message: String,
}

impl SkipReason {
    pub fn from_error(sequence_index: u32, err: &OracleError) -> Self {
        Self {
            sequence_index,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }

    pub fn new(sequence_index: u32, code: &str, message: impl Into<String>) -> Self {
        Self {
            sequence_index,
            code: code.to_string(),
            message: message.into(),
        }
    }
}
