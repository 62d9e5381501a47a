// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Cardkeeper.

use thiserror::Error;

/// Top-level error type for all Cardkeeper operations.
///
/// Detection failures never reach callers through this type: every detector
/// error is folded into the "no rectangle" fallback before it leaves the scan
/// crate.
#[derive(Debug, Error)]
pub enum CardkeeperError {
    // -- Pixels --
    #[error("image processing failed: {0}")]
    ImageError(String),

    // -- Detection (internal) --
    #[error("rectangle detection unavailable: {0}")]
    DetectionUnavailable(String),

    // -- Cropping --
    #[error("perspective crop failed: {0}")]
    CropFailed(String),

    #[error("crop session is not ready (state: {state})")]
    SessionNotReady { state: String },

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CardkeeperError>;
