// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the measurement core.

use thiserror::Error;

/// Errors that can occur in the visitor and session lifecycle.
///
/// Most lifecycle operations are infallible. These errors cover configuration
/// mistakes, parsing of persisted values, and failures reported by an injected
/// key-value store.
#[derive(Debug, Error)]
pub enum SessionsError {
	/// Sample rate is not a number
	#[error("invalid sample rate: {0}")]
	InvalidSampleRate(f64),

	/// Session numbers start at 1
	#[error("invalid session number: {0}")]
	InvalidSessionNumber(u32),

	/// Invalid session status string
	#[error("invalid session status: {0}")]
	InvalidSessionStatus(String),

	/// Invalid visitor status string
	#[error("invalid visitor status: {0}")]
	InvalidVisitorStatus(String),

	/// Persisted client id could not be parsed
	#[error("invalid client ID: {0}")]
	InvalidClientId(String),

	/// Hit id could not be parsed
	#[error("invalid hit ID: {0}")]
	InvalidHitId(String),

	/// Key-value store failure
	#[error("storage error: {0}")]
	Storage(String),

	/// Serialization error
	#[error("serialization error: {0}")]
	Serialization(String),
}

impl From<serde_json::Error> for SessionsError {
	fn from(err: serde_json::Error) -> Self {
		SessionsError::Serialization(err.to_string())
	}
}

/// Result type for measurement core operations.
pub type Result<T> = std::result::Result<T, SessionsError>;
