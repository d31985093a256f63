// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the measurement SDK.

use loom_measure_core::SessionsError;
use thiserror::Error;

use crate::config::ConfigError;

/// Measurement SDK errors.
#[derive(Debug, Error)]
pub enum MeasureError {
	/// Client has been shut down.
	#[error("client has been shut down")]
	ClientShutdown,

	/// Base URL is missing or invalid.
	#[error("invalid base URL: {0}")]
	InvalidBaseUrl(String),

	/// HTTP request failed.
	#[error("HTTP request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// Server returned an error response.
	#[error("server error ({status}): {message}")]
	ServerError { status: u16, message: String },

	/// Rate limited by the server.
	#[error("rate limited, retry after {retry_after_secs:?} seconds")]
	RateLimited { retry_after_secs: Option<u64> },

	/// Session lifecycle or storage error.
	#[error(transparent)]
	Sessions(#[from] SessionsError),

	/// Configuration could not be loaded.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// Serialization error.
	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	/// Local I/O failed.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

impl MeasureError {
	/// Whether the hand-off could succeed if tried again later.
	pub fn is_retryable(&self) -> bool {
		match self {
			MeasureError::RequestFailed(e) => e.is_timeout() || e.is_connect(),
			MeasureError::ServerError { status, .. } => {
				matches!(*status, 429 | 408 | 500 | 502 | 503 | 504)
			}
			MeasureError::RateLimited { .. } => true,
			_ => false,
		}
	}
}

/// Result type alias for measurement operations.
pub type Result<T> = std::result::Result<T, MeasureError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_server_error_retryable_statuses() {
		for status in [429, 408, 500, 502, 503, 504] {
			let err = MeasureError::ServerError {
				status,
				message: "test".to_string(),
			};
			assert!(err.is_retryable(), "status {status} should be retryable");
		}
	}

	#[test]
	fn test_server_error_non_retryable_statuses() {
		for status in [400, 401, 403, 404, 422] {
			let err = MeasureError::ServerError {
				status,
				message: "test".to_string(),
			};
			assert!(
				!err.is_retryable(),
				"status {status} should not be retryable"
			);
		}
	}

	#[test]
	fn test_rate_limited_is_retryable() {
		let err = MeasureError::RateLimited {
			retry_after_secs: Some(30),
		};
		assert!(err.is_retryable());
	}

	#[test]
	fn test_local_errors_not_retryable() {
		assert!(!MeasureError::ClientShutdown.is_retryable());
		assert!(!MeasureError::Sessions(SessionsError::InvalidSampleRate(f64::NAN)).is_retryable());
	}
}
