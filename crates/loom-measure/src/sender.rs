// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Outbound hand-off of hits.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::error::{MeasureError, Result};
use crate::hit::HitRecord;

/// SDK version for the `User-Agent` header.
const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
/// SDK name for the `User-Agent` header.
const SDK_NAME: &str = "loom-measure";

/// Transmits hits to a collection endpoint.
#[async_trait::async_trait]
pub trait HitSender: Send + Sync {
	async fn send(&self, hit: &HitRecord) -> Result<()>;
}

/// Sends each hit as a JSON `POST` to `{base_url}/api/measure/hits`.
///
/// One request per hit; retries and queueing are left to the caller.
pub struct HttpHitSender {
	http_client: Client,
	url: String,
}

impl HttpHitSender {
	/// Creates a sender for the given base URL.
	///
	/// Example: `https://loom.example.com`
	pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
		let parsed = url::Url::parse(base_url)
			.map_err(|e| MeasureError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
		if !matches!(parsed.scheme(), "http" | "https") {
			return Err(MeasureError::InvalidBaseUrl(base_url.to_string()));
		}

		let http_client = Client::builder()
			.user_agent(format!("{SDK_NAME}/{SDK_VERSION}"))
			.timeout(request_timeout)
			.build()?;

		Ok(Self {
			http_client,
			url: format!("{}/api/measure/hits", base_url.trim_end_matches('/')),
		})
	}
}

#[async_trait::async_trait]
impl HitSender for HttpHitSender {
	async fn send(&self, hit: &HitRecord) -> Result<()> {
		debug!(url = %self.url, hit_id = %hit.hit_id, "Sending hit");

		let response = self.http_client.post(&self.url).json(hit).send().await?;

		if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
			let retry_after = response
				.headers()
				.get("Retry-After")
				.and_then(|v| v.to_str().ok())
				.and_then(|s| s.parse().ok());
			return Err(MeasureError::RateLimited {
				retry_after_secs: retry_after,
			});
		}

		if !response.status().is_success() {
			return Err(MeasureError::ServerError {
				status: response.status().as_u16(),
				message: response.text().await.unwrap_or_default(),
			});
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::hit::{Environment, HitKind};
	use loom_measure_core::SessionManager;
	use wiremock::matchers::{body_partial_json, header_exists, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn sample_hit() -> HitRecord {
		let manager = SessionManager::builder().build(None).unwrap();
		HitRecord::new(
			HitKind::event("checkout", "click"),
			manager.capture_hit(),
			Environment::new("en-us"),
		)
	}

	#[test]
	fn test_rejects_non_http_base_url() {
		let result = HttpHitSender::new("ftp://example.com", Duration::from_secs(5));
		assert!(matches!(result, Err(MeasureError::InvalidBaseUrl(_))));
	}

	#[test]
	fn test_rejects_unparseable_base_url() {
		let result = HttpHitSender::new("nope", Duration::from_secs(5));
		assert!(matches!(result, Err(MeasureError::InvalidBaseUrl(_))));
	}

	#[tokio::test]
	async fn test_posts_hit_as_json() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/measure/hits"))
			.and(header_exists("user-agent"))
			.and(body_partial_json(serde_json::json!({
				"type": "event",
				"category": "checkout",
				"action": "click",
			})))
			.respond_with(ResponseTemplate::new(202))
			.expect(1)
			.mount(&server)
			.await;

		let sender = HttpHitSender::new(&format!("{}/", server.uri()), Duration::from_secs(5)).unwrap();
		sender.send(&sample_hit()).await.unwrap();
	}

	#[tokio::test]
	async fn test_rate_limit_maps_retry_after() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
			.mount(&server)
			.await;

		let sender = HttpHitSender::new(&server.uri(), Duration::from_secs(5)).unwrap();
		let result = sender.send(&sample_hit()).await;

		assert!(matches!(
			result,
			Err(MeasureError::RateLimited {
				retry_after_secs: Some(30)
			})
		));
	}

	#[tokio::test]
	async fn test_server_error_carries_body() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
			.mount(&server)
			.await;

		let sender = HttpHitSender::new(&server.uri(), Duration::from_secs(5)).unwrap();
		let err = sender.send(&sample_hit()).await.unwrap_err();

		assert!(err.is_retryable());
		match err {
			MeasureError::ServerError { status, message } => {
				assert_eq!(status, 503);
				assert_eq!(message, "maintenance");
			}
			other => panic!("expected ServerError, got {other:?}"),
		}
	}
}
