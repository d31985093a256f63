// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Measurement client: drives the session manager on every tracked hit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use loom_measure_core::{
	Clock, HitId, KeyValueStore, RandomSampleSelector, SampleSelector, Session, SessionManager,
	SessionState, SystemClock, VisitorStatus,
};
use tracing::{debug, error, info, warn};

use crate::config::{ConfigError, MeasureConfig};
use crate::error::{MeasureError, Result};
use crate::file_store::FileStore;
use crate::hit::{AppIdentity, Environment, HitKind, HitRecord};
use crate::sender::{HitSender, HttpHitSender};

/// Key under which the serialized [`SessionState`] is persisted.
pub const SESSION_STATE_KEY: &str = "session_state";

/// Builder for constructing a [`MeasureClient`].
pub struct MeasureClientBuilder {
	config: MeasureConfig,
	request_timeout: Duration,
	store: Option<Arc<dyn KeyValueStore>>,
	sender: Option<Arc<dyn HitSender>>,
	environment: Environment,
	clock: Arc<dyn Clock>,
	selector: Arc<dyn SampleSelector>,
	restore_state: bool,
}

impl MeasureClientBuilder {
	/// Creates a new builder with default settings.
	pub fn new() -> Self {
		Self {
			config: MeasureConfig::default(),
			request_timeout: Duration::from_secs(10),
			store: None,
			sender: None,
			environment: Environment::default(),
			clock: Arc::new(SystemClock),
			selector: Arc::new(RandomSampleSelector),
			restore_state: true,
		}
	}

	/// Replaces every configurable setting at once.
	pub fn config(mut self, config: MeasureConfig) -> Self {
		self.config = config;
		self
	}

	/// Sets the percentage of new visitors to track.
	///
	/// Only consulted the first time an installation is seen.
	pub fn sample_rate(mut self, percent: f64) -> Self {
		self.config.sample_rate = percent;
		self
	}

	/// Sets the inactivity period after which the next hit starts a new
	/// session.
	pub fn session_timeout(mut self, timeout: Duration) -> Self {
		self.config.session_timeout = timeout;
		self
	}

	/// Sets the base URL hits are posted to.
	///
	/// Example: `https://loom.example.com`
	pub fn endpoint(mut self, url: impl Into<String>) -> Self {
		self.config.endpoint = Some(url.into());
		self
	}

	/// Sets the tracking id hits are attributed to, e.g. `UA-319000-10`.
	pub fn tracking_id(mut self, tracking_id: impl Into<String>) -> Self {
		self.config.tracking_id = Some(tracking_id.into());
		self
	}

	/// Sets the application name and version reported with every hit.
	pub fn app(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
		self.config.app_name = Some(name.into());
		self.config.app_version = Some(version.into());
		self
	}

	/// Sets the HTTP request timeout used by the default sender.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;
		self
	}

	/// Sets the store for the client id and session state.
	///
	/// Defaults to a [`FileStore`] in the configured data directory.
	pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
		self.store = Some(store);
		self
	}

	/// Sets the transport. Defaults to [`HttpHitSender`] for the endpoint.
	pub fn sender(mut self, sender: Arc<dyn HitSender>) -> Self {
		self.sender = Some(sender);
		self
	}

	pub fn environment(mut self, environment: Environment) -> Self {
		self.environment = environment;
		self
	}

	pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	pub fn sample_selector(mut self, selector: Arc<dyn SampleSelector>) -> Self {
		self.selector = selector;
		self
	}

	/// Whether to resume the session state persisted by a previous client.
	/// Enabled by default.
	pub fn restore_state(mut self, restore: bool) -> Self {
		self.restore_state = restore;
		self
	}

	/// Builds the MeasureClient.
	pub fn build(self) -> Result<MeasureClient> {
		self.config.validate()?;

		let session_timeout = chrono::Duration::from_std(self.config.session_timeout)
			.map_err(|_| ConfigError::Validation("session_timeout is too large".to_string()))?;

		let store: Arc<dyn KeyValueStore> = match self.store {
			Some(store) => store,
			None => Arc::new(FileStore::open(&self.config)?),
		};

		let sender: Arc<dyn HitSender> = match (self.sender, &self.config.endpoint) {
			(Some(sender), _) => sender,
			(None, Some(endpoint)) => Arc::new(HttpHitSender::new(endpoint, self.request_timeout)?),
			(None, None) => {
				return Err(MeasureError::InvalidBaseUrl(
					"no endpoint or sender configured".to_string(),
				))
			}
		};

		let previous = if self.restore_state {
			load_state(store.as_ref())
		} else {
			None
		};

		let manager = SessionManager::builder()
			.sample_rate(self.config.sample_rate)
			.clock(self.clock)
			.sample_selector(self.selector)
			.store(Arc::clone(&store))
			.build(previous)?;

		info!(
			client_id = %manager.visitor().client_id(),
			session_number = manager.session().number(),
			visitor_status = %manager.visitor_status(),
			"Measurement client initialized"
		);

		Ok(MeasureClient {
			manager: Arc::new(manager),
			sender,
			store,
			environment: self.environment,
			app: self.config.app_identity(),
			session_timeout,
			closed: AtomicBool::new(false),
		})
	}
}

impl Default for MeasureClientBuilder {
	fn default() -> Self {
		Self::new()
	}
}

fn load_state(store: &dyn KeyValueStore) -> Option<SessionState> {
	let json = match store.get(SESSION_STATE_KEY) {
		Ok(Some(json)) => json,
		Ok(None) => return None,
		Err(e) => {
			warn!(error = %e, "Failed to read session state, starting fresh");
			return None;
		}
	};

	match SessionState::from_json(&json) {
		Ok(state) => Some(state),
		Err(e) => {
			warn!(error = %e, "Persisted session state is unreadable, starting fresh");
			None
		}
	}
}

/// Client for tracking hits against the current visitor and session.
///
/// Owns the inactivity policy: a hit arriving more than the session timeout
/// after the previous one starts a new session first.
///
/// # Example
///
/// ```ignore
/// use loom_measure::{HitKind, MeasureClient};
/// use std::time::Duration;
///
/// let client = MeasureClient::builder()
///     .endpoint("https://loom.example.com")
///     .sample_rate(50.0)
///     .session_timeout(Duration::from_secs(30 * 60))
///     .build()?;
///
/// client.track(HitKind::event("checkout", "click")).await?;
///
/// // User signed in: scope the rest of the visit to a new session
/// client.start_new_session();
///
/// client.shutdown()?;
/// ```
pub struct MeasureClient {
	manager: Arc<SessionManager>,
	sender: Arc<dyn HitSender>,
	store: Arc<dyn KeyValueStore>,
	environment: Environment,
	app: AppIdentity,
	session_timeout: chrono::Duration,
	closed: AtomicBool,
}

impl MeasureClient {
	/// Creates a new builder for constructing a MeasureClient.
	pub fn builder() -> MeasureClientBuilder {
		MeasureClientBuilder::new()
	}

	/// Builds a client from layered configuration (defaults, optional TOML
	/// file, environment).
	pub fn from_config_file(path: Option<&std::path::Path>) -> Result<Self> {
		let config = MeasureConfig::load(path)?;
		Self::builder().config(config).build()
	}

	/// Tracks one hit.
	///
	/// Returns the hit id, or `None` when the visitor is opted out or sampled
	/// out and nothing was sent.
	pub async fn track(&self, kind: HitKind) -> Result<Option<HitId>> {
		self.check_closed()?;

		// Rollover and capture take the lock separately; hits for one client
		// are expected to come from a single caller at a time.
		self.manager
			.start_new_session_if_inactive(self.session_timeout);

		if !self.manager.is_tracked() {
			debug!(
				visitor_status = %self.manager.visitor_status(),
				"Visitor not tracked, skipping hit"
			);
			return Ok(None);
		}

		let context = self.manager.capture_hit();
		let page_url = kind.page_url().cloned();
		let record =
			HitRecord::new(kind, context, self.environment.clone()).with_app(self.app.clone());

		if page_url.is_some() {
			self.manager.set_referrer(page_url);
		}

		self.sender.send(&record).await?;
		Ok(Some(record.hit_id))
	}

	pub async fn track_page_view(
		&self,
		title: impl Into<String>,
		url: url::Url,
	) -> Result<Option<HitId>> {
		self.track(HitKind::page_view(title, url)).await
	}

	/// Tracks a named application screen.
	pub async fn track_screen_view(&self, name: impl Into<String>) -> Result<Option<HitId>> {
		self.track(HitKind::screen_view(name)).await
	}

	pub async fn track_event(
		&self,
		category: impl Into<String>,
		action: impl Into<String>,
	) -> Result<Option<HitId>> {
		self.track(HitKind::event(category, action)).await
	}

	pub async fn track_timing(
		&self,
		category: impl Into<String>,
		variable: impl Into<String>,
		duration: Duration,
	) -> Result<Option<HitId>> {
		self.track(HitKind::timing(category, variable, duration)).await
	}

	pub async fn track_exception(
		&self,
		description: impl Into<String>,
		fatal: bool,
	) -> Result<Option<HitId>> {
		self.track(HitKind::exception(description, fatal)).await
	}

	/// Starts a new session immediately, e.g. when a user signs in.
	pub fn start_new_session(&self) -> Session {
		self.manager.start_new_session()
	}

	/// Marks the session as ending. The next tracked hit closes it.
	pub fn end_session(&self) {
		self.manager.end();
	}

	/// Stops tracking this visitor and persists the choice.
	pub fn opt_out(&self) -> Result<()> {
		self.manager.set_opted_out(true);
		info!(client_id = %self.manager.visitor().client_id(), "Visitor opted out");
		self.persist()
	}

	/// Resumes tracking an opted-out visitor and persists the choice.
	///
	/// Has no effect on a sampled-out visitor.
	pub fn opt_in(&self) -> Result<()> {
		self.manager.set_opted_out(false);
		self.persist()
	}

	pub fn visitor_status(&self) -> VisitorStatus {
		self.manager.visitor_status()
	}

	pub fn session_manager(&self) -> &Arc<SessionManager> {
		&self.manager
	}

	/// A snapshot of the current session state.
	pub fn state(&self) -> SessionState {
		self.manager.state()
	}

	/// Writes the current session state to the store.
	pub fn persist(&self) -> Result<()> {
		let json = self.manager.state().to_json()?;
		self.store.set(SESSION_STATE_KEY, &json)?;
		debug!("Persisted session state");
		Ok(())
	}

	/// Persists state and stops accepting hits. Later calls do nothing.
	pub fn shutdown(&self) -> Result<()> {
		if self.closed.swap(true, Ordering::SeqCst) {
			return Ok(());
		}

		if let Err(e) = self.persist() {
			error!(error = %e, "Failed to persist session state on shutdown");
			return Err(e);
		}

		info!("Measurement client shut down");
		Ok(())
	}

	/// Returns true if the client has been shut down.
	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	fn check_closed(&self) -> Result<()> {
		if self.is_closed() {
			return Err(MeasureError::ClientShutdown);
		}
		Ok(())
	}
}
