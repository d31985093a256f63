// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Visitor and session lifecycle.
//!
//! [`SessionManager`] decides session boundaries, records hits and captures
//! its own state for persistence. Every mutable field lives behind one mutex,
//! so a session replacement and its `previous_session_started_at` update are
//! never observed apart.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::sampling::{should_track_new_visitor, RandomSampleSelector, SampleRate, SampleSelector};
use crate::session::{HitId, Session, SessionStatus};
use crate::state::{SessionState, VisitorStatus};
use crate::store::{acquire_client_id, KeyValueStore, MemoryStore};
use crate::visitor::{ClientId, Visitor};

/// Everything the transport layer needs to describe one hit.
///
/// Captured before the hit's status transition, so `session_status` is
/// `Starting` for the first hit of a session and `Ending` for the hit that
/// closes one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitContext {
	pub hit_id: HitId,
	pub client_id: ClientId,
	pub first_visit_at: DateTime<Utc>,
	pub session_number: u32,
	pub session_started_at: DateTime<Utc>,
	pub previous_session_started_at: DateTime<Utc>,
	/// Position of this hit within its session, from 1
	pub session_hit_count: u64,
	pub session_status: SessionStatus,
	pub referrer: Option<Url>,
	pub recorded_at: DateTime<Utc>,
}

struct ManagerState {
	session: Session,
	previous_session_started_at: DateTime<Utc>,
	last_activity_at: DateTime<Utc>,
	referrer: Option<Url>,
	session_status: SessionStatus,
	visitor_status: VisitorStatus,
}

impl ManagerState {
	fn record_hit(&mut self, now: DateTime<Utc>) {
		self.last_activity_at = now;
		self.session_status = self.session_status.after_hit();
		self.session.increase_hit_count();
	}

	fn replace_session(&mut self, started_at: DateTime<Utc>) -> Session {
		self.previous_session_started_at = self.session.started_at();
		self.session = self.session.next(started_at);
		self.session_status = SessionStatus::Starting;
		self.session.clone()
	}
}

/// Builder for constructing a [`SessionManager`].
pub struct SessionManagerBuilder {
	sample_rate: f64,
	clock: Arc<dyn Clock>,
	selector: Arc<dyn SampleSelector>,
	store: Option<Arc<dyn KeyValueStore>>,
}

impl SessionManagerBuilder {
	/// Creates a builder with a 100% sample rate, the system clock and the
	/// random sample selector.
	pub fn new() -> Self {
		Self {
			sample_rate: 100.0,
			clock: Arc::new(SystemClock),
			selector: Arc::new(RandomSampleSelector),
			store: None,
		}
	}

	/// Sets the percentage of new visitors to track.
	///
	/// Values outside `[0, 100]` are clamped when the manager is built. NaN
	/// fails the build. Only consulted for a visitor seen for the first time.
	pub fn sample_rate(mut self, percent: f64) -> Self {
		self.sample_rate = percent;
		self
	}

	pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	/// Sets the source of sampling draws in `[0, 100)`.
	pub fn sample_selector(mut self, selector: Arc<dyn SampleSelector>) -> Self {
		self.selector = selector;
		self
	}

	/// Sets the store holding the persisted client id.
	///
	/// Without one, a first run gets an id that lasts for this process only.
	pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
		self.store = Some(store);
		self
	}

	/// Builds the manager, restoring `previous` when given.
	pub fn build(self, previous: Option<SessionState>) -> Result<SessionManager> {
		let rate = SampleRate::new(self.sample_rate)?;
		if rate.percent() != self.sample_rate {
			warn!(
				requested = self.sample_rate,
				clamped = rate.percent(),
				"Sample rate out of range, clamping"
			);
		}

		match previous {
			Some(state) => {
				state.validate()?;
				Ok(SessionManager::restore(state, self.clock))
			}
			None => {
				let store = self.store.unwrap_or_else(|| {
					debug!("No key-value store supplied, client id will not persist");
					Arc::new(MemoryStore::new())
				});
				Ok(SessionManager::fresh(
					store.as_ref(),
					rate,
					self.selector.as_ref(),
					self.clock,
				))
			}
		}
	}
}

impl Default for SessionManagerBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Manages the visitor and its sessions so they are saved, restored and
/// replaced correctly.
pub struct SessionManager {
	visitor: Visitor,
	clock: Arc<dyn Clock>,
	state: Mutex<ManagerState>,
}

impl SessionManager {
	pub fn builder() -> SessionManagerBuilder {
		SessionManagerBuilder::new()
	}

	/// Rehydrates a manager from a snapshot. No sampling decision is made.
	///
	/// The snapshot is taken as is; [`SessionManagerBuilder::build`] validates
	/// it first.
	pub fn restore(state: SessionState, clock: Arc<dyn Clock>) -> Self {
		debug!(
			client_id = %state.visitor_id,
			session_number = state.session_number,
			session_status = %state.session_status,
			visitor_status = %state.visitor_status,
			"Restored session manager"
		);

		Self {
			visitor: Visitor::new(state.visitor_id, state.first_visit_at),
			clock,
			state: Mutex::new(ManagerState {
				session: Session::restore(
					state.session_started_at,
					state.session_number,
					state.session_hit_count,
					state.hit_id,
				),
				previous_session_started_at: state.previous_session_started_at,
				last_activity_at: state.last_activity_at,
				referrer: state.referrer,
				session_status: state.session_status,
				visitor_status: state.visitor_status,
			}),
		}
	}

	/// Creates a manager for a run with no saved state.
	///
	/// Acquires the persisted client id (creating it if needed), opens session
	/// 1 and makes the permanent sampling decision for this visitor.
	pub fn fresh(
		store: &dyn KeyValueStore,
		sample_rate: SampleRate,
		selector: &dyn SampleSelector,
		clock: Arc<dyn Clock>,
	) -> Self {
		let client_id = acquire_client_id(store);
		let now = clock.now();
		let session = Session::first(now);

		let visitor_status = if should_track_new_visitor(sample_rate, selector) {
			VisitorStatus::Active
		} else {
			info!(
				client_id = %client_id,
				sample_rate = sample_rate.percent(),
				"Will not track this visitor, excluded by sampling"
			);
			VisitorStatus::SampledOut
		};

		Self {
			visitor: Visitor::new(client_id, now),
			clock,
			state: Mutex::new(ManagerState {
				previous_session_started_at: session.started_at(),
				session,
				last_activity_at: now,
				referrer: None,
				session_status: SessionStatus::Starting,
				visitor_status,
			}),
		}
	}

	pub fn visitor(&self) -> &Visitor {
		&self.visitor
	}

	/// A copy of the current session.
	pub fn session(&self) -> Session {
		self.state.lock().session.clone()
	}

	pub fn session_status(&self) -> SessionStatus {
		self.state.lock().session_status
	}

	pub fn visitor_status(&self) -> VisitorStatus {
		self.state.lock().visitor_status
	}

	/// Whether hits for this visitor should be transmitted.
	pub fn is_tracked(&self) -> bool {
		self.visitor_status() == VisitorStatus::Active
	}

	pub fn referrer(&self) -> Option<Url> {
		self.state.lock().referrer.clone()
	}

	/// When the session before the current one started.
	pub fn previous_session_started_at(&self) -> DateTime<Utc> {
		self.state.lock().previous_session_started_at
	}

	pub fn last_activity_at(&self) -> DateTime<Utc> {
		self.state.lock().last_activity_at
	}

	/// Records one tracked event against the current session.
	///
	/// Updates the activity time, advances the session status and counts the
	/// hit. Never starts a new session on its own.
	pub fn hit(&self) {
		let now = self.clock.now();
		self.state.lock().record_hit(now);
	}

	/// Records a hit and returns the context describing it.
	///
	/// The context is taken before the status transition, and the session's
	/// hit id is set to the id of this hit.
	pub fn capture_hit(&self) -> HitContext {
		let now = self.clock.now();
		let hit_id = HitId::new();

		let mut state = self.state.lock();
		let session_status = state.session_status;
		state.session.set_hit_id(hit_id);
		state.record_hit(now);

		HitContext {
			hit_id,
			client_id: self.visitor.client_id(),
			first_visit_at: self.visitor.first_visit_at(),
			session_number: state.session.number(),
			session_started_at: state.session.started_at(),
			previous_session_started_at: state.previous_session_started_at,
			session_hit_count: state.session.hit_count(),
			session_status,
			referrer: state.referrer.clone(),
			recorded_at: now,
		}
	}

	/// Starts a new session now.
	///
	/// Useful when the visitor's context changes, e.g. an anonymous user signs
	/// in.
	pub fn start_new_session(&self) -> Session {
		self.start_new_session_at(self.clock.now())
	}

	/// Replaces the current session with the next one, starting at
	/// `started_at`, and returns a copy of the new session.
	pub fn start_new_session_at(&self, started_at: DateTime<Utc>) -> Session {
		let session = self.state.lock().replace_session(started_at);
		debug!(
			session_number = session.number(),
			started_at = %session.started_at(),
			"Started new session"
		);
		session
	}

	/// Starts a new session if nothing was recorded for longer than
	/// `timeout`.
	///
	/// The check and the replacement happen under the same lock, so concurrent
	/// callers roll a stale session over once.
	pub fn start_new_session_if_inactive(&self, timeout: Duration) -> Option<Session> {
		let now = self.clock.now();
		let mut state = self.state.lock();
		let idle = now - state.last_activity_at;
		if idle <= timeout {
			return None;
		}

		let session = state.replace_session(now);
		drop(state);

		info!(
			idle_secs = idle.num_seconds(),
			session_number = session.number(),
			"Session timed out, started new session"
		);
		Some(session)
	}

	/// Marks the current session as ending. Counters are left alone.
	pub fn end(&self) {
		self.state.lock().session_status = SessionStatus::Ending;
	}

	/// Sets the page to report as referrer for the next one.
	pub fn set_referrer(&self, referrer: Option<Url>) {
		self.state.lock().referrer = referrer;
	}

	/// Opts the visitor out of, or back into, tracking.
	///
	/// A sampled-out visitor stays sampled out either way.
	pub fn set_opted_out(&self, opted_out: bool) {
		let mut state = self.state.lock();
		state.visitor_status = match (state.visitor_status, opted_out) {
			(VisitorStatus::SampledOut, _) => VisitorStatus::SampledOut,
			(_, true) => VisitorStatus::OptedOut,
			(VisitorStatus::OptedOut, false) => VisitorStatus::Active,
			(status, false) => status,
		};
	}

	/// A point-in-time snapshot of every persisted field.
	pub fn state(&self) -> SessionState {
		let state = self.state.lock();
		SessionState {
			visitor_id: self.visitor.client_id(),
			first_visit_at: self.visitor.first_visit_at(),
			session_started_at: state.session.started_at(),
			session_number: state.session.number(),
			session_hit_count: state.session.hit_count(),
			hit_id: state.session.hit_id(),
			previous_session_started_at: state.previous_session_started_at,
			last_activity_at: state.last_activity_at,
			referrer: state.referrer.clone(),
			session_status: state.session_status,
			visitor_status: state.visitor_status,
		}
	}
}

impl std::fmt::Debug for SessionManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.state.lock();
		f.debug_struct("SessionManager")
			.field("visitor", &self.visitor)
			.field("session", &state.session)
			.field("session_status", &state.session_status)
			.field("visitor_status", &state.visitor_status)
			.finish()
	}
}
