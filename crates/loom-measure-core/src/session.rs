// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session types for visitor engagement tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionsError;

/// Identifier of a single recorded hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HitId(pub Uuid);

impl HitId {
	#[must_use]
	pub fn new() -> Self {
		Self(Uuid::now_v7())
	}

	#[must_use]
	pub fn as_uuid(&self) -> &Uuid {
		&self.0
	}
}

impl Default for HitId {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Display for HitId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::str::FromStr for HitId {
	type Err = SessionsError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Uuid::parse_str(s)
			.map(Self)
			.map_err(|_| SessionsError::InvalidHitId(s.to_string()))
	}
}

/// One continuous period of engagement.
///
/// Within a session only the hit counters change. Crossing a session boundary
/// builds a new value with [`Session::next`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
	started_at: DateTime<Utc>,
	number: u32,
	hit_count: u64,
	hit_id: Option<HitId>,
}

impl Session {
	/// The first session a visitor ever has.
	#[must_use]
	pub fn first(started_at: DateTime<Utc>) -> Self {
		Self {
			started_at,
			number: 1,
			hit_count: 0,
			hit_id: None,
		}
	}

	/// Rebuilds a session from persisted fields.
	#[must_use]
	pub fn restore(
		started_at: DateTime<Utc>,
		number: u32,
		hit_count: u64,
		hit_id: Option<HitId>,
	) -> Self {
		Self {
			started_at,
			number,
			hit_count,
			hit_id,
		}
	}

	/// The session that follows this one, starting at `started_at`.
	///
	/// The number saturates at `u32::MAX`.
	#[must_use]
	pub fn next(&self, started_at: DateTime<Utc>) -> Self {
		Self {
			started_at,
			number: self.number.saturating_add(1),
			hit_count: 0,
			hit_id: None,
		}
	}

	#[must_use]
	pub fn started_at(&self) -> DateTime<Utc> {
		self.started_at
	}

	/// Ordinal of this session among all sessions of the visitor, from 1.
	#[must_use]
	pub fn number(&self) -> u32 {
		self.number
	}

	#[must_use]
	pub fn hit_count(&self) -> u64 {
		self.hit_count
	}

	/// Id of the most recent hit, if any hit carried one.
	#[must_use]
	pub fn hit_id(&self) -> Option<HitId> {
		self.hit_id
	}

	pub(crate) fn increase_hit_count(&mut self) {
		self.hit_count = self.hit_count.saturating_add(1);
	}

	pub(crate) fn set_hit_id(&mut self, hit_id: HitId) {
		self.hit_id = Some(hit_id);
	}
}

/// State of the current session relative to the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
	/// The next hit is the first of a (re)started session
	Starting,
	/// Session is ongoing
	Active,
	/// The next hit closes the session
	Ending,
}

impl SessionStatus {
	/// Status after one more hit: `Ending` to `Starting`, `Starting` to
	/// `Active`, `Active` stays.
	#[must_use]
	pub fn after_hit(self) -> Self {
		match self {
			SessionStatus::Ending => SessionStatus::Starting,
			SessionStatus::Starting | SessionStatus::Active => SessionStatus::Active,
		}
	}
}

impl std::fmt::Display for SessionStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			SessionStatus::Starting => write!(f, "starting"),
			SessionStatus::Active => write!(f, "active"),
			SessionStatus::Ending => write!(f, "ending"),
		}
	}
}

impl std::str::FromStr for SessionStatus {
	type Err = SessionsError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"starting" => Ok(SessionStatus::Starting),
			"active" => Ok(SessionStatus::Active),
			"ending" => Ok(SessionStatus::Ending),
			_ => Err(SessionsError::InvalidSessionStatus(s.to_string())),
		}
	}
}
