// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persistable snapshot of a session manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::SessionsError;
use crate::session::{HitId, SessionStatus};
use crate::visitor::ClientId;

/// Whether hits for this visitor are transmitted at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitorStatus {
	/// Visitor is tracked
	Active,
	/// Visitor asked not to be tracked
	OptedOut,
	/// Visitor was excluded by the sampling decision
	SampledOut,
}

impl std::fmt::Display for VisitorStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			VisitorStatus::Active => write!(f, "active"),
			VisitorStatus::OptedOut => write!(f, "opted_out"),
			VisitorStatus::SampledOut => write!(f, "sampled_out"),
		}
	}
}

impl std::str::FromStr for VisitorStatus {
	type Err = SessionsError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"active" => Ok(VisitorStatus::Active),
			"opted_out" => Ok(VisitorStatus::OptedOut),
			"sampled_out" => Ok(VisitorStatus::SampledOut),
			_ => Err(SessionsError::InvalidVisitorStatus(s.to_string())),
		}
	}
}

/// Flat snapshot of everything a session manager needs to resume.
///
/// Has no behaviour of its own. Restoring a manager from a snapshot and taking
/// a new snapshot yields an equal value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
	pub visitor_id: ClientId,
	pub first_visit_at: DateTime<Utc>,

	pub session_started_at: DateTime<Utc>,
	/// Ordinal of the current session, from 1
	pub session_number: u32,
	pub session_hit_count: u64,
	pub hit_id: Option<HitId>,

	pub previous_session_started_at: DateTime<Utc>,
	pub last_activity_at: DateTime<Utc>,

	/// Last page visited, used as referrer for the next one
	pub referrer: Option<Url>,

	pub session_status: SessionStatus,
	pub visitor_status: VisitorStatus,
}

impl SessionState {
	/// Parses a snapshot from its JSON form.
	pub fn from_json(json: &str) -> crate::Result<Self> {
		let state: Self = serde_json::from_str(json)?;
		state.validate()?;
		Ok(state)
	}

	/// Rejects snapshots no manager could have produced.
	pub fn validate(&self) -> crate::Result<()> {
		if self.session_number == 0 {
			return Err(SessionsError::InvalidSessionNumber(self.session_number));
		}
		Ok(())
	}

	/// Serializes the snapshot to JSON.
	pub fn to_json(&self) -> crate::Result<String> {
		Ok(serde_json::to_string(self)?)
	}
}
