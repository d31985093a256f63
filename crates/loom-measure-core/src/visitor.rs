// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Visitor identity that outlives every session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionsError;

/// Unique identifier for one installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub Uuid);

impl ClientId {
	#[must_use]
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}

	#[must_use]
	pub fn as_uuid(&self) -> &Uuid {
		&self.0
	}
}

impl Default for ClientId {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Display for ClientId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::str::FromStr for ClientId {
	type Err = SessionsError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Uuid::parse_str(s.trim())
			.map(Self)
			.map_err(|_| SessionsError::InvalidClientId(s.to_string()))
	}
}

/// One persistent installation identity.
///
/// Both fields are fixed at construction; a visitor is never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visitor {
	client_id: ClientId,
	first_visit_at: DateTime<Utc>,
}

impl Visitor {
	/// Creates a visitor seen for the first time at `first_visit_at`.
	#[must_use]
	pub fn new(client_id: ClientId, first_visit_at: DateTime<Utc>) -> Self {
		Self {
			client_id,
			first_visit_at,
		}
	}

	#[must_use]
	pub fn client_id(&self) -> ClientId {
		self.client_id
	}

	#[must_use]
	pub fn first_visit_at(&self) -> DateTime<Utc> {
		self.first_visit_at
	}
}
