// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Time source used for session and activity timestamps.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

pub trait Clock: Send + Sync {
	fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// A clock that only moves when told to. Useful for deterministic tests.
#[derive(Debug)]
pub struct ManualClock {
	now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
	pub fn new(start: DateTime<Utc>) -> Self {
		Self {
			now: Mutex::new(start),
		}
	}

	pub fn set(&self, at: DateTime<Utc>) {
		*self.now.lock() = at;
	}

	pub fn advance(&self, by: Duration) {
		let mut now = self.now.lock();
		*now += by;
	}
}

impl Clock for ManualClock {
	fn now(&self) -> DateTime<Utc> {
		*self.now.lock()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_manual_clock_advances() {
		let start = Utc::now();
		let clock = ManualClock::new(start);
		clock.advance(Duration::minutes(3));
		assert_eq!(clock.now(), start + Duration::minutes(3));
	}

	#[test]
	fn test_manual_clock_set() {
		let clock = ManualClock::new(Utc::now());
		let at = Utc::now() + Duration::days(1);
		clock.set(at);
		assert_eq!(clock.now(), at);
	}
}
