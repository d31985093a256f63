// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! One-time sampling decision for new visitors.

use crate::error::{Result, SessionsError};

/// Percentage of new visitors that are tracked, in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRate(f64);

impl SampleRate {
	/// Track every visitor.
	pub const ALL: SampleRate = SampleRate(100.0);
	/// Track no visitor.
	pub const NONE: SampleRate = SampleRate(0.0);

	/// Builds a sample rate, clamping values outside `[0, 100]`.
	///
	/// NaN has no sensible clamp and is rejected.
	pub fn new(percent: f64) -> Result<Self> {
		if percent.is_nan() {
			return Err(SessionsError::InvalidSampleRate(percent));
		}
		Ok(Self(percent.clamp(0.0, 100.0)))
	}

	#[must_use]
	pub fn percent(&self) -> f64 {
		self.0
	}
}

impl Default for SampleRate {
	fn default() -> Self {
		Self::ALL
	}
}

/// Source of uniform draws in `[0, 100)` used by the sampling decision.
pub trait SampleSelector: Send + Sync {
	fn select(&self) -> f64;
}

/// Default selector backed by `fastrand`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSampleSelector;

impl SampleSelector for RandomSampleSelector {
	fn select(&self) -> f64 {
		fastrand::f64() * 100.0
	}
}

impl<F> SampleSelector for F
where
	F: Fn() -> f64 + Send + Sync,
{
	fn select(&self) -> f64 {
		self()
	}
}

/// Whether a visitor seen for the first time should be tracked.
///
/// The boundaries never consult the selector.
pub fn should_track_new_visitor(rate: SampleRate, selector: &dyn SampleSelector) -> bool {
	if rate.percent() == 100.0 {
		return true;
	}
	if rate.percent() == 0.0 {
		return false;
	}
	selector.select() <= rate.percent()
}
