// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Hit payloads handed to the transport layer.

use chrono::{DateTime, Utc};
use loom_measure_core::{HitContext, HitId};
use serde::{Deserialize, Serialize};
use url::Url;

/// What a tracked hit describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HitKind {
	/// A web page was shown.
	PageView { title: String, url: Url },
	/// A named application screen was shown.
	ScreenView { name: String },
	/// A user interaction.
	Event {
		category: String,
		action: String,
		#[serde(skip_serializing_if = "Option::is_none")]
		label: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		value: Option<i64>,
	},
	/// How long something took.
	Timing {
		category: String,
		variable: String,
		duration_ms: u64,
		#[serde(skip_serializing_if = "Option::is_none")]
		label: Option<String>,
	},
	/// An error the application observed.
	Exception { description: String, fatal: bool },
}

impl HitKind {
	pub fn page_view(title: impl Into<String>, url: Url) -> Self {
		HitKind::PageView {
			title: title.into(),
			url,
		}
	}

	pub fn screen_view(name: impl Into<String>) -> Self {
		HitKind::ScreenView { name: name.into() }
	}

	pub fn event(category: impl Into<String>, action: impl Into<String>) -> Self {
		HitKind::Event {
			category: category.into(),
			action: action.into(),
			label: None,
			value: None,
		}
	}

	pub fn timing(
		category: impl Into<String>,
		variable: impl Into<String>,
		duration: std::time::Duration,
	) -> Self {
		HitKind::Timing {
			category: category.into(),
			variable: variable.into(),
			duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
			label: None,
		}
	}

	pub fn exception(description: impl Into<String>, fatal: bool) -> Self {
		HitKind::Exception {
			description: description.into(),
			fatal,
		}
	}

	/// Sets the label of an event or timing hit. Other kinds are unchanged.
	pub fn with_label(mut self, new_label: impl Into<String>) -> Self {
		match &mut self {
			HitKind::Event { label, .. } | HitKind::Timing { label, .. } => {
				*label = Some(new_label.into());
			}
			HitKind::PageView { .. } | HitKind::ScreenView { .. } | HitKind::Exception { .. } => {}
		}
		self
	}

	/// Sets the value of an event hit. Other kinds are unchanged.
	pub fn with_value(mut self, new_value: i64) -> Self {
		if let HitKind::Event { value, .. } = &mut self {
			*value = Some(new_value);
		}
		self
	}

	/// The page URL for page views.
	pub fn page_url(&self) -> Option<&Url> {
		match self {
			HitKind::PageView { url, .. } => Some(url),
			_ => None,
		}
	}
}

/// Device and host properties sent alongside every hit.
///
/// Captured once by the host; the SDK never interprets it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
	pub language_code: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub character_set: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub ip_address: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub screen_width: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub screen_height: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub screen_color_depth: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub viewport_width: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub viewport_height: Option<u32>,
}

impl Environment {
	pub fn new(language_code: impl Into<String>) -> Self {
		Self {
			language_code: language_code.into(),
			..Default::default()
		}
	}

	pub fn with_screen(mut self, width: u32, height: u32, color_depth: u32) -> Self {
		self.screen_width = Some(width);
		self.screen_height = Some(height);
		self.screen_color_depth = Some(color_depth);
		self
	}

	pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
		self.viewport_width = Some(width);
		self.viewport_height = Some(height);
		self
	}
}

/// The property and application a hit is attributed to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIdentity {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tracking_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub app_name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub app_version: Option<String>,
}

/// One hit, ready for the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitRecord {
	pub hit_id: HitId,
	#[serde(flatten)]
	pub kind: HitKind,
	pub context: HitContext,
	pub environment: Environment,
	#[serde(default)]
	pub app: AppIdentity,
	pub timestamp: DateTime<Utc>,
}

impl HitRecord {
	pub fn new(kind: HitKind, context: HitContext, environment: Environment) -> Self {
		Self {
			hit_id: context.hit_id,
			timestamp: context.recorded_at,
			kind,
			context,
			environment,
			app: AppIdentity::default(),
		}
	}

	pub fn with_app(mut self, app: AppIdentity) -> Self {
		self.app = app;
		self
	}
}
