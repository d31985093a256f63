// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Rust SDK for Loom client-side measurement.
//!
//! [`MeasureClient`] tracks hits for one installation. It keeps the visitor
//! and session lifecycle from `loom-measure-core` up to date, starts a new
//! session after a period of inactivity, skips visitors that opted out or were
//! sampled out, and hands every hit to a [`HitSender`].
//!
//! # Quick Start
//!
//! ```ignore
//! use loom_measure::{Environment, MeasureClient};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = MeasureClient::builder()
//!         .endpoint("https://loom.example.com")
//!         .environment(Environment::new("en-gb").with_screen(1920, 1080, 24))
//!         .session_timeout(Duration::from_secs(20 * 60))
//!         .build()?;
//!
//!     client
//!         .track_page_view("Home", "https://app.example.com/".parse()?)
//!         .await?;
//!     client.track_event("checkout", "click").await?;
//!
//!     // Saves the session state so the next run continues this session
//!     client.shutdown()?;
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! [`MeasureConfig::load`] layers defaults, an optional TOML file and
//! `LOOM_MEASURE_*` environment variables:
//!
//! ```toml
//! sample_rate = 25.0       # percent of new installations tracked
//! session_timeout = 1800   # seconds
//! endpoint = "https://loom.example.com"
//! tracking_id = "UA-319000-10"
//! app_name = "AppName"
//! app_version = "1.2.3.4"
//! ```
//!
//! # Persistence
//!
//! The client id and the session state live in a [`KeyValueStore`]. By default
//! that is a [`FileStore`] under `$XDG_DATA_HOME/loom/measure`.

pub mod client;
pub mod config;
pub mod error;
pub mod file_store;
pub mod hit;
pub mod sender;

pub use client::{MeasureClient, MeasureClientBuilder, SESSION_STATE_KEY};
pub use config::{ConfigError, MeasureConfig, DEFAULT_SESSION_TIMEOUT};
pub use error::{MeasureError, Result};
pub use file_store::FileStore;
pub use hit::{AppIdentity, Environment, HitKind, HitRecord};
pub use sender::{HitSender, HttpHitSender};

// Re-export types from loom-measure-core that users may need
pub use loom_measure_core::{
	ClientId, Clock, HitContext, HitId, KeyValueStore, ManualClock, MemoryStore, Session,
	SessionManager, SessionState, SessionStatus, Visitor, VisitorStatus,
};
