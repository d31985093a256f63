// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Visitor and session lifecycle core for Loom client-side measurement.
//!
//! This crate decides session boundaries, makes the one-time sampling decision
//! for a new installation, counts hits and captures state so it can be
//! restored after a restart. Sending hits is left to the transport layer
//! (`loom-measure`).
//!
//! ## Key Types
//!
//! - [`SessionManager`] - Owns the visitor and current session
//! - [`Visitor`] - Installation identity
//! - [`Session`] - One numbered period of engagement
//! - [`SessionState`] - Serializable snapshot for persistence
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use loom_measure_core::{MemoryStore, SessionManager, SessionStatus};
//!
//! let manager = SessionManager::builder()
//!     .store(Arc::new(MemoryStore::new()))
//!     .sample_rate(100.0)
//!     .build(None)
//!     .unwrap();
//!
//! manager.hit();
//! assert_eq!(manager.session_status(), SessionStatus::Active);
//!
//! let state = manager.state();
//! let restored = SessionManager::builder().build(Some(state.clone())).unwrap();
//! assert_eq!(restored.state(), state);
//! ```

pub mod clock;
pub mod error;
pub mod manager;
pub mod sampling;
pub mod session;
pub mod state;
pub mod store;
pub mod visitor;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, SessionsError};
pub use manager::{HitContext, SessionManager, SessionManagerBuilder};
pub use sampling::{should_track_new_visitor, RandomSampleSelector, SampleRate, SampleSelector};
pub use session::{HitId, Session, SessionStatus};
pub use state::{SessionState, VisitorStatus};
pub use store::{acquire_client_id, KeyValueStore, MemoryStore, CLIENT_ID_KEY};
pub use visitor::{ClientId, Visitor};
