// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Example: Track a few hits using the loom-measure SDK.
//!
//! Run with:
//!   LOOM_MEASURE_ENDPOINT=https://loom.example.com cargo run --example track -p loom-measure
//!
//! Optionally pass a TOML config file path as the first argument.

use std::path::PathBuf;
use std::time::Duration;

use loom_measure::{Environment, HitKind, MeasureClient, MeasureConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("loom_measure=debug")),
		)
		.init();

	let config_path = std::env::args().nth(1).map(PathBuf::from);
	let config = MeasureConfig::load(config_path.as_deref())?;

	println!("Initializing measurement client...");
	println!("  Endpoint: {:?}", config.endpoint);
	println!("  Sample rate: {}%", config.sample_rate);
	println!("  Tracking ID: {:?}", config.tracking_id);

	let client = MeasureClient::builder()
		.config(config)
		.environment(Environment::new("en-us").with_screen(2560, 1440, 24))
		.build()?;

	let state = client.state();
	println!("  Client ID: {}", state.visitor_id);
	println!("  Session: #{} ({})", state.session_number, state.session_status);
	println!("  Visitor: {}", state.visitor_status);

	client
		.track_page_view("Home", "https://app.example.com/".parse()?)
		.await?;
	client.track_screen_view("Settings").await?;
	client
		.track(HitKind::event("example", "run").with_label("track.rs"))
		.await?;
	client
		.track_timing("example", "startup", Duration::from_millis(120))
		.await?;

	client.shutdown()?;

	let state = client.state();
	println!("\nTracked {} hits in session #{}", state.session_hit_count, state.session_number);

	Ok(())
}
