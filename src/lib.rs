//! # birdseye
//!
//! Bird's Eye View: a terminal operations dashboard.
//!
//! ## Overview
//!
//! Every refresh cycle polls GitHub, Heroku and Snap CI concurrently, folds the
//! results into a handful of counters, classifies each counter against its
//! warn/crit thresholds, writes an `ok/warn/crit` summary file for status-check
//! agents and redraws a colour-coded summary in the terminal.
//!
//! One upstream failing never takes the others down: a failed source leaves
//! only its own metrics at zero (marked stale on screen), and a single bad
//! repository or app is skipped without affecting the rest of its source.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use birdseye::config::{Credentials, DashboardConfig};
//! use birdseye::cycle::Dashboard;
//! use birdseye::render::Terminal;
//!
//! #[tokio::main]
//! async fn main() -> birdseye::Result<()> {
//!     let credentials = Credentials::from_env()?;
//!     let dashboard = Dashboard::from_config(&DashboardConfig::default(), &credentials)?;
//!     let mut term = Terminal::stdout(true);
//!     dashboard
//!         .run(&mut term, async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`metrics`] | Metric identifiers, live counters and frozen snapshots |
//! | [`thresholds`] | Tier classification and summary counts |
//! | [`transport`] | Authenticated JSON GETs, per-API profiles, gzip bodies |
//! | [`sources`] | GitHub, Heroku, Snap CI and local TODO sources |
//! | [`gather`] | Concurrent gather with per-source failure isolation |
//! | [`summary`] | Summary file for external health checks |
//! | [`render`] | Terminal output |
//! | [`config`] | Credentials and YAML configuration |
//! | [`cycle`] | The refresh loop |

pub mod config;
pub mod cycle;
pub mod gather;
pub mod metrics;
pub mod render;
pub mod sources;
pub mod summary;
pub mod thresholds;
pub mod transport;

pub use cycle::{CycleOutcome, Dashboard};
pub use gather::{GatherCoordinator, GatherReport, SourceReport, SourceStatus};
pub use metrics::{LiveSnapshot, Metric, MetricSet, Snapshot};
pub use thresholds::{Summary, ThresholdPair, Thresholds, Tier};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
