//! # lagopus-core
//!
//! **Live fuzzing telemetry, fetched incrementally.**
//!
//! `lagopus-core` keeps in-memory charts of a running job's stats in sync
//! with the Lagopus stats endpoint. Each chart polls on a fixed cadence, asks
//! only for rows it has not seen yet and merges them into per-series buffers
//! that stay strictly ordered and duplicate-free.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use lagopus_core::{
//!     Chart, ChartDriver, ChartSpec, EndpointStyle, HttpStatsClient, NoRender, SyncSettings,
//! };
//!
//! # async fn demo() -> Result<(), lagopus_core::SyncError> {
//! let client = HttpStatsClient::new("http://localhost:8080", EndpointStyle::JobPath)?;
//! let spec = &ChartSpec::lagopus_defaults()[0];
//! let driver = Arc::new(ChartDriver::new(
//!     Chart::from_spec("fuzz-libpng-1", spec),
//!     client,
//!     NoRender,
//!     SyncSettings::default(),
//! ));
//! driver.start();
//! // ... later
//! driver.stop();
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! timer → [`ChartDriver::tick`] → [`StatsSource::fetch`] → [`tracker::merge`]
//! → [`RenderAdapter::redraw`] → timer
//!
//! Two fetch strategies are supported (see [`FetchStrategy`]): one request per
//! tick for the whole job, or one request per series with its own cursor.

pub mod config;
pub mod driver;
pub mod error;
pub mod fetch;
pub mod render;
pub mod sample;
pub mod series;
pub mod tracker;

pub use config::{
    ChartSpec, DEFAULT_DISPLAY_WINDOW, DEFAULT_POLL_INTERVAL, FetchStrategy, SeriesColor,
    SeriesSpec, SyncSettings,
};
pub use driver::{ChartDriver, TickOutcome, TickReport};
pub use error::SyncError;
pub use fetch::{EndpointStyle, FetchRequest, HttpStatsClient, StatsSource};
pub use render::{NoRender, RenderAdapter};
pub use sample::{FetchResult, Sample, decode_samples, format_instant, parse_instant};
pub use series::{Chart, Point, Series, SyncStats};
pub use tracker::{MergeReport, chart_cursor, cursor_for, format_cursor, merge};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
