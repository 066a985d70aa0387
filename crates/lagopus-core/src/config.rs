//! Chart and synchronization configuration.
//!
//! Everything a chart needs is passed in as a value at construction time:
//! which columns become series, their colours, the display window and the poll
//! cadence. There are no global palettes or tables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default poll cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Default number of most-recent points kept per series.
pub const DEFAULT_DISPLAY_WINDOW: usize = 20;

// ---------------------------------------------------------------------------
// Palette
// ---------------------------------------------------------------------------

/// Series colour palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesColor {
    Red,
    Orange,
    Yellow,
    Green,
    #[default]
    Blue,
    Purple,
    Grey,
}

impl SeriesColor {
    /// All palette entries, in assignment order.
    pub const ALL: [SeriesColor; 7] = [
        Self::Blue,
        Self::Red,
        Self::Green,
        Self::Orange,
        Self::Purple,
        Self::Yellow,
        Self::Grey,
    ];

    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            Self::Red => (255, 99, 132),
            Self::Orange => (255, 159, 64),
            Self::Yellow => (255, 205, 86),
            Self::Green => (75, 192, 192),
            Self::Blue => (54, 162, 235),
            Self::Purple => (153, 102, 255),
            Self::Grey => (201, 203, 207),
        }
    }

    /// Colour for the `i`-th series of a chart when none is configured.
    pub fn nth(i: usize) -> Self {
        Self::ALL[i % Self::ALL.len()]
    }
}

// ---------------------------------------------------------------------------
// Chart layout
// ---------------------------------------------------------------------------

/// One trace on a chart, bound to a remote metric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSpec {
    pub name: String,
    pub column: String,
    #[serde(default)]
    pub color: Option<SeriesColor>,
}

impl SeriesSpec {
    pub fn new(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
            color: None,
        }
    }

    pub fn color(mut self, color: SeriesColor) -> Self {
        self.color = Some(color);
        self
    }
}

/// A chart: a titled group of series sharing one time axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub title: String,
    #[serde(default)]
    pub unit: Option<String>,
    pub series: Vec<SeriesSpec>,
}

impl ChartSpec {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            unit: None,
            series: Vec::new(),
        }
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn series(mut self, series: SeriesSpec) -> Self {
        self.series.push(series);
        self
    }

    /// Single-series chart for one column.
    pub fn single(title: impl Into<String>, column: impl Into<String>) -> Self {
        let title = title.into();
        Self::new(title.clone()).series(SeriesSpec::new(title, column))
    }

    /// Built-in charts for the columns reported by Lagopus fuzzing jobs.
    pub fn lagopus_defaults() -> Vec<ChartSpec> {
        vec![
            ChartSpec::new("Executions")
                .unit("execs/s")
                .series(SeriesSpec::new("Execs/sec", "execs_per_sec").color(SeriesColor::Blue)),
            ChartSpec::new("Memory")
                .unit("Mi")
                .series(SeriesSpec::new("Memory", "memory").color(SeriesColor::Purple)),
            ChartSpec::new("Coverage")
                .unit("paths")
                .series(SeriesSpec::new("Total paths", "total_paths").color(SeriesColor::Green))
                .series(SeriesSpec::new("Pending", "pending").color(SeriesColor::Orange))
                .series(SeriesSpec::new("Pending favs", "pending_fav").color(SeriesColor::Yellow)),
            ChartSpec::new("Faults")
                .series(SeriesSpec::new("Crashes", "crashes").color(SeriesColor::Red))
                .series(SeriesSpec::new("Hangs", "hangs").color(SeriesColor::Grey)),
            ChartSpec::new("Processes")
                .unit("alive")
                .series(SeriesSpec::new("Alive", "alive").color(SeriesColor::Green)),
        ]
    }
}

// ---------------------------------------------------------------------------
// Sync settings
// ---------------------------------------------------------------------------

/// How a chart's series are fetched each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStrategy {
    /// One fetch per tick for the whole job, fanned out to every series.
    #[default]
    Unified,
    /// One fetch per series per tick, each with its own cursor.
    PerSeries,
}

impl std::str::FromStr for FetchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unified" => Ok(Self::Unified),
            "per_series" | "per-series" => Ok(Self::PerSeries),
            other => Err(format!("unknown fetch strategy '{other}'")),
        }
    }
}

impl std::fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unified => write!(f, "unified"),
            Self::PerSeries => write!(f, "per_series"),
        }
    }
}

/// Cadence and retention for one chart's refresh loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(
        rename = "poll_interval_ms",
        default = "default_poll_interval",
        deserialize_with = "millis_deserialize",
        serialize_with = "millis_serialize"
    )]
    pub poll_interval: Duration,
    #[serde(default = "default_display_window")]
    pub display_window: usize,
    #[serde(default)]
    pub strategy: FetchStrategy,
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

fn default_display_window() -> usize {
    DEFAULT_DISPLAY_WINDOW
}

fn millis_deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let ms = u64::deserialize(deserializer)?;
    if ms == 0 {
        return Err(serde::de::Error::custom("poll interval must be positive"));
    }
    Ok(Duration::from_millis(ms))
}

fn millis_serialize<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(d.as_millis() as u64)
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            display_window: default_display_window(),
            strategy: FetchStrategy::default(),
        }
    }
}

impl SyncSettings {
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn display_window(mut self, window: usize) -> Self {
        self.display_window = window.max(1);
        self
    }

    pub fn strategy(mut self, strategy: FetchStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}
