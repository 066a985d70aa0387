//! In-memory chart state: series buffers and per-chart sync statistics.

use chrono::{DateTime, Utc};

use crate::config::{ChartSpec, SeriesColor};
use crate::error::SyncError;

/// One plotted point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: DateTime<Utc>,
    pub y: f64,
}

impl Point {
    pub fn new(x: DateTime<Utc>, y: f64) -> Self {
        Self { x, y }
    }
}

/// One visual trace: a named buffer of points bound to a metric column.
///
/// The buffer is strictly ascending in `x`. Only the tracker mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub column: String,
    pub color: SeriesColor,
    pub(crate) buffer: Vec<Point>,
}

impl Series {
    pub fn new(name: impl Into<String>, column: impl Into<String>, color: SeriesColor) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
            color,
            buffer: Vec::new(),
        }
    }

    pub fn points(&self) -> &[Point] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn last(&self) -> Option<&Point> {
        self.buffer.last()
    }
}

/// Counters describing how a chart's loop has been doing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncStats {
    pub ticks: u64,
    pub fetches: u64,
    pub failures: u64,
    pub consecutive_failures: u64,
    pub redraws: u64,
    pub last_error: Option<String>,
    pub last_update: Option<DateTime<Utc>>,
}

impl SyncStats {
    pub(crate) fn record_fetch(&mut self, outcome: Result<(), &SyncError>) {
        self.fetches += 1;
        match outcome {
            Ok(()) => self.consecutive_failures = 0,
            Err(e) => {
                self.failures += 1;
                self.consecutive_failures += 1;
                self.last_error = Some(e.to_string());
            }
        }
    }

    /// True when the most recent fetch failed.
    pub fn is_degraded(&self) -> bool {
        self.consecutive_failures > 0
    }
}

/// A job chart: an ordered set of series refreshed together.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub job_id: String,
    pub title: String,
    pub unit: Option<String>,
    pub series: Vec<Series>,
    pub stats: SyncStats,
}

impl Chart {
    pub fn new(job_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            title: title.into(),
            unit: None,
            series: Vec::new(),
            stats: SyncStats::default(),
        }
    }

    /// Build an empty chart for `job_id` from its layout.
    pub fn from_spec(job_id: impl Into<String>, spec: &ChartSpec) -> Self {
        let series = spec
            .series
            .iter()
            .enumerate()
            .map(|(i, s)| {
                Series::new(
                    s.name.clone(),
                    s.column.clone(),
                    s.color.unwrap_or_else(|| SeriesColor::nth(i)),
                )
            })
            .collect();
        Self {
            job_id: job_id.into(),
            title: spec.title.clone(),
            unit: spec.unit.clone(),
            series,
            stats: SyncStats::default(),
        }
    }

    pub fn with_series(mut self, series: Series) -> Self {
        self.series.push(series);
        self
    }

    pub fn series_named(&self, name: &str) -> Option<&Series> {
        self.series.iter().find(|s| s.name == name)
    }

    /// Time span covered by all series, if any holds data.
    pub fn time_bounds(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let first = self.series.iter().filter_map(|s| s.buffer.first()).map(|p| p.x).min()?;
        let last = self.series.iter().filter_map(|s| s.buffer.last()).map(|p| p.x).max()?;
        Some((first, last))
    }

    /// Value range covered by all series, if any holds data.
    pub fn value_bounds(&self) -> Option<(f64, f64)> {
        self.series
            .iter()
            .flat_map(|s| s.buffer.iter().map(|p| p.y))
            .fold(None, |acc, y| match acc {
                None => Some((y, y)),
                Some((lo, hi)) => Some((lo.min(y), hi.max(y))),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeriesSpec;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn from_spec_assigns_palette_when_unset() {
        let spec = ChartSpec::new("Paths")
            .series(SeriesSpec::new("Total", "total_paths"))
            .series(SeriesSpec::new("Pending", "pending").color(SeriesColor::Orange));
        let chart = Chart::from_spec("job-1", &spec);
        assert_eq!(chart.job_id, "job-1");
        assert_eq!(chart.series[0].color, SeriesColor::nth(0));
        assert_eq!(chart.series[1].color, SeriesColor::Orange);
        assert!(chart.series.iter().all(Series::is_empty));
    }

    #[test]
    fn bounds_span_all_series() {
        let mut a = Series::new("a", "a", SeriesColor::Red);
        a.buffer = vec![Point::new(t(0), 1.0), Point::new(t(10), 5.0)];
        let mut b = Series::new("b", "b", SeriesColor::Blue);
        b.buffer = vec![Point::new(t(5), -2.0), Point::new(t(20), 3.0)];
        let chart = Chart::new("j", "c").with_series(a).with_series(b);

        assert_eq!(chart.time_bounds(), Some((t(0), t(20))));
        assert_eq!(chart.value_bounds(), Some((-2.0, 5.0)));
    }

    #[test]
    fn bounds_empty_chart() {
        let chart = Chart::new("j", "c").with_series(Series::new("a", "a", SeriesColor::Red));
        assert_eq!(chart.time_bounds(), None);
        assert_eq!(chart.value_bounds(), None);
    }

    #[test]
    fn stats_track_consecutive_failures() {
        let mut stats = SyncStats::default();
        let err = SyncError::transport("x", "refused");
        stats.record_fetch(Err(&err));
        stats.record_fetch(Err(&err));
        assert_eq!(stats.consecutive_failures, 2);
        assert!(stats.is_degraded());
        stats.record_fetch(Ok(()));
        assert_eq!(stats.consecutive_failures, 0);
        assert_eq!(stats.failures, 2);
        assert_eq!(stats.fetches, 3);
        assert!(stats.last_error.is_some());
    }
}
