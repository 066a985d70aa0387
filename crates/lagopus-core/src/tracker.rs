//! Series cursor tracking and incremental merge.
//!
//! The cursor of a series is the timestamp of its newest buffered point; an
//! empty series has no cursor and asks for full history. Merging compares
//! every incoming point against the cursor by timestamp, so a backend that
//! echoes the cursor sample back (inclusive `since`) and one that does not
//! (exclusive `since`) both end up with the same buffer.

use chrono::{DateTime, Utc};

use crate::sample::{Sample, format_instant};
use crate::series::{Chart, Point, Series};

/// What one merge did to a series buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// The merge was a full-history load (the series had no cursor).
    pub replaced: bool,
    /// Points added to the buffer.
    pub added: usize,
    /// Oldest points evicted to honour the display window.
    pub evicted: usize,
    /// Samples without a usable value for the series column.
    pub missing_column: usize,
    /// Samples at or before the cursor, or out of order.
    pub stale: usize,
}

impl MergeReport {
    pub fn changed(&self) -> bool {
        self.added > 0
    }
}

/// Fetch cursor for a series: `None` for full history.
pub fn cursor_for(series: &Series) -> Option<DateTime<Utc>> {
    series.buffer.last().map(|p| p.x)
}

/// Shared cursor for a chart fetched as one stream.
///
/// All series of a job read the same sample rows, so their cursors normally
/// coincide. The earliest non-empty cursor is used so that no series can miss
/// rows; series still empty simply start from whatever that fetch returns.
///
/// A series whose cursor is older than the oldest point of some series holding
/// a full `window` is left out. Every poll since has reached it without a value
/// for its column, and keeping it would re-download that tail on every tick.
pub fn chart_cursor(chart: &Chart, window: usize) -> Option<DateTime<Utc>> {
    let cursors = chart.series.iter().filter_map(cursor_for);
    let floor = chart
        .series
        .iter()
        .filter(|s| window > 0 && s.buffer.len() >= window)
        .filter_map(|s| s.buffer.first().map(|p| p.x))
        .max();
    let Some(floor) = floor else {
        return cursors.min();
    };

    let (kept, lagging): (Vec<_>, Vec<_>) = cursors.partition(|c| *c >= floor);
    if !lagging.is_empty() {
        log::debug!(
            "[{}:{}] {} series more than a window behind, cursor from {}",
            chart.job_id,
            chart.title,
            lagging.len(),
            format_instant(&floor)
        );
    }
    kept.into_iter().min()
}

/// Cursor rendered for a `since` query parameter.
pub fn format_cursor(cursor: &DateTime<Utc>) -> String {
    format_instant(cursor)
}

/// Merge one fetch result into `series`, keeping at most `window` points.
///
/// An empty result is a no-op.
pub fn merge(series: &mut Series, result: &[Sample], window: usize) -> MergeReport {
    let mut report = MergeReport::default();
    if result.is_empty() {
        return report;
    }

    let cursor = cursor_for(series);
    let mut newest = cursor;
    let mut fresh = Vec::with_capacity(result.len());

    for sample in result {
        let Some(y) = sample.value(&series.column) else {
            report.missing_column += 1;
            continue;
        };
        if newest.is_some_and(|t| sample.time <= t) {
            report.stale += 1;
            continue;
        }
        newest = Some(sample.time);
        fresh.push(Point::new(sample.time, y));
    }

    if fresh.is_empty() {
        return report;
    }

    report.added = fresh.len();
    if cursor.is_none() {
        report.replaced = true;
        series.buffer = fresh;
    } else {
        series.buffer.extend(fresh);
    }

    let window = window.max(1);
    if series.buffer.len() > window {
        let excess = series.buffer.len() - window;
        series.buffer.drain(..excess);
        report.evicted = excess;
        report.added = report.added.min(window);
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeriesColor;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn v(secs: i64, value: f64) -> Sample {
        Sample::new(t(secs)).with("v", value)
    }

    fn series() -> Series {
        Series::new("V", "v", SeriesColor::Blue)
    }

    fn xy(s: &Series) -> Vec<(i64, f64)> {
        s.points()
            .iter()
            .map(|p| (p.x.timestamp() - 1_700_000_000, p.y))
            .collect()
    }

    fn assert_strictly_ascending(s: &Series) {
        for pair in s.points().windows(2) {
            assert!(pair[0].x < pair[1].x, "buffer not strictly ascending: {pair:?}");
        }
    }

    #[test]
    fn empty_series_has_no_cursor() {
        assert_eq!(cursor_for(&series()), None);
    }

    #[test]
    fn full_fetch_populates_buffer() {
        let mut s = series();
        let report = merge(&mut s, &[v(1, 1.0), v(2, 2.0)], 20);
        assert!(report.replaced);
        assert_eq!(report.added, 2);
        assert_eq!(xy(&s), vec![(1, 1.0), (2, 2.0)]);
        assert_eq!(cursor_for(&s), Some(t(2)));
    }

    #[test]
    fn incremental_fetch_drops_echoed_cursor_point() {
        let mut s = series();
        merge(&mut s, &[v(1, 1.0), v(2, 2.0)], 20);

        let report = merge(&mut s, &[v(2, 2.0), v(3, 3.0)], 20);
        assert!(!report.replaced);
        assert_eq!(report.added, 1);
        assert_eq!(report.stale, 1);
        assert_eq!(xy(&s), vec![(1, 1.0), (2, 2.0), (3, 3.0)]);
        assert_eq!(cursor_for(&s), Some(t(3)));
    }

    #[test]
    fn exclusive_backend_loses_nothing() {
        let mut s = series();
        merge(&mut s, &[v(1, 1.0), v(2, 2.0)], 20);

        // Server returned only rows strictly after the cursor.
        let report = merge(&mut s, &[v(3, 3.0), v(4, 4.0)], 20);
        assert_eq!(report.added, 2);
        assert_eq!(xy(&s), vec![(1, 1.0), (2, 2.0), (3, 3.0), (4, 4.0)]);
    }

    #[test]
    fn echo_only_is_idempotent() {
        let mut s = series();
        merge(&mut s, &[v(1, 1.0), v(2, 2.0)], 20);
        let before = s.clone();

        let report = merge(&mut s, &[v(2, 2.0)], 20);
        assert!(!report.changed());
        assert_eq!(s, before);
    }

    #[test]
    fn empty_result_is_noop() {
        let mut s = series();
        merge(&mut s, &[v(1, 1.0)], 20);
        let before = s.clone();
        let report = merge(&mut s, &[], 20);
        assert_eq!(report, MergeReport::default());
        assert_eq!(s, before);
    }

    #[test]
    fn full_fetch_truncates_to_window() {
        let mut s = series();
        let samples: Vec<Sample> = (0..50).map(|i| v(i, i as f64)).collect();
        let report = merge(&mut s, &samples, 20);
        assert_eq!(s.len(), 20);
        assert_eq!(report.evicted, 30);
        assert_eq!(report.added, 20);
        assert_eq!(s.points()[0].x, t(30));
        assert_eq!(cursor_for(&s), Some(t(49)));
    }

    #[test]
    fn incremental_appends_respect_window() {
        let mut s = series();
        merge(&mut s, &[v(0, 0.0), v(1, 1.0), v(2, 2.0)], 3);
        merge(&mut s, &[v(2, 2.0), v(3, 3.0), v(4, 4.0)], 3);
        assert_eq!(xy(&s), vec![(2, 2.0), (3, 3.0), (4, 4.0)]);
    }

    #[test]
    fn missing_column_is_skipped() {
        let mut s = series();
        let samples = vec![
            v(1, 1.0),
            Sample::new(t(2)).with("other", 9.0),
            v(3, 3.0),
        ];
        let report = merge(&mut s, &samples, 20);
        assert_eq!(report.missing_column, 1);
        assert_eq!(xy(&s), vec![(1, 1.0), (3, 3.0)]);
    }

    #[test]
    fn result_without_column_leaves_buffer_untouched() {
        let mut s = series();
        merge(&mut s, &[v(1, 1.0)], 20);
        let before = s.clone();
        let report = merge(&mut s, &[Sample::new(t(5)).with("other", 1.0)], 20);
        assert!(!report.changed());
        assert_eq!(s, before);
    }

    #[test]
    fn out_of_order_and_duplicate_rows_are_dropped() {
        let mut s = series();
        let report = merge(&mut s, &[v(1, 1.0), v(3, 3.0), v(2, 2.0), v(3, 3.5)], 20);
        assert_eq!(report.stale, 2);
        assert_eq!(xy(&s), vec![(1, 1.0), (3, 3.0)]);
    }

    #[test]
    fn older_history_never_rewinds_cursor() {
        let mut s = series();
        merge(&mut s, &[v(10, 1.0), v(11, 2.0)], 20);
        let report = merge(&mut s, &[v(1, 0.0), v(5, 0.0)], 20);
        assert_eq!(report.stale, 2);
        assert_eq!(cursor_for(&s), Some(t(11)));
    }

    #[test]
    fn chart_cursor_uses_earliest_nonempty_series() {
        let mut a = series();
        merge(&mut a, &[v(1, 1.0), v(5, 5.0)], 20);
        let mut b = Series::new("W", "w", SeriesColor::Red);
        merge(&mut b, &[Sample::new(t(3)).with("w", 1.0)], 20);
        let c = Series::new("X", "x", SeriesColor::Green);

        let chart = Chart::new("j", "c").with_series(a).with_series(b).with_series(c);
        assert_eq!(chart_cursor(&chart, 20), Some(t(3)));

        let empty = Chart::new("j", "c").with_series(series());
        assert_eq!(chart_cursor(&empty, 20), None);
    }

    #[test]
    fn sparse_column_does_not_pin_chart_cursor() {
        let mut dense = series();
        let rows: Vec<Sample> = (10..15).map(|i| v(i, i as f64)).collect();
        merge(&mut dense, &rows, 5);
        let mut sparse = Series::new("W", "w", SeriesColor::Red);
        merge(&mut sparse, &[Sample::new(t(2)).with("w", 1.0)], 5);

        // Still within the dense series' window: no rows may be skipped.
        let mut recent = Series::new("X", "x", SeriesColor::Green);
        merge(&mut recent, &[Sample::new(t(11)).with("x", 1.0)], 5);

        let chart = Chart::new("j", "c")
            .with_series(dense.clone())
            .with_series(sparse.clone());
        assert_eq!(chart_cursor(&chart, 5), Some(t(14)));

        let chart = chart.with_series(recent);
        assert_eq!(chart_cursor(&chart, 5), Some(t(11)));

        // Until some series holds a full window, the earliest cursor wins.
        let chart = Chart::new("j", "c").with_series(dense).with_series(sparse);
        assert_eq!(chart_cursor(&chart, 20), Some(t(2)));
    }

    #[test]
    fn cursor_formats_as_rfc3339() {
        assert_eq!(format_cursor(&t(0)), "2023-11-14T22:13:20Z");
    }

    #[test]
    fn random_response_sequences_keep_buffer_ordered() {
        let mut rng = StdRng::seed_from_u64(0x1a90_9005);
        for _ in 0..200 {
            let mut s = series();
            let window = rng.random_range(1..30);
            let mut clock = 0i64;
            for _ in 0..rng.random_range(1..15) {
                // Responses overlap the cursor, repeat rows and go backwards.
                let start = clock - rng.random_range(0..5);
                let len = rng.random_range(0..12);
                let mut batch = Vec::with_capacity(len);
                let mut at = start;
                for _ in 0..len {
                    at += rng.random_range(-1..3);
                    if rng.random_bool(0.1) {
                        batch.push(Sample::new(t(at)).with("other", 0.0));
                    } else {
                        batch.push(v(at, at as f64));
                    }
                }
                clock = clock.max(at);
                let before = cursor_for(&s);
                merge(&mut s, &batch, window);

                assert_strictly_ascending(&s);
                assert!(s.len() <= window);
                if let (Some(b), Some(a)) = (before, cursor_for(&s)) {
                    assert!(a >= b, "cursor moved backwards");
                }
            }
        }
    }
}
