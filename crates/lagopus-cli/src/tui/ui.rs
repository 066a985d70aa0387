//! TUI rendering: one panel per chart of the selected job.
//!
//! ┌──────────────────────────────────────────────────────────┐
//! │  Lagopus   job: fuzz-libpng-1 (1/2)   every 5s   live    │
//! ├────────────────────────────┬─────────────────────────────┤
//! │ Executions (execs/s)       │ Memory (Mi)                 │
//! │   ⣀⡠⠤⠒⠉⠉⠒⠤⣀                 │        ⢀⣀⡠⠤⠤⠒⠒⠉⠉            │
//! │ ticks 12 · 12:00:05        │ ticks 12 · 12:00:05         │
//! ├────────────────────────────┼─────────────────────────────┤
//! │ Coverage (paths)           │ Faults                      │
//! │ ...                        │ ...                         │
//! ├────────────────────────────┴─────────────────────────────┤
//! │  q: quit   p: pause   r: refresh   tab/←→: job           │
//! └──────────────────────────────────────────────────────────┘

use chrono::{DateTime, Local, Utc};
use ratatui::{prelude::*, widgets::*};

use lagopus_core::{Chart as LiveChart, ChartSpec, SeriesColor, SyncStats};

use super::app::{App, ChartSnapshot, Snapshot};

pub fn draw(f: &mut Frame, app: &App) {
    let snapshot = app.snapshot();
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // title
            Constraint::Min(10),   // charts
            Constraint::Length(1), // keys
        ])
        .split(f.area());

    draw_title(f, rows[0], app, &snapshot);
    draw_charts(f, rows[1], app, &snapshot);
    draw_keys(f, rows[2]);
}

fn draw_title(f: &mut Frame, area: Rect, app: &App, snapshot: &Snapshot) {
    let (pos, total) = app.job_position();
    let state = if app.is_paused() {
        Span::styled(" paused ", Style::default().bold().fg(Color::Yellow))
    } else {
        Span::styled(" live ", Style::default().bold().fg(Color::Green))
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Line::from(vec![
            Span::styled(" Lagopus ", Style::default().bold().fg(Color::Cyan)),
            Span::raw("  job: "),
            Span::styled(app.current_job(), Style::default().bold().fg(Color::Yellow)),
            Span::styled(
                format!(
                    " ({pos}/{total})  {}  every {:?}  {} redraws ",
                    app.url(),
                    app.poll_interval(),
                    snapshot.redraws
                ),
                Style::default().fg(Color::DarkGray),
            ),
            state,
        ]));

    f.render_widget(block, area);
}

fn draw_charts(f: &mut Frame, area: Rect, app: &App, snapshot: &Snapshot) {
    let specs = app.specs();
    let stats = app.panel_stats();
    let cells = grid(area, specs.len());

    for (i, cell) in cells.into_iter().enumerate() {
        let panel = snapshot.panels.get(i).and_then(Option::as_ref);
        let stats = stats.get(i).cloned().unwrap_or_default();
        draw_chart(f, cell, &specs[i], panel, &stats);
    }
}

/// Two columns, as many rows as needed.
fn grid(area: Rect, n: usize) -> Vec<Rect> {
    if n == 0 {
        return Vec::new();
    }
    let rows = n.div_ceil(2) as u32;
    let row_areas = Layout::default()
        .direction(Direction::Vertical)
        .constraints((0..rows).map(|_| Constraint::Ratio(1, rows)))
        .split(area);

    let mut cells = Vec::with_capacity(n);
    for (r, row) in row_areas.iter().enumerate() {
        let in_row = (n - r * 2).min(2) as u32;
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints((0..in_row).map(|_| Constraint::Ratio(1, in_row)))
            .split(*row);
        cells.extend(cols.iter().copied());
    }
    cells
}

fn draw_chart(
    f: &mut Frame,
    area: Rect,
    spec: &ChartSpec,
    panel: Option<&ChartSnapshot>,
    stats: &SyncStats,
) {
    let title = match &spec.unit {
        Some(unit) => format!(" {} ({unit}) ", spec.title),
        None => format!(" {} ", spec.title),
    };
    let status_style = if stats.is_degraded() {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_bottom(Line::from(Span::styled(status_line(stats), status_style)));

    let bounded = panel.and_then(|p| p.chart.time_bounds().map(|b| (&p.chart, b)));
    let Some((chart, (origin, end))) = bounded else {
        let p = Paragraph::new("waiting for data…")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(p, area);
        return;
    };

    let data = series_data(chart, origin);
    let datasets: Vec<Dataset> = chart
        .series
        .iter()
        .zip(&data)
        .map(|(series, points)| {
            let latest = series.last().map(|p| format!(" {:.1}", p.y)).unwrap_or_default();
            Dataset::default()
                .name(format!("{}{latest}", series.name))
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(color_of(series.color)))
                .data(points)
        })
        .collect();

    let x_max = ((end - origin).num_milliseconds() as f64 / 1000.0).max(1.0);
    let (y_min, y_max) = padded_bounds(chart.value_bounds().unwrap_or((0.0, 1.0)));

    let widget = Chart::new(datasets)
        .block(block)
        .legend_position(Some(LegendPosition::TopLeft))
        .x_axis(Axis::default().bounds([0.0, x_max]).labels(vec![
            Line::from(clock(origin)),
            Line::from(clock(end)),
        ]))
        .y_axis(Axis::default().bounds([y_min, y_max]).labels(vec![
            Line::from(compact(y_min)),
            Line::from(compact(y_max)),
        ]));

    f.render_widget(widget, area);
}

fn draw_keys(f: &mut Frame, area: Rect) {
    let bar = Paragraph::new(" q: quit   p: pause/resume   r: refresh now   tab/←→: switch job")
        .style(Style::default().bg(Color::DarkGray).fg(Color::White));
    f.render_widget(bar, area);
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Points of each series as (seconds since `origin`, value).
pub fn series_data(chart: &LiveChart, origin: DateTime<Utc>) -> Vec<Vec<(f64, f64)>> {
    chart
        .series
        .iter()
        .map(|s| {
            s.points()
                .iter()
                .map(|p| ((p.x - origin).num_milliseconds() as f64 / 1000.0, p.y))
                .collect()
        })
        .collect()
}

/// Y range with some headroom; flat lines get a unit band.
pub fn padded_bounds((lo, hi): (f64, f64)) -> (f64, f64) {
    let span = hi - lo;
    if span.abs() < f64::EPSILON {
        return (lo - 1.0, hi + 1.0);
    }
    let pad = span * 0.05;
    let lo = if lo >= 0.0 { (lo - pad).max(0.0) } else { lo - pad };
    (lo, hi + pad)
}

/// Per-chart status shown under each panel.
pub fn status_line(stats: &SyncStats) -> String {
    let mut line = format!(" ticks {}", stats.ticks);
    if let Some(at) = stats.last_update {
        line.push_str(&format!(" · updated {}", clock(at)));
    }
    if stats.is_degraded() {
        let err = stats.last_error.as_deref().unwrap_or("fetch failed");
        line.push_str(&format!(" · ✗ {} ({}x)", err, stats.consecutive_failures));
    } else if stats.failures > 0 {
        line.push_str(&format!(" · {} failed", stats.failures));
    }
    line.push(' ');
    line
}

pub fn color_of(color: SeriesColor) -> Color {
    let (r, g, b) = color.rgb();
    Color::Rgb(r, g, b)
}

fn clock(t: DateTime<Utc>) -> String {
    t.with_timezone(&Local).format("%H:%M:%S").to_string()
}

fn compact(v: f64) -> String {
    let a = v.abs();
    if a >= 1e9 {
        format!("{:.1}G", v / 1e9)
    } else if a >= 1e6 {
        format!("{:.1}M", v / 1e6)
    } else if a >= 1e4 {
        format!("{:.1}k", v / 1e3)
    } else {
        format!("{v:.1}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lagopus_core::{Sample, merge};

    #[test]
    fn flat_series_gets_a_band() {
        assert_eq!(padded_bounds((5.0, 5.0)), (4.0, 6.0));
    }

    #[test]
    fn bounds_stay_non_negative_for_counters() {
        let (lo, hi) = padded_bounds((0.0, 100.0));
        assert_eq!(lo, 0.0);
        assert!((hi - 105.0).abs() < 1e-9);
        let (lo, _) = padded_bounds((-10.0, 10.0));
        assert!(lo < -10.0);
    }

    #[test]
    fn series_data_is_relative_seconds() {
        let spec = ChartSpec::single("Memory", "memory");
        let mut chart = LiveChart::from_spec("j", &spec);
        let t = |s: i64| Utc.timestamp_opt(1_700_000_000 + s, 0).unwrap();
        let rows: Vec<Sample> = (0..3)
            .map(|i| Sample::new(t(i * 5)).with("memory", i as f64))
            .collect();
        merge(&mut chart.series[0], &rows, 20);

        let data = series_data(&chart, t(0));
        assert_eq!(data, vec![vec![(0.0, 0.0), (5.0, 1.0), (10.0, 2.0)]]);
    }

    #[test]
    fn status_line_shows_failures() {
        let mut stats = SyncStats {
            ticks: 4,
            ..Default::default()
        };
        assert_eq!(status_line(&stats), " ticks 4 ");

        stats.failures = 2;
        stats.consecutive_failures = 1;
        stats.last_error = Some("HTTP 502".into());
        assert!(status_line(&stats).contains("✗ HTTP 502 (1x)"));

        stats.consecutive_failures = 0;
        assert!(status_line(&stats).ends_with("· 2 failed "));
    }

    #[test]
    fn grid_fills_two_columns() {
        let cells = grid(Rect::new(0, 0, 100, 40), 5);
        assert_eq!(cells.len(), 5);
        assert_eq!(cells[0].y, cells[1].y);
        assert!(cells[2].y > cells[0].y);
        assert_eq!(cells[4].width, 100);
        assert!(grid(Rect::new(0, 0, 10, 10), 0).is_empty());
    }

    #[test]
    fn palette_maps_to_rgb() {
        assert_eq!(color_of(SeriesColor::Blue), Color::Rgb(54, 162, 235));
    }

    #[test]
    fn compact_labels() {
        assert_eq!(compact(12.34), "12.3");
        assert_eq!(compact(45_000.0), "45.0k");
        assert_eq!(compact(2_500_000.0), "2.5M");
    }
}
